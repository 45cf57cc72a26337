mod format;
mod header;
mod overlay;
mod views;

use crate::app::{App, Mode, ViewState};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Breadcrumb / status
    ])
    .split(frame.area());

  header::draw_header(frame, chunks[0], app.base_url(), app.last_source(), app.cache_stats());

  let filter = app.search_filter();

  // Draw current view
  if let Some(view) = app.current_view() {
    match view {
      ViewState::Overview {
        summary,
        indices,
        health,
        loading,
      } => {
        views::overview::draw_overview(
          frame,
          chunks[1],
          summary.as_ref(),
          indices,
          health.as_ref(),
          *loading,
        );
      }
      ViewState::FundList {
        funds,
        selected,
        category,
        total,
        loading,
      } => {
        views::funds::draw_fund_list(
          frame,
          chunks[1],
          funds,
          *selected,
          category.as_deref(),
          *total,
          filter,
          *loading,
        );
      }
      ViewState::Categories {
        categories,
        selected,
        loading,
      } => {
        views::categories::draw_categories(frame, chunks[1], categories, *selected, filter, *loading);
      }
      ViewState::StockList {
        kind,
        stocks,
        selected,
        loading,
      } => {
        views::stocks::draw_stock_list(
          frame,
          chunks[1],
          kind.title(),
          stocks,
          *selected,
          filter,
          *loading,
        );
      }
      ViewState::StockDetail {
        symbol,
        stock,
        loading,
      } => {
        views::stock_detail::draw_stock_detail(frame, chunks[1], symbol, stock.as_deref(), *loading);
      }
    }
  }

  draw_status_bar(frame, chunks[2], app);

  if *app.mode() == Mode::Command {
    overlay::draw_command_overlay(
      frame,
      chunks[1],
      app.command_input(),
      &app.autocomplete_suggestions(),
      app.selected_suggestion(),
    );
  }
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let line = match app.mode() {
    Mode::Search => Line::from(Span::styled(
      format!(" /{}", app.search_filter()),
      Style::default().fg(Color::Cyan),
    )),
    Mode::Normal | Mode::Command => {
      let breadcrumb = app.view_breadcrumb();
      let mut spans = vec![Span::raw(" ")];
      for (i, part) in breadcrumb.iter().enumerate() {
        if i > 0 {
          spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
        }
        let style = if i == breadcrumb.len() - 1 {
          // Current view - highlighted
          Style::default().fg(Color::Cyan).bold()
        } else {
          Style::default().fg(Color::White)
        };
        spans.push(Span::styled(part.clone(), style));
      }
      if !app.search_filter().is_empty() {
        spans.push(Span::styled(
          format!("  /{}", app.search_filter()),
          Style::default().fg(Color::Cyan),
        ));
      }
      if let Some(message) = app.message() {
        spans.push(Span::styled(
          format!("  {}", message),
          Style::default().fg(Color::Yellow),
        ));
      }
      Line::from(spans)
    }
  };

  let paragraph = Paragraph::new(line).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
