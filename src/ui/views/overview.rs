use super::{draw_placeholder, view_block};
use crate::api::types::{DomainHealth, HealthReport, MarketIndex, MarketSummary};
use crate::ui::format::{change_color, grouped, percent, price};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, Paragraph};

pub fn draw_overview(
  frame: &mut Frame,
  area: Rect,
  summary: Option<&MarketSummary>,
  indices: &[MarketIndex],
  health: Option<&HealthReport>,
  loading: bool,
) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(6), // Market summary
      Constraint::Min(3),    // Indices
      Constraint::Length(4), // Scraper health
    ])
    .split(area);

  draw_summary(frame, chunks[0], summary, loading);
  draw_indices(frame, chunks[1], indices, loading);
  draw_health(frame, chunks[2], health);
}

fn draw_summary(frame: &mut Frame, area: Rect, summary: Option<&MarketSummary>, loading: bool) {
  let title = match summary.and_then(|s| s.market_date.as_deref()) {
    Some(date) => format!(" PSX Market [{}] ", date),
    None => " PSX Market ".to_string(),
  };
  let block = view_block(title);

  let Some(summary) = summary else {
    let text = if loading { "Loading..." } else { "No market data." };
    draw_placeholder(frame, area, block, text);
    return;
  };

  let lines = vec![
    Line::from(vec![
      Span::styled("Stocks   ", Style::default().fg(Color::DarkGray)),
      Span::raw(summary.total_stocks.to_string()),
    ]),
    Line::from(vec![
      Span::styled("Breadth  ", Style::default().fg(Color::DarkGray)),
      Span::styled(format!("{} up", summary.gainers), Style::default().fg(Color::Green)),
      Span::raw("  "),
      Span::styled(format!("{} down", summary.losers), Style::default().fg(Color::Red)),
      Span::raw(format!("  {} unchanged", summary.unchanged)),
    ]),
    Line::from(vec![
      Span::styled("Volume   ", Style::default().fg(Color::DarkGray)),
      Span::raw(grouped(summary.total_volume)),
    ]),
    Line::from(vec![
      Span::styled("Avg chg  ", Style::default().fg(Color::DarkGray)),
      Span::styled(
        percent(summary.avg_change_pct),
        Style::default().fg(change_color(summary.avg_change_pct)),
      ),
    ]),
  ];

  frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_indices(frame: &mut Frame, area: Rect, indices: &[MarketIndex], loading: bool) {
  let block = view_block(format!(" Indices ({}) ", indices.len()));

  if indices.is_empty() {
    let text = if loading { "Loading..." } else { "No indices." };
    draw_placeholder(frame, area, block, text);
    return;
  }

  let items: Vec<ListItem> = indices
    .iter()
    .map(|index| {
      let color = change_color(index.change);
      ListItem::new(Line::from(vec![
        Span::styled(format!("{:<12}", index.index_name), Style::default().fg(Color::Cyan)),
        Span::raw(format!("{:>12}", price(index.value))),
        Span::styled(format!("{:>10}", price(index.change)), Style::default().fg(color)),
        Span::styled(format!("{:>10}", percent(index.change_pct)), Style::default().fg(color)),
      ]))
    })
    .collect();

  frame.render_widget(List::new(items).block(block), area);
}

fn draw_health(frame: &mut Frame, area: Rect, health: Option<&HealthReport>) {
  let (title, color) = match health {
    Some(h) if h.is_healthy() => (" Backend: healthy ".to_string(), Color::Green),
    Some(h) => (format!(" Backend: {} ", h.status), Color::Yellow),
    None => (" Backend: unknown ".to_string(), Color::DarkGray),
  };
  let block = view_block(title).border_style(Style::default().fg(color));

  let Some(health) = health else {
    draw_placeholder(frame, area, block, "Health check unavailable.");
    return;
  };

  let lines = vec![
    domain_line("MUFAP", &health.mufap),
    domain_line("PSX  ", &health.psx),
  ];
  frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn domain_line(name: &'static str, health: &DomainHealth) -> Line<'static> {
  let (state, color) = if health.ready {
    ("ready", Color::Green)
  } else {
    ("not ready", Color::Yellow)
  };
  let scraped = health
    .last_scrape
    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| "never".to_string());

  Line::from(vec![
    Span::styled(format!("{} ", name), Style::default().fg(Color::Cyan)),
    Span::styled(format!("{:<10}", state), Style::default().fg(color)),
    Span::raw(format!("{} rows, scraped {}", health.cached, scraped)),
  ])
}
