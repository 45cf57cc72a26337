use super::{draw_placeholder, highlight, view_block};
use crate::api::types::Stock;
use crate::app::matches_filter;
use crate::ui::format::{change_color, grouped, percent, price};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};

pub fn draw_stock_list(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  stocks: &[Stock],
  selected: usize,
  filter: &str,
  loading: bool,
) {
  let title = if loading {
    format!(" {} (loading...) ", title)
  } else {
    format!(" {} ({}) ", title, stocks.len())
  };
  let block = view_block(title);

  let items: Vec<ListItem> = stocks
    .iter()
    .filter(|s| matches_filter(&s.symbol, filter))
    .map(stock_line)
    .map(ListItem::new)
    .collect();

  if items.is_empty() && !loading {
    draw_placeholder(frame, area, block, "No stocks found.");
    return;
  }

  let list = List::new(items)
    .block(block)
    .highlight_style(highlight())
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(Some(selected));

  frame.render_stateful_widget(list, area, &mut state);
}

fn stock_line(stock: &Stock) -> Line<'static> {
  let color = change_color(stock.change);
  Line::from(vec![
    Span::styled(format!("{:<10}", stock.symbol), Style::default().fg(Color::Cyan)),
    Span::raw(format!("{:>10}", price(stock.current))),
    Span::styled(format!("{:>9}", price(stock.change)), Style::default().fg(color)),
    Span::styled(format!("{:>9}", percent(stock.change_pct)), Style::default().fg(color)),
    Span::styled(
      format!("{:>15}", stock.volume.map(grouped).unwrap_or_default()),
      Style::default().fg(Color::DarkGray),
    ),
  ])
}
