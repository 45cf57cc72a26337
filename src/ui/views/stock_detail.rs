use super::{draw_placeholder, view_block};
use crate::api::types::Stock;
use crate::ui::format::{change_color, grouped, percent, price};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

pub fn draw_stock_detail(frame: &mut Frame, area: Rect, symbol: &str, stock: Option<&Stock>, loading: bool) {
  let block = view_block(format!(" {} ", symbol));

  let Some(stock) = stock else {
    let text = if loading { "Loading..." } else { "Stock not found." };
    draw_placeholder(frame, area, block, text);
    return;
  };

  let color = change_color(stock.change);
  let row = |label: &'static str, value: String| {
    Line::from(vec![
      Span::styled(format!("{:<10}", label), Style::default().fg(Color::DarkGray)),
      Span::raw(value),
    ])
  };

  let lines = vec![
    Line::from(vec![
      Span::styled(
        format!("{} ", price(stock.current)),
        Style::default().fg(Color::White).bold(),
      ),
      Span::styled(
        format!("{} ({})", price(stock.change), percent(stock.change_pct)),
        Style::default().fg(color),
      ),
    ]),
    Line::raw(""),
    row("LDCP", price(stock.ldcp)),
    row("Open", price(stock.open)),
    row("High", price(stock.high)),
    row("Low", price(stock.low)),
    row("Volume", stock.volume.map(grouped).unwrap_or_else(|| "-".to_string())),
  ];

  frame.render_widget(Paragraph::new(lines).block(block), area);
}
