pub mod categories;
pub mod funds;
pub mod overview;
pub mod stock_detail;
pub mod stocks;

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// Bordered block shared by every view
fn view_block(title: String) -> Block<'static> {
  Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue))
}

/// Dimmed placeholder shown instead of an empty list
fn draw_placeholder(frame: &mut Frame, area: Rect, block: Block<'_>, text: &str) {
  let paragraph = Paragraph::new(text.to_string())
    .block(block)
    .style(Style::default().fg(Color::DarkGray));
  frame.render_widget(paragraph, area);
}

fn highlight() -> Style {
  Style::default()
    .bg(Color::DarkGray)
    .add_modifier(Modifier::BOLD)
}
