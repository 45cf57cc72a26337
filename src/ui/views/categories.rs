use super::{draw_placeholder, highlight, view_block};
use crate::api::types::CategoryCount;
use crate::app::matches_filter;
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};

pub fn draw_categories(
  frame: &mut Frame,
  area: Rect,
  categories: &[CategoryCount],
  selected: usize,
  filter: &str,
  loading: bool,
) {
  let title = if loading {
    " Fund Categories (loading...) ".to_string()
  } else {
    format!(" Fund Categories ({}) ", categories.len())
  };
  let block = view_block(title);

  let items: Vec<ListItem> = categories
    .iter()
    .filter(|c| matches_filter(&c.category, filter))
    .map(|c| {
      ListItem::new(Line::from(vec![
        Span::raw(format!("{:<40}", c.category)),
        Span::styled(format!("{:>6}", c.count), Style::default().fg(Color::Cyan)),
      ]))
    })
    .collect();

  if items.is_empty() && !loading {
    draw_placeholder(frame, area, block, "No categories found.");
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
