use super::{draw_placeholder, highlight, view_block};
use crate::api::types::Fund;
use crate::app::matches_filter;
use crate::ui::format::{price, truncate};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};

#[allow(clippy::too_many_arguments)]
pub fn draw_fund_list(
  frame: &mut Frame,
  area: Rect,
  funds: &[Fund],
  selected: usize,
  category: Option<&str>,
  total: Option<usize>,
  filter: &str,
  loading: bool,
) {
  let scope = category.unwrap_or("all categories");
  let title = if loading {
    format!(" Funds [{}] (loading...) ", scope)
  } else {
    match total {
      Some(total) => format!(" Funds [{}] ({} of {}) ", scope, funds.len(), total),
      None => format!(" Funds [{}] ({}) ", scope, funds.len()),
    }
  };
  let block = view_block(title);

  let visible: Vec<&Fund> = funds
    .iter()
    .filter(|f| matches_filter(&f.fund_name, filter))
    .collect();

  if visible.is_empty() && !loading {
    draw_placeholder(frame, area, block, "No funds found.");
    return;
  }

  let items: Vec<ListItem> = visible
    .iter()
    .map(|fund| {
      ListItem::new(Line::from(vec![
        Span::raw(format!("{:<44}", truncate(&fund.fund_name, 44))),
        Span::raw(" "),
        Span::styled(
          format!("{:<22}", truncate(&fund.fund_category, 22)),
          Style::default().fg(Color::DarkGray),
        ),
        Span::styled(format!("{:>10}", price(Some(fund.nav))), Style::default().fg(Color::Cyan)),
        Span::raw(format!("{:>10}", price(fund.offer_price))),
        Span::raw(format!("{:>10}", price(fund.repurchase_price))),
        Span::styled(
          format!("  {}", fund.date_updated.as_deref().unwrap_or("")),
          Style::default().fg(Color::DarkGray),
        ),
      ]))
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(highlight())
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(Some(selected));

  frame.render_stateful_widget(list, area, &mut state);
}
