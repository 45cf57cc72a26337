use crate::cache::{CacheSource, CacheStats};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with API host, data source, cache counters and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  base_url: &str,
  source: Option<CacheSource>,
  stats: CacheStats,
) {
  let host = extract_host(base_url);
  let (source_label, source_color) = match source {
    Some(source) => (source.label(), source_color(source)),
    None => ("-", Color::DarkGray),
  };

  let header = Line::from(vec![
    Span::styled(" pkfin ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", host), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", source_label), Style::default().fg(source_color).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} cached, {} loading ", stats.entries, stats.in_flight),
      Style::default().fg(Color::DarkGray),
    ),
    Span::raw("  "),
    // Shortcuts - keys and brackets highlighted, descriptions dimmed
    Span::styled("<:>", Style::default().fg(Color::Cyan)),
    Span::styled(" command", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("</>", Style::default().fg(Color::Cyan)),
    Span::styled(" filter", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<r/R>", Style::default().fg(Color::Cyan)),
    Span::styled(" reload/clear", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<S>", Style::default().fg(Color::Cyan)),
    Span::styled(" scrape", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<q>", Style::default().fg(Color::Cyan)),
    Span::styled(" back", Style::default().fg(Color::DarkGray)),
  ]);

  let paragraph = Paragraph::new(header).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

fn source_color(source: CacheSource) -> Color {
  match source {
    CacheSource::Network => Color::Green,
    CacheSource::CacheFresh => Color::Cyan,
    CacheSource::CacheStale => Color::Yellow,
    CacheSource::Offline => Color::Red,
  }
}

/// Extract host (and port) from the API base URL
fn extract_host(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_host() {
    assert_eq!(extract_host("https://pkfin.example.pk"), "pkfin.example.pk");
    assert_eq!(extract_host("https://pkfin.example.pk/api"), "pkfin.example.pk");
    assert_eq!(extract_host("http://localhost:8000"), "localhost:8000");
  }
}
