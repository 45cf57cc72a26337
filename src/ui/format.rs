use ratatui::prelude::Color;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Green for gains, red for losses
pub fn change_color(change: Option<f64>) -> Color {
  match change {
    Some(c) if c > 0.0 => Color::Green,
    Some(c) if c < 0.0 => Color::Red,
    _ => Color::White,
  }
}

/// Price with two decimals, "-" when missing
pub fn price(value: Option<f64>) -> String {
  value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

/// Signed percentage, "-" when missing
pub fn percent(value: Option<f64>) -> String {
  value.map_or_else(|| "-".to_string(), |v| format!("{:+.2}%", v))
}

/// Integer with thousands separators
pub fn grouped(value: u64) -> String {
  let digits = value.to_string();
  let mut out = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      out.push(',');
    }
    out.push(c);
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("HBL", 10), "HBL");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("Meezan Islamic Fund", 10), "Meezan ...");
  }

  #[test]
  fn test_change_color() {
    assert_eq!(change_color(Some(1.2)), Color::Green);
    assert_eq!(change_color(Some(-0.4)), Color::Red);
    assert_eq!(change_color(Some(0.0)), Color::White);
    assert_eq!(change_color(None), Color::White);
  }

  #[test]
  fn test_number_formatting() {
    assert_eq!(price(Some(78.456)), "78.46");
    assert_eq!(price(None), "-");
    assert_eq!(percent(Some(2.5)), "+2.50%");
    assert_eq!(percent(Some(-1.0)), "-1.00%");
    assert_eq!(grouped(0), "0");
    assert_eq!(grouped(999), "999");
    assert_eq!(grouped(1_234_567), "1,234,567");
  }
}
