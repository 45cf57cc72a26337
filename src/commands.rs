/// Dashboard commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  /// Placeholder for the optional argument, if the command takes one
  pub arg: Option<&'static str>,
  pub description: &'static str,
}

impl Command {
  /// `stocks [SYMBOL]`
  pub fn usage(&self) -> String {
    match self.arg {
      Some(arg) => format!("{} [{}]", self.name, arg),
      None => self.name.to_string(),
    }
  }

  fn is_named(&self, word: &str) -> bool {
    self.name == word || self.aliases.contains(&word)
  }
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "overview",
    aliases: &["o", "home", "market"],
    arg: None,
    description: "Market summary, indices and scraper health",
  },
  Command {
    name: "funds",
    aliases: &["f", "fund", "mufap"],
    arg: Some("CATEGORY"),
    description: "Mutual funds by NAV (optional category)",
  },
  Command {
    name: "categories",
    aliases: &["c", "cat", "cats"],
    arg: None,
    description: "Fund categories",
  },
  Command {
    name: "stocks",
    aliases: &["s", "stock", "psx"],
    arg: Some("SYMBOL"),
    description: "PSX stocks (optional symbol)",
  },
  Command {
    name: "gainers",
    aliases: &["g", "up"],
    arg: None,
    description: "Top gainers",
  },
  Command {
    name: "losers",
    aliases: &["l", "down"],
    arg: None,
    description: "Top losers",
  },
  Command {
    name: "active",
    aliases: &["a", "volume"],
    arg: None,
    description: "Most active by volume",
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    arg: None,
    description: "Drop cached data and reload",
  },
  Command {
    name: "scrape",
    aliases: &["sc"],
    arg: None,
    description: "Ask the backend to re-scrape the current domain",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    arg: None,
    description: "Exit pkfin",
  },
];

/// Commands matching what has been typed so far, best match first.
///
/// Only the command word is matched. Once an argument follows it, only
/// commands that take one and are named or prefixed by the word are offered.
pub fn suggest(input: &str) -> Vec<&'static Command> {
  let invocation = split_invocation(input);
  let word = invocation.head.to_lowercase();

  let mut matches: Vec<(&Command, u8)> = COMMANDS
    .iter()
    .filter(|cmd| invocation.arg.is_none() || cmd.arg.is_some())
    .filter_map(|cmd| rank(cmd, &word).map(|rank| (cmd, rank)))
    .filter(|(_, rank)| invocation.arg.is_none() || *rank <= 2)
    .collect();

  // Stable, so equal ranks keep table order
  matches.sort_by_key(|(_, rank)| *rank);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

fn rank(cmd: &Command, word: &str) -> Option<u8> {
  if word.is_empty() || cmd.is_named(word) {
    Some(0)
  } else if cmd.name.starts_with(word) {
    Some(1)
  } else if cmd.aliases.iter().any(|a| a.starts_with(word)) {
    Some(2)
  } else if cmd.name.contains(word) {
    Some(3)
  } else {
    None
  }
}

/// A command line split into the command word and its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<'a> {
  pub head: &'a str,
  pub arg: Option<&'a str>,
}

/// Split `"funds Money Market"` into `funds` and `Money Market`.
pub fn split_invocation(input: &str) -> Invocation<'_> {
  let input = input.trim();
  match input.split_once(char::is_whitespace) {
    Some((head, rest)) => {
      let rest = rest.trim();
      Invocation {
        head,
        arg: (!rest.is_empty()).then_some(rest),
      }
    }
    None => Invocation {
      head: input,
      arg: None,
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = suggest("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = suggest("gainers");
    assert_eq!(suggestions[0].name, "gainers");
  }

  #[test]
  fn test_alias_beats_prefix() {
    // "s" is an alias of stocks and a prefix of scrape
    let names: Vec<_> = suggest("s").iter().map(|c| c.name).collect();
    assert_eq!(names[..2], ["stocks", "scrape"]);
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = suggest("cate");
    assert_eq!(suggestions[0].name, "categories");
  }

  #[test]
  fn test_contains_match() {
    let suggestions = suggest("ser");
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].name, "losers");
  }

  #[test]
  fn test_argument_limits_to_commands_taking_one() {
    let names: Vec<_> = suggest("s OGDC").iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["stocks"]);

    assert!(suggest("gainers 10").is_empty());
    assert_eq!(suggest("f Money Market")[0].usage(), "funds [CATEGORY]");
  }

  #[test]
  fn test_split_invocation() {
    assert_eq!(
      split_invocation("  funds Money Market "),
      Invocation {
        head: "funds",
        arg: Some("Money Market")
      }
    );
    assert_eq!(
      split_invocation("gainers"),
      Invocation {
        head: "gainers",
        arg: None
      }
    );
  }
}
