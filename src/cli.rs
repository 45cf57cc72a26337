//! One-shot subcommands that print to stdout.

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::io::Write;
use url::Url;

use crate::api::types::{Domain, Fund, FundQuery, MarketIndex, Stock, StockQuery};
use crate::api::{Fetched, PkFinanceClient};
use crate::config::Config;
use crate::shell::{self, RegisterOutcome, RequestMode, ShellRegistration, ShellRequest};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Backend and scraper health
  Health,
  /// List mutual funds
  Funds {
    /// Search fund names instead of listing
    #[arg(short, long)]
    search: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    trustee: Option<String>,
    #[arg(long)]
    min_nav: Option<f64>,
    #[arg(long)]
    max_nav: Option<f64>,
    #[arg(long)]
    sort_by: Option<String>,
    /// Sort ascending instead of descending
    #[arg(long)]
    asc: bool,
    #[arg(short, long)]
    limit: Option<usize>,
    #[arg(long)]
    offset: Option<usize>,
  },
  /// Fund categories with fund counts
  FundCategories,
  /// Every fund in one category
  FundCategory { category: String },
  /// Funds with the highest NAV
  TopNav {
    #[arg(short, long, default_value_t = 10)]
    limit: usize,
    #[arg(long)]
    category: Option<String>,
  },
  /// NAV statistics, optionally for one category
  FundStats {
    #[arg(long)]
    category: Option<String>,
  },
  /// List PSX stocks
  Stocks {
    /// Search by symbol instead of listing
    #[arg(short, long)]
    search: Option<String>,
    #[arg(long)]
    min_price: Option<f64>,
    #[arg(long)]
    max_price: Option<f64>,
    #[arg(long)]
    min_volume: Option<u64>,
    #[arg(long)]
    sort_by: Option<String>,
    /// Sort ascending instead of descending
    #[arg(long)]
    asc: bool,
    #[arg(short, long)]
    limit: Option<usize>,
    #[arg(long)]
    offset: Option<usize>,
  },
  /// Top gainers
  Gainers {
    #[arg(short, long, default_value_t = 10)]
    limit: usize,
  },
  /// Top losers
  Losers {
    #[arg(short, long, default_value_t = 10)]
    limit: usize,
  },
  /// Most active by volume
  Active {
    #[arg(short, long, default_value_t = 10)]
    limit: usize,
  },
  /// Market breadth and volume
  Summary,
  /// Market indices
  Indices,
  /// One stock by symbol
  Stock { symbol: String },
  /// Ask the backend to re-scrape mufap or psx
  Scrape { domain: Domain },
  /// Raw JSON of any GET endpoint, e.g. /api/psx/stocks/summary
  Get { path: String },
  /// Interactive dashboard (the default)
  Dashboard,
  /// Offline shell asset cache
  Shell {
    #[command(subcommand)]
    action: ShellAction,
  },
}

#[derive(Subcommand, Debug)]
pub enum ShellAction {
  /// Install the configured shell version
  Install,
  /// Hand control to the version waiting for clients to close
  Release,
  /// Show installed asset caches
  Status,
  /// Fetch a path through the shell
  Fetch {
    path: String,
    /// Treat the request as a page navigation
    #[arg(long)]
    navigate: bool,
  },
}

pub async fn run(command: Command, config: &Config, json: bool) -> Result<()> {
  let command = match command {
    Command::Shell { action } => return run_shell(action, config).await,
    other => other,
  };

  let client = PkFinanceClient::new(config)?;
  match command {
    Command::Health => {
      let fetched = client.health().await?;
      emit(json, &fetched, |h| {
        println!("status: {}", h.status);
        for (name, domain) in [("mufap", &h.mufap), ("psx", &h.psx)] {
          let scraped = domain
            .last_scrape
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
          println!(
            "{:<6} ready={} cached={} last_scrape={}",
            name, domain.ready, domain.cached, scraped
          );
        }
        if let Some(next) = &h.next_scrape {
          println!("next scrape: {}", next);
        }
      })?;
    }
    Command::Funds {
      search: Some(term), ..
    } => {
      let fetched = client.search_funds(&term).await?;
      emit(json, &fetched, |list| print_funds(&list.data))?;
    }
    Command::Funds {
      search: None,
      category,
      trustee,
      min_nav,
      max_nav,
      sort_by,
      asc,
      limit,
      offset,
    } => {
      let query = FundQuery {
        category,
        trustee,
        min_nav,
        max_nav,
        sort_by,
        ascending: asc.then_some(true),
        limit,
        offset,
      };
      let fetched = client.funds(&query).await?;
      emit(json, &fetched, |list| {
        print_funds(&list.data);
        if let Some(total) = list.total_filtered.or(list.total_available) {
          println!("{} of {} funds", list.count, total);
        }
      })?;
    }
    Command::FundCategories => {
      let fetched = client.fund_categories().await?;
      emit(json, &fetched, |c| {
        for category in &c.categories {
          println!("{:<40} {:>6}", category.category, category.count);
        }
      })?;
    }
    Command::FundCategory { category } => {
      let fetched = client.funds_in_category(&category).await?;
      emit(json, &fetched, |list| print_funds(&list.data))?;
    }
    Command::TopNav { limit, category } => {
      let fetched = client.top_nav(limit, category.as_deref()).await?;
      emit(json, &fetched, |list| print_funds(&list.data))?;
    }
    Command::FundStats { category } => {
      let fetched = client.fund_stats(category.as_deref()).await?;
      emit(json, &fetched, |s| {
        println!("funds: {}  categories: {}", s.total_funds, s.total_categories);
        println!(
          "nav mean={} median={} min={} max={}",
          num(s.nav.mean),
          num(s.nav.median),
          num(s.nav.min),
          num(s.nav.max)
        );
      })?;
    }
    Command::Stocks {
      search: Some(symbol),
      ..
    } => {
      let fetched = client.search_stocks(&symbol).await?;
      emit(json, &fetched, |list| print_stocks(&list.data))?;
    }
    Command::Stocks {
      search: None,
      min_price,
      max_price,
      min_volume,
      sort_by,
      asc,
      limit,
      offset,
    } => {
      let query = StockQuery {
        min_price,
        max_price,
        min_volume,
        sort_by,
        ascending: asc.then_some(true),
        limit,
        offset,
      };
      let fetched = client.stocks(&query).await?;
      emit(json, &fetched, |list| print_stocks(&list.data))?;
    }
    Command::Gainers { limit } => {
      let fetched = client.gainers(limit).await?;
      emit(json, &fetched, |list| print_stocks(&list.data))?;
    }
    Command::Losers { limit } => {
      let fetched = client.losers(limit).await?;
      emit(json, &fetched, |list| print_stocks(&list.data))?;
    }
    Command::Active { limit } => {
      let fetched = client.most_active(limit).await?;
      emit(json, &fetched, |list| print_stocks(&list.data))?;
    }
    Command::Summary => {
      let fetched = client.market_summary().await?;
      emit(json, &fetched, |s| {
        println!(
          "{} stocks: {} up, {} down, {} unchanged",
          s.total_stocks, s.gainers, s.losers, s.unchanged
        );
        println!("volume: {}  avg change: {}%", s.total_volume, num(s.avg_change_pct));
      })?;
    }
    Command::Indices => {
      let fetched = client.indices().await?;
      emit(json, &fetched, |list| print_indices(&list.data))?;
    }
    Command::Stock { symbol } => {
      let fetched = client.stock(&symbol).await?;
      emit(json, &fetched, |detail| print_stocks(std::slice::from_ref(&detail.data)))?;
    }
    Command::Get { path } => {
      let payload = client.raw(&path).await?;
      println!("{}", serde_json::to_string_pretty(&*payload)?);
    }
    Command::Scrape { domain } => {
      let ack = client.trigger_scrape(domain).await?;
      println!("{}: {}", ack.status, ack.message.unwrap_or_default());
    }
    Command::Dashboard | Command::Shell { .. } => {}
  }
  Ok(())
}

async fn run_shell(action: ShellAction, config: &Config) -> Result<()> {
  let store = shell::open_store(config)?;
  let (mut registration, deleted) = shell::load_registration(config, store.clone())?;
  print_deleted(&deleted);

  match action {
    ShellAction::Install => {
      let worker = shell::configured_worker(config, store.clone())?;
      match registration.register(worker).await? {
        RegisterOutcome::Activated { deleted } => print_deleted(&deleted),
        RegisterOutcome::Waiting => {
          println!("installed; run `pkfin shell release` once the active version has no clients")
        }
        RegisterOutcome::Unchanged => println!("already installed"),
      }
      print_registration(&registration);
    }
    ShellAction::Release => {
      match registration.release_clients()? {
        Some(deleted) => print_deleted(&deleted),
        None => println!("no shell version is waiting"),
      }
      print_registration(&registration);
    }
    ShellAction::Status => {
      let names = store.cache_names()?;
      if names.is_empty() {
        println!("no shell caches installed");
      }
      let active = registration.active().map(|w| w.cache_name());
      let waiting = registration.waiting().map(|w| w.cache_name());
      for name in names {
        let marker = if Some(name.as_str()) == active {
          "*"
        } else if Some(name.as_str()) == waiting {
          "+"
        } else {
          " "
        };
        println!("{} {:<32} {} assets", marker, name, store.entry_count(&name)?);
      }
    }
    ShellAction::Fetch { path, navigate } => {
      if registration.active().is_none() {
        eprintln!("no shell installed, going to the network");
      }
      let origin = Url::parse(config.shell_origin())
        .map_err(|e| eyre!("Invalid shell origin {}: {}", config.shell_origin(), e))?;
      let url = origin
        .join(&path)
        .map_err(|e| eyre!("Invalid path {}: {}", path, e))?;
      let mode = if navigate {
        RequestMode::Navigate
      } else {
        RequestMode::Subresource
      };

      let served = registration.handle_fetch(&ShellRequest::get(url, mode)).await?;
      eprintln!(
        "{} {:?} ({})",
        served.response.status,
        served.served_from,
        served.response.content_type.as_deref().unwrap_or("unknown type")
      );
      std::io::stdout().write_all(&served.response.body)?;
    }
  }
  Ok(())
}

fn print_deleted(deleted: &[String]) {
  for name in deleted {
    println!("deleted {}", name);
  }
}

fn print_registration(registration: &ShellRegistration) {
  for (role, worker) in [
    ("active", registration.active()),
    ("waiting", registration.waiting()),
  ] {
    if let Some(worker) = worker {
      let control = if worker.is_controlling() { ", controlling" } else { "" };
      println!("{}: {} ({}{})", role, worker.cache_name(), worker.state(), control);
    }
  }
}

/// Print JSON or a table, then where the data came from.
fn emit<D: Serialize>(json: bool, fetched: &Fetched<D>, table: impl FnOnce(&D)) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(&fetched.data)?);
  } else {
    table(&fetched.data);
  }
  match fetched.cached_at {
    Some(at) => eprintln!("[{}, cached {}]", fetched.source.label(), at.format("%H:%M:%S")),
    None => eprintln!("[{}]", fetched.source.label()),
  }
  Ok(())
}

fn num(value: Option<f64>) -> String {
  value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

fn print_funds(funds: &[Fund]) {
  for fund in funds {
    println!(
      "{:<50} {:<24} {:>10} {}",
      fund.fund_name,
      fund.fund_category,
      num(Some(fund.nav)),
      fund.date_updated.as_deref().unwrap_or("")
    );
  }
}

fn print_stocks(stocks: &[Stock]) {
  for stock in stocks {
    println!(
      "{:<10} {:>10} {:>9} {:>8}% {:>14}",
      stock.symbol,
      num(stock.current),
      num(stock.change),
      num(stock.change_pct),
      stock.volume.map(|v| v.to_string()).unwrap_or_default()
    );
  }
}

fn print_indices(indices: &[MarketIndex]) {
  for index in indices {
    println!(
      "{:<14} {:>12} {:>9} {:>8}%",
      index.index_name,
      num(index.value),
      num(index.change),
      num(index.change_pct)
    );
  }
}
