use crate::api::types::{
  CategoryCount, Domain, Fund, HealthReport, MarketIndex, MarketSummary, Stock,
};
use crate::app::StockListKind;
use crate::cache::CacheSource;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh and auto-reload
  Tick,
  /// Result of a background load
  Data(DataEvent),
  Error(String),
}

/// Data delivered by background loads.
#[derive(Debug)]
pub enum DataEvent {
  Overview {
    summary: Option<MarketSummary>,
    indices: Vec<MarketIndex>,
    health: Option<HealthReport>,
    source: CacheSource,
  },
  Funds {
    category: Option<String>,
    funds: Vec<Fund>,
    total: Option<usize>,
    source: CacheSource,
  },
  Categories {
    categories: Vec<CategoryCount>,
    source: CacheSource,
  },
  Stocks {
    kind: StockListKind,
    stocks: Vec<Stock>,
    source: CacheSource,
  },
  StockDetail {
    stock: Stock,
    source: CacheSource,
  },
  ScrapeStarted {
    domain: Domain,
    message: String,
  },
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    let input_tx = tx.clone();

    // crossterm polling blocks, keep it off the async workers
    tokio::task::spawn_blocking(move || loop {
      let event = match event::poll(tick_rate) {
        Ok(true) => match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
          _ => continue,
        },
        Ok(false) => Event::Tick,
        Err(e) => {
          let _ = input_tx.send(Event::Error(format!("terminal input failed: {}", e)));
          break;
        }
      };
      if input_tx.send(event).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  /// Sender handed to background loads
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
