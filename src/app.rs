use crate::api::types::{
  CategoryCount, Domain, Fund, FundQuery, HealthReport, MarketIndex, MarketSummary, Stock,
  StockQuery,
};
use crate::api::{FetchError, PkFinanceClient};
use crate::cache::{CacheSource, CacheStats};
use crate::commands::{self, Command};
use crate::config::Config;
use crate::event::{DataEvent, Event, EventHandler};
use crate::ui;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
  Search,
}

/// Which PSX ranking a stock list shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockListKind {
  All,
  Gainers,
  Losers,
  Active,
}

impl StockListKind {
  pub fn title(self) -> &'static str {
    match self {
      StockListKind::All => "Stocks",
      StockListKind::Gainers => "Top Gainers",
      StockListKind::Losers => "Top Losers",
      StockListKind::Active => "Most Active",
    }
  }
}

/// View state - each variant owns its data
#[derive(Debug)]
pub enum ViewState {
  // Root views (set via : commands)
  Overview {
    summary: Option<MarketSummary>,
    indices: Vec<MarketIndex>,
    health: Option<HealthReport>,
    loading: bool,
  },
  FundList {
    funds: Vec<Fund>,
    selected: usize,
    category: Option<String>,
    total: Option<usize>,
    loading: bool,
  },
  Categories {
    categories: Vec<CategoryCount>,
    selected: usize,
    loading: bool,
  },
  StockList {
    kind: StockListKind,
    stocks: Vec<Stock>,
    selected: usize,
    loading: bool,
  },

  // Detail views (pushed via Enter)
  StockDetail {
    symbol: String,
    stock: Option<Box<Stock>>,
    loading: bool,
  },
}

impl ViewState {
  fn overview() -> Self {
    ViewState::Overview {
      summary: None,
      indices: Vec::new(),
      health: None,
      loading: true,
    }
  }

  fn fund_list(category: Option<String>) -> Self {
    ViewState::FundList {
      funds: Vec::new(),
      selected: 0,
      category,
      total: None,
      loading: true,
    }
  }

  fn stock_list(kind: StockListKind) -> Self {
    ViewState::StockList {
      kind,
      stocks: Vec::new(),
      selected: 0,
      loading: true,
    }
  }

  fn stock_detail(symbol: &str) -> Self {
    ViewState::StockDetail {
      symbol: symbol.to_uppercase(),
      stock: None,
      loading: true,
    }
  }

  /// Domain a scrape triggered from this view refreshes
  fn domain(&self) -> Domain {
    match self {
      ViewState::FundList { .. } | ViewState::Categories { .. } => Domain::Mufap,
      _ => Domain::Psx,
    }
  }

  fn set_loading(&mut self, value: bool) {
    match self {
      ViewState::Overview { loading, .. }
      | ViewState::FundList { loading, .. }
      | ViewState::Categories { loading, .. }
      | ViewState::StockList { loading, .. }
      | ViewState::StockDetail { loading, .. } => *loading = value,
    }
  }

  /// Number of rows left after applying the search filter
  fn visible_len(&self, filter: &str) -> usize {
    match self {
      ViewState::FundList { funds, .. } => funds
        .iter()
        .filter(|f| matches_filter(&f.fund_name, filter))
        .count(),
      ViewState::Categories { categories, .. } => categories
        .iter()
        .filter(|c| matches_filter(&c.category, filter))
        .count(),
      ViewState::StockList { stocks, .. } => stocks
        .iter()
        .filter(|s| matches_filter(&s.symbol, filter))
        .count(),
      ViewState::Overview { .. } | ViewState::StockDetail { .. } => 0,
    }
  }

  /// Get the label for this view in the breadcrumb
  fn breadcrumb_label(&self) -> String {
    match self {
      ViewState::Overview { .. } => "Overview".to_string(),
      ViewState::FundList { category, .. } => match category {
        Some(category) => format!("Funds [{}]", category),
        None => "Funds".to_string(),
      },
      ViewState::Categories { .. } => "Categories".to_string(),
      ViewState::StockList { kind, .. } => kind.title().to_string(),
      ViewState::StockDetail { symbol, .. } => symbol.clone(),
    }
  }
}

/// Case-insensitive substring match used by the `/` filter
pub fn matches_filter(text: &str, filter: &str) -> bool {
  filter.is_empty() || text.to_lowercase().contains(&filter.to_lowercase())
}

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<ViewState>,

  /// Current input mode
  mode: Mode,

  /// Command input buffer (after pressing :)
  command_input: String,

  /// Search filter input (after pressing /)
  search_filter: String,

  /// Selected autocomplete suggestion index
  selected_suggestion: usize,

  /// Application configuration
  config: Config,

  /// Cached API client
  client: PkFinanceClient,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Where the data on screen came from
  last_source: Option<CacheSource>,

  /// Last error or notice for the status bar
  message: Option<String>,

  last_reload: Instant,

  /// Reload once background revalidation had time to land
  reload_due: Option<Instant>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let client = PkFinanceClient::new(&config)?;
    let (tx, _rx) = mpsc::unbounded_channel();

    Ok(Self {
      view_stack: vec![ViewState::overview()],
      mode: Mode::Normal,
      command_input: String::new(),
      search_filter: String::new(),
      selected_suggestion: 0,
      config,
      client,
      event_tx: tx,
      last_source: None,
      message: None,
      last_reload: Instant::now(),
      reload_due: None,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();

    // Initial data load
    self.reload_current();

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      // Draw UI
      terminal.draw(|frame| ui::draw(frame, self))?;

      // Handle events
      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.on_tick(),
      Event::Data(data) => self.handle_data_event(data),
      Event::Error(msg) => {
        warn!(error = %msg, "background load failed");
        if let Some(view) = self.view_stack.last_mut() {
          view.set_loading(false);
        }
        self.message = Some(msg);
      }
    }
  }

  /// Reload the visible view once the refresh interval has passed. The
  /// cache decides whether that touches the network.
  fn on_tick(&mut self) {
    if self.reload_due.is_some_and(|due| Instant::now() >= due) {
      self.reload_due = None;
      self.reload_current();
      return;
    }
    let interval = Duration::from_secs(self.config.dashboard.refresh_secs.max(1));
    if self.last_reload.elapsed() >= interval {
      debug!("auto-refreshing current view");
      self.reload_current();
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
      Mode::Search => self.handle_search_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      // Quit
      KeyCode::Char('q') => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }

      // Navigation
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Enter => self.enter_selected(),
      KeyCode::Esc => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.search_filter.clear();
        }
      }

      // Data
      KeyCode::Char('r') => self.revalidate(),
      KeyCode::Char('R') => self.refresh_all(),
      KeyCode::Char('S') => self.trigger_scrape(),

      // Mode switches
      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
      }
      KeyCode::Char('/') => {
        self.mode = Mode::Search;
        self.search_filter.clear();
      }

      _ => {}
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.execute_command();
        self.mode = Mode::Normal;
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        // Navigate autocomplete suggestions
        let suggestions = self.autocomplete_suggestions();
        if !suggestions.is_empty() {
          self.selected_suggestion = (self.selected_suggestion + 1) % suggestions.len();
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        // Navigate autocomplete suggestions backwards
        let suggestions = self.autocomplete_suggestions();
        if !suggestions.is_empty() {
          self.selected_suggestion = if self.selected_suggestion == 0 {
            suggestions.len() - 1
          } else {
            self.selected_suggestion - 1
          };
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0; // Reset selection on input change
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0; // Reset selection on input change
      }
      _ => {}
    }
  }

  fn handle_search_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.search_filter.clear();
        self.reset_selection();
      }
      KeyCode::Enter => {
        // Apply filter and return to normal mode
        self.mode = Mode::Normal;
      }
      KeyCode::Backspace => {
        self.search_filter.pop();
        self.reset_selection();
      }
      KeyCode::Char(c) => {
        self.search_filter.push(c);
        self.reset_selection();
      }
      _ => {}
    }
  }

  fn execute_command(&mut self) {
    let input = std::mem::take(&mut self.command_input);
    let invocation = commands::split_invocation(&input);

    // Get the command to execute - either from selected suggestion or direct input
    let suggestions = commands::suggest(&input);
    let cmd = match suggestions.get(self.selected_suggestion) {
      Some(command) => command.name,
      None => {
        self.message = Some(format!("Unknown command: {}", invocation.head));
        return;
      }
    };

    match cmd {
      "overview" => self.set_root(ViewState::overview()),
      "funds" => self.set_root(ViewState::fund_list(invocation.arg.map(String::from))),
      "categories" => self.set_root(ViewState::Categories {
        categories: Vec::new(),
        selected: 0,
        loading: true,
      }),
      "stocks" => match invocation.arg {
        Some(symbol) => self.push_view(ViewState::stock_detail(symbol)),
        None => self.set_root(ViewState::stock_list(StockListKind::All)),
      },
      "gainers" => self.set_root(ViewState::stock_list(StockListKind::Gainers)),
      "losers" => self.set_root(ViewState::stock_list(StockListKind::Losers)),
      "active" => self.set_root(ViewState::stock_list(StockListKind::Active)),
      "refresh" => self.refresh_all(),
      "scrape" => self.trigger_scrape(),
      "quit" => {
        self.should_quit = true;
      }
      _ => {}
    }
  }

  fn set_root(&mut self, view: ViewState) {
    self.view_stack.truncate(1);
    self.view_stack[0] = view;
    self.search_filter.clear();
    self.reload_current();
  }

  fn push_view(&mut self, view: ViewState) {
    self.view_stack.push(view);
    self.reload_current();
  }

  /// Refresh cached responses in the background while the current data
  /// stays on screen.
  fn revalidate(&mut self) {
    let count = self.client.revalidate_all();
    if count == 0 {
      self.reload_current();
      return;
    }
    self.message = Some(format!("Refreshing {} cached responses", count));
    self.reload_due = Some(Instant::now() + Duration::from_secs(1));
  }

  /// Drop every cached response and reload what is on screen.
  fn refresh_all(&mut self) {
    self.client.refresh_all();
    self.message = Some("Cache cleared".to_string());
    self.reload_current();
  }

  fn trigger_scrape(&mut self) {
    let Some(view) = self.view_stack.last() else {
      return;
    };
    let domain = view.domain();
    let client = self.client.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let event = match client.trigger_scrape(domain).await {
        Ok(ack) => Event::Data(DataEvent::ScrapeStarted {
          domain,
          message: ack.message.unwrap_or(ack.status),
        }),
        Err(e) => Event::Error(format!("Scrape of {} failed: {}", domain, e)),
      };
      let _ = tx.send(event);
    });
  }

  /// Load the data of the top view in the background.
  fn reload_current(&mut self) {
    self.last_reload = Instant::now();
    let Some(view) = self.view_stack.last_mut() else {
      return;
    };
    view.set_loading(true);

    let client = self.client.clone();
    let tx = self.event_tx.clone();
    let limit = self.config.dashboard.list_limit;

    match view {
      ViewState::Overview { .. } => {
        spawn_load(tx, async move {
          let (summary, indices, health) = tokio::join!(
            client.market_summary(),
            client.indices(),
            client.health()
          );
          // Show whatever part of the overview is available
          if let (Err(e), Err(_), Err(_)) = (&summary, &indices, &health) {
            return Err(e.clone());
          }
          let source = [
            summary.as_ref().ok().map(|f| f.source),
            indices.as_ref().ok().map(|f| f.source),
          ]
          .into_iter()
          .flatten()
          .next()
          .unwrap_or(CacheSource::Network);
          Ok(DataEvent::Overview {
            summary: summary.ok().map(|f| f.data),
            indices: indices.map(|f| f.data.data).unwrap_or_default(),
            health: health.ok().map(|f| f.data),
            source,
          })
        });
      }
      ViewState::FundList { category, .. } => {
        let category = category.clone();
        spawn_load(tx, async move {
          let query = FundQuery {
            category: category.clone(),
            sort_by: Some("nav".to_string()),
            ascending: Some(false),
            ..FundQuery::default()
          };
          let fetched = client.funds(&query).await?;
          Ok(DataEvent::Funds {
            category,
            total: fetched.data.total_filtered.or(fetched.data.total_available),
            funds: fetched.data.data,
            source: fetched.source,
          })
        });
      }
      ViewState::Categories { .. } => {
        spawn_load(tx, async move {
          let fetched = client.fund_categories().await?;
          Ok(DataEvent::Categories {
            categories: fetched.data.categories,
            source: fetched.source,
          })
        });
      }
      ViewState::StockList { kind, .. } => {
        let kind = *kind;
        spawn_load(tx, async move {
          let fetched = match kind {
            StockListKind::All => {
              let query = StockQuery {
                sort_by: Some("volume".to_string()),
                ascending: Some(false),
                ..StockQuery::default()
              };
              let fetched = client.stocks(&query).await?;
              (fetched.data.data, fetched.source)
            }
            StockListKind::Gainers => {
              let fetched = client.gainers(limit).await?;
              (fetched.data.data, fetched.source)
            }
            StockListKind::Losers => {
              let fetched = client.losers(limit).await?;
              (fetched.data.data, fetched.source)
            }
            StockListKind::Active => {
              let fetched = client.most_active(limit).await?;
              (fetched.data.data, fetched.source)
            }
          };
          Ok(DataEvent::Stocks {
            kind,
            stocks: fetched.0,
            source: fetched.1,
          })
        });
      }
      ViewState::StockDetail { symbol, .. } => {
        let symbol = symbol.clone();
        spawn_load(tx, async move {
          let fetched = client.stock(&symbol).await?;
          Ok(DataEvent::StockDetail {
            stock: fetched.data.data,
            source: fetched.source,
          })
        });
      }
    }
  }

  fn handle_data_event(&mut self, event: DataEvent) {
    let source = match &event {
      DataEvent::Overview { source, .. }
      | DataEvent::Funds { source, .. }
      | DataEvent::Categories { source, .. }
      | DataEvent::Stocks { source, .. }
      | DataEvent::StockDetail { source, .. } => Some(*source),
      DataEvent::ScrapeStarted { .. } => None,
    };

    let mut scraped = None;
    let applied = match (event, self.view_stack.last_mut()) {
      (
        DataEvent::Overview {
          summary,
          indices,
          health,
          ..
        },
        Some(ViewState::Overview {
          summary: s,
          indices: i,
          health: h,
          loading,
        }),
      ) => {
        *s = summary;
        *i = indices;
        *h = health;
        *loading = false;
        true
      }
      (
        DataEvent::Funds {
          category,
          funds,
          total,
          ..
        },
        Some(ViewState::FundList {
          funds: list,
          category: current,
          total: t,
          selected,
          loading,
        }),
      ) if category == *current => {
        *list = funds;
        *t = total;
        *selected = (*selected).min(list.len().saturating_sub(1));
        *loading = false;
        true
      }
      (
        DataEvent::Categories { categories, .. },
        Some(ViewState::Categories {
          categories: list,
          selected,
          loading,
        }),
      ) => {
        *list = categories;
        *selected = (*selected).min(list.len().saturating_sub(1));
        *loading = false;
        true
      }
      (
        DataEvent::Stocks { kind, stocks, .. },
        Some(ViewState::StockList {
          kind: current,
          stocks: list,
          selected,
          loading,
        }),
      ) if kind == *current => {
        *list = stocks;
        *selected = (*selected).min(list.len().saturating_sub(1));
        *loading = false;
        true
      }
      (
        DataEvent::StockDetail { stock, .. },
        Some(ViewState::StockDetail {
          symbol,
          stock: current,
          loading,
        }),
      ) if stock.symbol.eq_ignore_ascii_case(symbol) => {
        *current = Some(Box::new(stock));
        *loading = false;
        true
      }
      (DataEvent::ScrapeStarted { domain, message }, _) => {
        self.message = Some(format!("{}: {}", domain, message));
        scraped = Some(domain);
        false
      }
      // Result for a view that is no longer on screen
      _ => false,
    };

    if applied {
      self.last_source = source;
      self.message = None;
    }

    // The scrape dropped this domain's cached responses
    if let Some(domain) = scraped {
      if self.view_stack.last().is_some_and(|view| view.domain() == domain) {
        self.reload_current();
      }
    }
  }

  fn reset_selection(&mut self) {
    if let Some(
      ViewState::FundList { selected, .. }
      | ViewState::Categories { selected, .. }
      | ViewState::StockList { selected, .. },
    ) = self.view_stack.last_mut()
    {
      *selected = 0;
    }
  }

  fn move_selection(&mut self, delta: i32) {
    let filter = self.search_filter.clone();
    if let Some(view) = self.view_stack.last_mut() {
      let len = view.visible_len(&filter);
      match view {
        ViewState::FundList { selected, .. }
        | ViewState::Categories { selected, .. }
        | ViewState::StockList { selected, .. } => {
          if len > 0 {
            *selected = (*selected as i32 + delta).rem_euclid(len as i32) as usize;
          }
        }
        ViewState::Overview { .. } | ViewState::StockDetail { .. } => {}
      }
    }
  }

  fn enter_selected(&mut self) {
    let filter = self.search_filter.as_str();
    let next = match self.view_stack.last() {
      Some(ViewState::Categories {
        categories,
        selected,
        ..
      }) => categories
        .iter()
        .filter(|c| matches_filter(&c.category, filter))
        .nth(*selected)
        .map(|c| ViewState::fund_list(Some(c.category.clone()))),
      Some(ViewState::StockList {
        stocks, selected, ..
      }) => stocks
        .iter()
        .filter(|s| matches_filter(&s.symbol, filter))
        .nth(*selected)
        .map(|s| ViewState::stock_detail(&s.symbol)),
      _ => None,
    };

    if let Some(view) = next {
      self.search_filter.clear();
      self.push_view(view);
    }
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&ViewState> {
    self.view_stack.last()
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn search_filter(&self) -> &str {
    &self.search_filter
  }

  pub fn base_url(&self) -> &str {
    &self.config.api.base_url
  }

  pub fn last_source(&self) -> Option<CacheSource> {
    self.last_source
  }

  pub fn message(&self) -> Option<&str> {
    self.message.as_deref()
  }

  pub fn cache_stats(&self) -> CacheStats {
    self.client.stats()
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::suggest(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }
}

/// Run a load and report its outcome on the event channel.
fn spawn_load<F>(tx: mpsc::UnboundedSender<Event>, load: F)
where
  F: std::future::Future<Output = Result<DataEvent, FetchError>> + Send + 'static,
{
  tokio::spawn(async move {
    let event = match load.await {
      Ok(data) => Event::Data(data),
      Err(e) if e.status() == Some(404) => Event::Error("Not found".to_string()),
      Err(e) => Event::Error(e.to_string()),
    };
    let _ = tx.send(event);
  });
}
