use crate::api::types::User;
use crate::cache::{CacheEvent, Mutation};
use crate::config::Config;
use crate::context::AppContext;
use crate::event::{Event, EventHandler};
use crate::query::{Query, QueryState};
use crate::toast::Toast;
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{DashboardView, LoginView, ProjectListView, TaskBoardView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::event::{DisableFocusChange, EnableFocusChange};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::{stdout, Stdout};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// Main application state
pub struct App {
  ctx: AppContext,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` command palette
  command: CommandInput,

  /// Signed-in user, shown in the header and watched for sign-outs
  session: Query<Option<User>>,

  cache_events: broadcast::Receiver<CacheEvent>,

  /// Configured credentials are tried once per run
  auto_sign_in_tried: bool,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(ctx: AppContext) -> Self {
    let root = root_view(&ctx);
    let session = ctx.session();
    let cache_events = ctx.cache.events();

    Self {
      ctx,
      view_stack: vec![root],
      command: CommandInput::new(),
      session,
      cache_events,
      auto_sign_in_tried: false,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Short ticks keep toast expiry close to its deadline
    let mut events = EventHandler::new(Duration::from_millis(100));
    info!("taskdeck started");

    let result = self.main_loop(&mut terminal, &mut events).await;

    // Cleanup terminal
    stdout().execute(DisableFocusChange)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    info!("taskdeck stopped");
    result
  }

  async fn main_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.on_tick(),
        Some(Event::Resize) => {}
        // Toast timers pause while the terminal is in the background
        Some(Event::Focus(true)) => self.ctx.toasts.resume(),
        Some(Event::Focus(false)) => self.ctx.toasts.suspend(),
        None => break,
      }
    }
    Ok(())
  }

  // ==========================================================================
  // Accessors for drawing
  // ==========================================================================

  pub fn header_title(&self) -> String {
    self.ctx.config.header_title()
  }

  pub fn user_name(&self) -> Option<String> {
    self
      .session
      .data()?
      .as_ref()
      .map(|user| user.display_name().to_string())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    self
      .view_stack
      .last()
      .map(|view| view.shortcuts())
      .unwrap_or_default()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|view| view.breadcrumb_label())
      .collect()
  }

  pub fn command(&self) -> &CommandInput {
    &self.command
  }

  pub fn toasts(&self) -> Vec<Toast> {
    self.ctx.toasts.toasts()
  }

  // ==========================================================================
  // Tick
  // ==========================================================================

  fn on_tick(&mut self) {
    self.ctx.toasts.sweep();
    self.ctx.cache.prune();
    self.drain_cache_events();

    if self.session.poll() && matches!(self.session.state(), QueryState::Success(None)) {
      debug!("No session");
      self.require_sign_in();
    }

    // Every view keeps its data fresh; only the top one may navigate
    let top = self.view_stack.len().saturating_sub(1);
    let mut action = ViewAction::None;
    for (idx, view) in self.view_stack.iter_mut().enumerate() {
      let result = view.tick();
      if idx == top {
        action = result;
      }
    }
    self.apply(action);
  }

  fn drain_cache_events(&mut self) {
    let mut expired = false;
    loop {
      match self.cache_events.try_recv() {
        Ok(CacheEvent::Unauthenticated) => expired = true,
        Ok(_) => {}
        Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "Missed cache events"),
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
      }
    }
    if expired {
      self.require_sign_in();
    }
  }

  /// Cover the current view with the sign-in form, unless it already is.
  fn require_sign_in(&mut self) {
    let covered = self
      .view_stack
      .last()
      .is_some_and(|view| !view.requires_session());
    if covered {
      return;
    }

    let credentials = if self.auto_sign_in_tried {
      None
    } else {
      self.auto_sign_in_tried = true;
      self
        .ctx
        .config
        .api
        .email
        .clone()
        .zip(Config::get_password())
    };

    let login = match credentials {
      Some((email, password)) => LoginView::auto(self.ctx.clone(), email, password),
      None => LoginView::new(self.ctx.clone()),
    };
    self.view_stack.push(Box::new(login));
  }

  // ==========================================================================
  // Input
  // ==========================================================================

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let captured = self
      .view_stack
      .last()
      .is_some_and(|view| view.captures_input());

    if self.command.is_active() || !captured {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(cmd)) => {
          self.execute_command(&cmd);
          return;
        }
        KeyResult::NotHandled => {}
        KeyResult::Handled | KeyResult::Event(CommandEvent::Cancelled) => return,
      }
    }

    if !captured && key.code == KeyCode::Char('x') {
      self.ctx.toasts.dismiss_latest();
      return;
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => {
        debug!(view = %view.breadcrumb_label(), "Push view");
        self.view_stack.push(view);
      }
      // The root stays; quitting is explicit
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        }
      }
    }
  }

  fn set_root(&mut self, view: Box<dyn View>) {
    self.view_stack = vec![view];
  }

  fn execute_command(&mut self, cmd: &str) {
    info!(command = cmd, "Executing command");
    match cmd {
      "dashboard" => self.set_root(Box::new(DashboardView::new(self.ctx.clone()))),
      "projects" => self.set_root(Box::new(ProjectListView::new(self.ctx.clone()))),
      "tasks" => self.set_root(Box::new(TaskBoardView::all(self.ctx.clone()))),
      "me" => self.set_root(Box::new(TaskBoardView::personal(self.ctx.clone()))),
      "logout" => {
        // Nothing to wait for: sign-out only drops local state
        self.ctx.toasts.clear();
        drop(self.ctx.submit(Mutation::SignOut, "Signed out"));
        self.set_root(root_view(&self.ctx));
        self
          .view_stack
          .push(Box::new(LoginView::new(self.ctx.clone())));
      }
      "quit" => self.should_quit = true,
      "" => {}
      other => {
        self.ctx.toasts.warning(format!("Unknown command: {}", other));
      }
    }
  }
}

/// Dashboard, or the default project's board when one is configured
fn root_view(ctx: &AppContext) -> Box<dyn View> {
  match &ctx.config.default_project {
    Some(id) => Box::new(TaskBoardView::project(ctx.clone(), id.clone(), id.clone())),
    None => Box::new(DashboardView::new(ctx.clone())),
  }
}
