use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use tracing::info;

use crate::api::types::{Credentials, Registration};
use crate::cache::Mutation;
use crate::context::{AppContext, PendingMutation, INVALID_CREDENTIALS};
use crate::ui::components::{Form, FormEvent, KeyResult};
use crate::ui::view::{Shortcut, View, ViewAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  SignIn,
  SignUp,
}

/// Sign-in / sign-up form shown whenever there is no session
pub struct LoginView {
  ctx: AppContext,
  mode: Mode,
  form: Form,
  pending: Option<PendingMutation>,
}

fn sign_in_form(email: &str) -> Form {
  let form = Form::new("Sign in")
    .text("email", "Email", email)
    .password("password", "Password");
  if email.is_empty() {
    form
  } else {
    form.focus("password")
  }
}

fn sign_up_form(email: &str) -> Form {
  Form::new("Create account")
    .text("name", "Name", "")
    .text("email", "Email", email)
    .password("password", "Password")
}

impl LoginView {
  pub fn new(ctx: AppContext) -> Self {
    let email = ctx.config.api.email.clone().unwrap_or_default();
    Self {
      ctx,
      mode: Mode::SignIn,
      form: sign_in_form(&email),
      pending: None,
    }
  }

  /// Sign in right away with known credentials; the form stays up on failure
  pub fn auto(ctx: AppContext, email: String, password: String) -> Self {
    let mut view = Self::new(ctx);
    info!(%email, "Signing in with configured account");
    view.ctx.toasts.info(format!("Signing in as {}", email));
    view.start(Mutation::SignIn(Credentials { email, password }));
    view
  }

  fn start(&mut self, mutation: Mutation) {
    let message = match &mutation {
      Mutation::SignUp(_) => "Account created",
      _ => "Signed in",
    };
    self.pending = Some(self.ctx.submit(mutation, message));
    self.form.set_busy(true);
  }

  fn toggle_mode(&mut self) {
    let email = self.form.value("email").to_string();
    (self.mode, self.form) = match self.mode {
      Mode::SignIn => (Mode::SignUp, sign_up_form(&email)),
      Mode::SignUp => (Mode::SignIn, sign_in_form(&email)),
    };
  }

  fn submit(&mut self) {
    let email = self.form.value("email").trim().to_string();
    let password = self.form.value("password").to_string();
    let name = self.form.value("name").trim().to_string();

    let mut errors = Vec::new();
    if self.mode == Mode::SignUp && name.is_empty() {
      errors.push("Name is required".to_string());
    }
    if email.is_empty() {
      errors.push("Email is required".to_string());
    }
    if password.is_empty() {
      errors.push("Password is required".to_string());
    }
    if !errors.is_empty() {
      self.form.set_errors(errors);
      return;
    }

    let mutation = match self.mode {
      Mode::SignIn => Mutation::SignIn(Credentials { email, password }),
      Mode::SignUp => Mutation::SignUp(Registration {
        name,
        email,
        password,
      }),
    };
    self.start(mutation);
  }

  fn render_banner(&self, frame: &mut Frame, area: Rect) {
    let (hint, other) = match self.mode {
      Mode::SignIn => ("No account yet?", "create one"),
      Mode::SignUp => ("Already registered?", "sign in"),
    };
    let text = vec![
      Line::raw(""),
      Line::styled("taskdeck", Style::default().fg(Color::Cyan).bold()),
      Line::styled(
        format!("Connected to {}", self.ctx.cache.remote().base_url()),
        Style::default().fg(Color::DarkGray),
      ),
      Line::raw(""),
      Line::from(vec![
        Span::styled(format!("{} ", hint), Style::default().fg(Color::DarkGray)),
        Span::styled("Ctrl-R", Style::default().fg(Color::Cyan)),
        Span::styled(format!(" to {}", other), Style::default().fg(Color::DarkGray)),
      ]),
    ];

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(
      Paragraph::new(text).block(block).alignment(Alignment::Center),
      area,
    );
  }
}

impl View for LoginView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if key.code == KeyCode::Char('r') && key.modifiers.contains(KeyModifiers::CONTROL) {
      if !self.form.is_busy() {
        self.toggle_mode();
      }
      return ViewAction::None;
    }

    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Submitted) => self.submit(),
      // Nowhere to go back to without a session
      KeyResult::Event(FormEvent::Cancelled) => self.form.set_errors(Vec::new()),
      KeyResult::Handled | KeyResult::NotHandled => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_banner(frame, area);
    self.form.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    match self.mode {
      Mode::SignIn => "Sign in".to_string(),
      Mode::SignUp => "Sign up".to_string(),
    }
  }

  fn tick(&mut self) -> ViewAction {
    let Some(result) = self.pending.as_mut().and_then(|p| p.poll()) else {
      return ViewAction::None;
    };
    self.pending = None;
    self.form.set_busy(false);
    match result {
      Ok(_) => ViewAction::Pop,
      Err(e) if e.is_unauthenticated() => {
        self.form.set_errors(vec![INVALID_CREDENTIALS.to_string()]);
        ViewAction::None
      }
      Err(e) => {
        self.form.set_errors(vec![e.to_string()]);
        ViewAction::None
      }
    }
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn requires_session(&self) -> bool {
    false
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("Tab", "next field"),
      Shortcut::new("Enter", "submit"),
      Shortcut::new("Ctrl-R", "sign in/up"),
      Shortcut::new("Ctrl-C", "quit"),
    ]
  }
}
