use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap};

use crate::api::types::{Project, Task, User};
use crate::cache::{Mutation, ResourceKey};
use crate::context::{AppContext, PendingMutation};
use crate::filter::TaskStats;
use crate::query::{Query, QueryState};
use crate::ui::components::{Confirm, ConfirmEvent, Form, FormEvent, KeyResult};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::format_date;
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::TaskBoardView;
use crate::validate::project_members;

/// A project's description, progress and members
pub struct ProjectDetailView {
  ctx: AppContext,
  project_id: String,
  title: String,
  project: Query<Project>,
  members: Query<Vec<User>>,
  tasks: Query<Vec<Task>>,
  session: Query<Option<User>>,
  list_state: ListState,
  invite: Option<Form>,
  confirm: Confirm<(String, String)>,
  pending: Option<PendingMutation>,
}

impl ProjectDetailView {
  pub fn new(ctx: AppContext, project_id: String, title: String) -> Self {
    let id = project_id.clone();
    let project = ctx.query(
      vec![ResourceKey::Project(project_id.clone())],
      move |cache| {
        let id = id.clone();
        async move { cache.project(&id).await }
      },
    );
    let id = project_id.clone();
    let members = ctx.query(
      vec![ResourceKey::Members(project_id.clone())],
      move |cache| {
        let id = id.clone();
        async move { cache.members(&id).await }
      },
    );
    let id = project_id.clone();
    let tasks = ctx.query(
      vec![ResourceKey::TasksByProject(project_id.clone())],
      move |cache| {
        let id = id.clone();
        async move { cache.project_tasks(&id).await }
      },
    );
    let session = ctx.session();

    Self {
      ctx,
      project_id,
      title,
      project,
      members,
      tasks,
      session,
      list_state: ListState::default(),
      invite: None,
      confirm: Confirm::new(),
      pending: None,
    }
  }

  /// Owner first, then members
  fn people(&self) -> Vec<User> {
    match self.project.data() {
      Some(project) => project_members(project, self.members.data().map_or(&[][..], |m| m.as_slice())),
      None => self.members.data().cloned().unwrap_or_default(),
    }
  }

  fn is_owner(&self, user_id: &str) -> bool {
    self
      .project
      .data()
      .is_some_and(|project| project.is_owned_by(user_id))
  }

  fn render_summary(&self, frame: &mut Frame, area: Rect) {
    let title = match self.project.state() {
      QueryState::Loading => format!(" {} (loading...) ", self.title),
      QueryState::Error(e) => format!(" {} (error: {}) ", self.title, e),
      _ => format!(" {} ", self.title),
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(project) = self.project.data() else {
      return;
    };

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(2), // Meta
        Constraint::Length(1), // Progress
        Constraint::Min(1),    // Description
      ])
      .split(inner);

    let owner = project
      .created_by
      .as_ref()
      .and_then(|r| r.populated())
      .map(|u| u.display_name().to_string())
      .unwrap_or_else(|| "-".to_string());
    let stats = self
      .tasks
      .data()
      .map(|tasks| TaskStats::from_tasks(tasks))
      .unwrap_or_default();

    let meta = vec![
      Line::from(vec![
        Span::styled("Owner: ", Style::default().fg(Color::DarkGray)),
        Span::styled(owner, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled("Created: ", Style::default().fg(Color::DarkGray)),
        Span::raw(format_date(project.created_at.as_ref())),
        Span::raw("  "),
        Span::styled("Status: ", Style::default().fg(Color::DarkGray)),
        Span::raw(project.status.clone().unwrap_or_else(|| "active".to_string())),
      ]),
      Line::from(vec![
        Span::styled("Tasks: ", Style::default().fg(Color::DarkGray)),
        Span::raw(format!(
          "{} total, {} to do, {} in progress, {} completed",
          stats.total, stats.todo, stats.in_progress, stats.completed
        )),
      ]),
    ];
    frame.render_widget(Paragraph::new(meta), chunks[0]);

    let gauge = Gauge::default()
      .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
      .percent(stats.percent_complete().into())
      .label(format!("{}% complete", stats.percent_complete()));
    frame.render_widget(gauge, chunks[1]);

    let description = if project.description.is_empty() {
      "No description"
    } else {
      project.description.as_str()
    };
    frame.render_widget(
      Paragraph::new(description).wrap(Wrap { trim: true }),
      chunks[2],
    );
  }

  fn render_members(&mut self, frame: &mut Frame, area: Rect) {
    let people = self.people();
    ensure_valid_selection(&mut self.list_state, people.len());

    let title = match self.members.state() {
      QueryState::Loading => " Members (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Members (error: {}) ", e),
      _ => format!(" Members ({}) ", people.len()),
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let items: Vec<ListItem> = people
      .iter()
      .map(|user| {
        let role = if self.is_owner(&user.id) {
          Span::styled("owner  ", Style::default().fg(Color::Yellow))
        } else {
          Span::styled("member ", Style::default().fg(Color::DarkGray))
        };
        ListItem::new(Line::from(vec![
          role,
          Span::styled(
            format!("{:<24}", user.display_name()),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(user.email.clone(), Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn selected_member(&self) -> Option<User> {
    let idx = self.list_state.selected()?;
    self.people().into_iter().nth(idx)
  }

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    if let Some(form) = &mut self.invite {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted) => {
          let email = form.value("email").trim().to_string();
          if email.is_empty() {
            form.set_errors(vec!["Email is required".to_string()]);
          } else {
            form.set_busy(true);
            self.pending = Some(self.ctx.submit(
              Mutation::AddMember {
                project_id: self.project_id.clone(),
                email,
              },
              "Member added",
            ));
          }
        }
        KeyResult::Event(FormEvent::Cancelled) => self.invite = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return Some(ViewAction::None);
    }

    match self.confirm.handle_key(key) {
      KeyResult::Event(ConfirmEvent::Confirmed((project_id, user_id))) => {
        self.pending = Some(self.ctx.submit(
          Mutation::RemoveMember {
            project_id,
            user_id,
          },
          "Member removed",
        ));
        Some(ViewAction::None)
      }
      KeyResult::NotHandled => None,
      _ => Some(ViewAction::None),
    }
  }

  fn handle_navigation(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('b') | KeyCode::Enter => {
        return Some(ViewAction::Push(Box::new(TaskBoardView::project(
          self.ctx.clone(),
          self.project_id.clone(),
          self.title.clone(),
        ))));
      }
      KeyCode::Char('q') | KeyCode::Esc => return Some(ViewAction::Pop),
      _ => return None,
    }
    Some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    if self.pending.is_some() {
      return None;
    }
    match key.code {
      KeyCode::Char('r') => {
        self.project.refetch();
        self.members.refetch();
        self.tasks.refetch();
      }
      KeyCode::Char('a') => {
        self.invite = Some(Form::new("Add member").text("email", "Email", ""));
      }
      KeyCode::Char('d') => {
        let member = self.selected_member()?;
        if self.is_owner(&member.id) {
          self.ctx.toasts.warning("The project owner cannot be removed");
          return Some(ViewAction::None);
        }
        self.confirm.ask(
          format!("Remove {} from {}?", member.display_name(), self.title),
          (self.project_id.clone(), member.id),
        );
      }
      _ => return None,
    }
    Some(ViewAction::None)
  }
}

impl View for ProjectDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(9), Constraint::Min(3)])
      .split(area);

    self.render_summary(frame, chunks[0]);
    self.render_members(frame, chunks[1]);
    self.confirm.render_overlay(frame, area);
    if let Some(form) = &self.invite {
      form.render_overlay(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    self.title.clone()
  }

  fn tick(&mut self) -> ViewAction {
    if self.project.poll() {
      if let Some(project) = self.project.data() {
        self.title = project.title.clone();
      }
    }
    self.members.poll();
    self.tasks.poll();
    self.session.poll();

    if let Some(result) = self.pending.as_mut().and_then(|p| p.poll()) {
      self.pending = None;
      match result {
        Ok(_) => self.invite = None,
        Err(e) => {
          if let Some(form) = &mut self.invite {
            form.set_busy(false);
            form.set_errors(vec![e.to_string()]);
          }
        }
      }
    }
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    self.invite.is_some() || self.confirm.is_active()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("b", "board"),
      Shortcut::new("a", "add member"),
      Shortcut::new("d", "remove member"),
      Shortcut::new("r", "refresh"),
      Shortcut::new("q", "back"),
    ]
  }
}
