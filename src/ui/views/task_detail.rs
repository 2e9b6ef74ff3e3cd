use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::api::types::{Project, Ref, Task, TaskChanges, User};
use crate::cache::{Mutation, ResourceKey};
use crate::context::{AppContext, PendingMutation};
use crate::filter::can_change_status;
use crate::query::{Query, QueryState};
use crate::ui::components::{Confirm, ConfirmEvent, Form, FormEvent, KeyResult};
use crate::ui::renderfns::{format_date, priority_color, status_color};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::task_form::{read_task_form, task_form};
use crate::validate::project_members;

/// View for displaying and editing one task
pub struct TaskDetailView {
  ctx: AppContext,
  id: String,
  title: String,
  query: Query<Task>,
  session: Query<Option<User>>,
  /// Started once the task says which project it belongs to
  project: Option<(Query<Project>, Query<Vec<User>>)>,
  form: Option<Form>,
  confirm: Confirm<()>,
  pending: Option<PendingMutation>,
  deleting: bool,
}

impl TaskDetailView {
  pub fn new(ctx: AppContext, id: String, title: String) -> Self {
    let task_id = id.clone();
    let query = ctx.query(vec![ResourceKey::Task(id.clone())], move |cache| {
      let id = task_id.clone();
      async move { cache.task(&id).await }
    });
    let session = ctx.session();

    Self {
      ctx,
      id,
      title,
      query,
      session,
      project: None,
      form: None,
      confirm: Confirm::new(),
      pending: None,
      deleting: false,
    }
  }

  fn watch_project(&mut self, project_id: &str) {
    let id = project_id.to_string();
    let project = self
      .ctx
      .query(vec![ResourceKey::Project(id.clone())], move |cache| {
        let id = id.clone();
        async move { cache.project(&id).await }
      });
    let id = project_id.to_string();
    let members = self
      .ctx
      .query(vec![ResourceKey::Members(id.clone())], move |cache| {
        let id = id.clone();
        async move { cache.members(&id).await }
      });
    self.project = Some((project, members));
  }

  fn loaded_project(&self) -> Option<&Project> {
    self.project.as_ref().and_then(|(project, _)| project.data())
  }

  fn assignees(&self) -> Vec<User> {
    match &self.project {
      Some((project, members)) => match project.data() {
        Some(project) => project_members(project, members.data().map_or(&[][..], |m| m.as_slice())),
        None => Vec::new(),
      },
      None => Vec::new(),
    }
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
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

    let task = match self.query.data() {
      Some(task) => task,
      None if self.query.is_loading() => {
        let paragraph =
          Paragraph::new("Loading task...").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, inner);
        return;
      }
      None => {
        let error = self.query.error().unwrap_or("Task not found");
        let paragraph = Paragraph::new(format!("Error: {}\n\nPress 'r' to retry.", error))
          .style(Style::default().fg(Color::Red));
        frame.render_widget(paragraph, inner);
        return;
      }
    };

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(4), // Fields
        Constraint::Length(1), // Separator
        Constraint::Min(1),    // Description
      ])
      .split(inner);

    let user_name = |r: Option<&Ref<User>>| -> String {
      match r {
        Some(r) => r
          .populated()
          .map(|u| u.display_name().to_string())
          .unwrap_or_else(|| r.id().to_string()),
        None => "Unassigned".to_string(),
      }
    };
    let project_name = task
      .project
      .as_ref()
      .and_then(|r| r.populated())
      .map(|p| p.title.clone())
      .or_else(|| self.loaded_project().map(|p| p.title.clone()))
      .unwrap_or_else(|| "-".to_string());

    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::DarkGray));
    let fields = vec![
      Line::from(vec![label("Title: "), Span::raw(task.title.clone()).bold()]),
      Line::from(vec![
        label("Status: "),
        Span::styled(
          task.status.label(),
          Style::default().fg(status_color(task.status)),
        ),
        Span::raw("  "),
        label("Priority: "),
        Span::styled(
          task.priority.label(),
          Style::default().fg(priority_color(task.priority)),
        ),
        Span::raw("  "),
        label("Due: "),
        Span::raw(format_date(task.due_date.as_ref())),
      ]),
      Line::from(vec![
        label("Project: "),
        Span::styled(project_name, Style::default().fg(Color::Cyan)),
      ]),
      Line::from(vec![
        label("Assignee: "),
        Span::raw(user_name(task.assigned_to.as_ref())),
        Span::raw("  "),
        label("Created by: "),
        Span::raw(user_name(task.created_by.as_ref())),
      ]),
    ];
    frame.render_widget(Paragraph::new(fields), chunks[0]);

    let sep = Paragraph::new("─".repeat(chunks[1].width as usize))
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(sep, chunks[1]);

    let desc = if task.description.is_empty() {
      "No description"
    } else {
      task.description.as_str()
    };
    frame.render_widget(Paragraph::new(desc).wrap(Wrap { trim: true }), chunks[2]);
  }

  fn move_status(&mut self, forward: bool) {
    let Some(task) = self.query.data() else {
      return;
    };
    let Some(target) = (if forward {
      task.status.next()
    } else {
      task.status.previous()
    }) else {
      return;
    };

    let me = self.session.data().and_then(|s| s.as_ref()).map(|u| u.id.as_str());
    let allowed = me.is_some_and(|me| can_change_status(task, me, self.loaded_project()));
    if !allowed {
      self
        .ctx
        .toasts
        .warning("Only the task creator or project owner can change its status");
      return;
    }

    let mutation = Mutation::UpdateTask {
      id: self.id.clone(),
      project_id: task.project_id().map(str::to_string),
      changes: TaskChanges::status(target),
    };
    self.pending = Some(self.ctx.submit(mutation, format!("Moved to {}", target)));
  }

  fn submit_form(&mut self) {
    let project_id = self
      .query
      .data()
      .and_then(Task::project_id)
      .map(str::to_string);
    let Some(form) = &mut self.form else {
      return;
    };
    let today = chrono::Local::now().date_naive();
    let draft = match read_task_form(form, today) {
      Ok(draft) => draft,
      Err(errors) => {
        form.set_errors(errors);
        return;
      }
    };
    form.set_busy(true);
    let mutation = Mutation::UpdateTask {
      id: self.id.clone(),
      project_id,
      changes: TaskChanges::from(draft),
    };
    self.pending = Some(self.ctx.submit(mutation, "Task updated"));
  }

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    if let Some(form) = &mut self.form {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted) => self.submit_form(),
        KeyResult::Event(FormEvent::Cancelled) => self.form = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return Some(ViewAction::None);
    }

    match self.confirm.handle_key(key) {
      KeyResult::Event(ConfirmEvent::Confirmed(())) => {
        let project_id = self
          .query
          .data()
          .and_then(Task::project_id)
          .map(str::to_string);
        self.deleting = true;
        self.pending = Some(self.ctx.submit(
          Mutation::DeleteTask {
            id: self.id.clone(),
            project_id,
          },
          "Task deleted",
        ));
        Some(ViewAction::None)
      }
      KeyResult::NotHandled => None,
      _ => Some(ViewAction::None),
    }
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    if key.code == KeyCode::Char('q') || key.code == KeyCode::Esc {
      return Some(ViewAction::Pop);
    }
    if self.pending.is_some() {
      return None;
    }
    match key.code {
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('L') => self.move_status(true),
      KeyCode::Char('H') => self.move_status(false),
      KeyCode::Char('e') => {
        let task = self.query.data()?;
        self.form = Some(task_form(
          format!("Edit {}", self.title),
          Some(task),
          &self.assignees(),
        ));
      }
      KeyCode::Char('D') => {
        self
          .confirm
          .ask(format!("Delete task \"{}\"?", self.title), ());
      }
      _ => return None,
    }
    Some(ViewAction::None)
  }
}

impl View for TaskDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
    self.confirm.render_overlay(frame, area);
    if let Some(form) = &self.form {
      form.render_overlay(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    self.title.clone()
  }

  fn tick(&mut self) -> ViewAction {
    if self.query.poll() {
      if let Some(task) = self.query.data() {
        self.title = task.title.clone();
      }
    }
    self.session.poll();

    if self.project.is_none() {
      if let Some(project_id) = self
        .query
        .data()
        .and_then(Task::project_id)
        .map(str::to_string)
      {
        self.watch_project(&project_id);
      }
    }
    if let Some((project, members)) = &mut self.project {
      project.poll();
      members.poll();
    }

    let Some(result) = self.pending.as_mut().and_then(|p| p.poll()) else {
      return ViewAction::None;
    };
    self.pending = None;
    match result {
      Ok(_) if self.deleting => return ViewAction::Pop,
      Ok(_) => self.form = None,
      Err(e) => {
        self.deleting = false;
        if let Some(form) = &mut self.form {
          form.set_busy(false);
          form.set_errors(vec![e.to_string()]);
        }
      }
    }
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    self.form.is_some() || self.confirm.is_active()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("e", "edit"),
      Shortcut::new("H/L", "move"),
      Shortcut::new("D", "delete"),
      Shortcut::new("r", "refresh"),
      Shortcut::new("q", "back"),
    ]
  }
}
