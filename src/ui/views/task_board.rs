use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::debug;

use crate::api::types::{Priority, Project, Task, TaskChanges, TaskStatus, User};
use crate::cache::{Mutation, ResourceKey};
use crate::config::BoardMode;
use crate::context::{AppContext, PendingMutation};
use crate::filter::{can_change_status, cycle, group_by_status, AssigneeFilter, TaskFilter, TaskStats};
use crate::query::{Query, QueryState};
use crate::ui::components::{
  Confirm, ConfirmEvent, Form, FormEvent, KeyResult, SearchEvent, SearchInput,
};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_date, priority_color, status_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::task_form::{read_task_form, task_form};
use crate::ui::views::TaskDetailView;
use crate::validate::project_members;

/// Which tasks the board loads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
  /// Every task visible to the user
  All,
  /// Tasks assigned to or created by the user
  Personal,
  Project { id: String, title: String },
}

/// Task list / kanban board
pub struct TaskBoardView {
  ctx: AppContext,
  scope: Scope,

  // Data queries
  tasks: Query<Vec<Task>>,
  session: Query<Option<User>>,
  /// Project board: the project and its members (owner checks, assignees)
  project: Option<Query<Project>>,
  members: Option<Query<Vec<User>>>,
  /// Global boards: all projects (owner checks, project filter)
  projects: Option<Query<Vec<Project>>>,

  // UI state
  filter: TaskFilter,
  mode: BoardMode,
  list_state: ListState,
  column: usize,
  card: usize,

  // Components
  search: SearchInput,
  form: Option<Form>,
  confirm: Confirm<(String, Option<String>)>,
  pending: Option<PendingMutation>,
}

impl TaskBoardView {
  pub fn all(ctx: AppContext) -> Self {
    Self::new(ctx, Scope::All)
  }

  pub fn personal(ctx: AppContext) -> Self {
    Self::new(ctx, Scope::Personal)
  }

  pub fn project(ctx: AppContext, id: String, title: String) -> Self {
    Self::new(ctx, Scope::Project { id, title })
  }

  fn new(ctx: AppContext, scope: Scope) -> Self {
    let (tasks, project, members, projects) = match &scope {
      Scope::Project { id, .. } => {
        let project_id = id.clone();
        let tasks = ctx.query(
          vec![ResourceKey::TasksByProject(id.clone())],
          move |cache| {
            let id = project_id.clone();
            async move { cache.project_tasks(&id).await }
          },
        );
        let project_id = id.clone();
        let project = ctx.query(vec![ResourceKey::Project(id.clone())], move |cache| {
          let id = project_id.clone();
          async move { cache.project(&id).await }
        });
        let project_id = id.clone();
        let members = ctx.query(vec![ResourceKey::Members(id.clone())], move |cache| {
          let id = project_id.clone();
          async move { cache.members(&id).await }
        });
        (tasks, Some(project), Some(members), None)
      }
      Scope::All | Scope::Personal => {
        let tasks = ctx.query(vec![ResourceKey::TaskList], |cache| async move {
          cache.tasks().await
        });
        let projects = ctx.query(vec![ResourceKey::ProjectList], |cache| async move {
          cache.projects().await
        });
        (tasks, None, None, Some(projects))
      }
    };

    let filter = TaskFilter {
      personal: scope == Scope::Personal,
      ..TaskFilter::default()
    };
    let session = ctx.session();
    let mode = ctx.config.board.default_mode;

    Self {
      ctx,
      scope,
      tasks,
      session,
      project,
      members,
      projects,
      filter,
      mode,
      list_state: ListState::default(),
      column: 0,
      card: 0,
      search: SearchInput::new(),
      form: None,
      confirm: Confirm::new(),
      pending: None,
    }
  }

  fn title(&self) -> &str {
    match &self.scope {
      Scope::All => "All tasks",
      Scope::Personal => "My tasks",
      Scope::Project { title, .. } => title,
    }
  }

  fn current_user_id(&self) -> Option<&str> {
    self.session.data()?.as_ref().map(|u| u.id.as_str())
  }

  /// Tasks passing the filter, in server order
  fn visible(&self) -> Vec<&Task> {
    let tasks = self.tasks.data().map_or(&[][..], |t| t.as_slice());
    self.filter.apply(tasks, self.current_user_id())
  }

  fn column_tasks(&self, column: usize) -> Vec<&Task> {
    let visible = self.visible();
    let columns = group_by_status(visible);
    columns.column(TaskStatus::ALL[column]).to_vec()
  }

  fn selected_task(&self) -> Option<&Task> {
    match self.mode {
      BoardMode::List => {
        let idx = self.list_state.selected()?;
        self.visible().get(idx).copied()
      }
      BoardMode::Kanban => self.column_tasks(self.column).get(self.card).copied(),
    }
  }

  /// The project a task belongs to, when loaded
  fn project_of(&self, task: &Task) -> Option<&Project> {
    if let Some(project) = self.project.as_ref().and_then(Query::data) {
      return Some(project);
    }
    let id = task.project_id()?;
    self
      .projects
      .as_ref()
      .and_then(Query::data)?
      .iter()
      .find(|p| p.id == id)
  }

  fn assignees(&self) -> Vec<User> {
    let Some(project) = self.project.as_ref().and_then(Query::data) else {
      return Vec::new();
    };
    let members = self
      .members
      .as_ref()
      .and_then(Query::data)
      .map_or(&[][..], |m| m.as_slice());
    project_members(project, members)
  }

  fn reset_selection(&mut self) {
    self.list_state.select(Some(0));
    self.card = 0;
  }

  // ==========================================================================
  // Rendering
  // ==========================================================================

  fn render_filters(&self, frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::styled(
      match self.mode {
        BoardMode::List => " List ",
        BoardMode::Kanban => " Kanban ",
      },
      Style::default().fg(Color::Black).bg(Color::Cyan),
    )];
    spans.push(Span::raw(" "));

    if let Some(project) = &self.filter.project {
      let name = self
        .projects
        .as_ref()
        .and_then(Query::data)
        .and_then(|projects| projects.iter().find(|p| &p.id == project))
        .map_or(project.as_str(), |p| p.title.as_str());
      spans.push(Span::styled(
        format!("project={} ", name),
        Style::default().fg(Color::Yellow),
      ));
    }

    let summary = self.filter.summary();
    if summary.is_empty() && self.filter.project.is_none() {
      spans.push(Span::styled("no filters", Style::default().fg(Color::DarkGray)));
    } else {
      spans.push(Span::styled(summary, Style::default().fg(Color::Yellow)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
  }

  fn block_title(&self, count: usize) -> String {
    match self.tasks.state() {
      QueryState::Loading => format!(" {} (loading...) ", self.title()),
      QueryState::Error(e) => format!(" {} (error: {}) ", self.title(), e),
      _ => {
        let stats = TaskStats::from_tasks(self.visible());
        format!(
          " {} ({} tasks, {}% done) ",
          self.title(),
          count,
          stats.percent_complete()
        )
      }
    }
  }

  fn render_empty(&self, frame: &mut Frame, area: Rect, block: Block) {
    let content = if self.tasks.is_error() {
      "Failed to load tasks. Press 'r' to retry."
    } else if !self.filter.is_empty() && !self.filter.personal {
      "No tasks match the filters. Press 'c' to clear them."
    } else if matches!(self.scope, Scope::Project { .. }) {
      "No tasks yet. Press 'n' to create one."
    } else {
      "No tasks found."
    };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.visible().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = Block::default()
      .title(self.block_title(len))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.tasks.is_loading() {
      self.render_empty(frame, area, block);
      return;
    }

    let items: Vec<ListItem> = self
      .visible()
      .iter()
      .map(|task| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<12}", task.status.label()),
            Style::default().fg(status_color(task.status)),
          ),
          Span::styled(
            format!("{:<7}", task.priority.label()),
            Style::default().fg(priority_color(task.priority)),
          ),
          Span::styled(
            format!("{:<11}", format_date(task.due_date.as_ref())),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(truncate(&task.title, 60)),
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

  fn render_kanban(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.column_tasks(self.column).len();
    if self.card >= len {
      self.card = len.saturating_sub(1);
    }

    let col_areas = Layout::horizontal([Constraint::Ratio(1, 3); 3]).split(area);
    let visible = self.visible();
    let columns = group_by_status(visible);

    for (idx, status) in TaskStatus::ALL.iter().enumerate() {
      let tasks = columns.column(*status);
      let is_selected_column = idx == self.column;
      let col_area = col_areas[idx];
      let width = col_area.width.saturating_sub(6) as usize;

      let border_color = if is_selected_column {
        Color::Yellow
      } else {
        Color::Blue
      };
      let title = match self.tasks.state() {
        QueryState::Loading => format!(" {} (loading...) ", status.label()),
        _ => format!(" {} ({}) ", status.label(), tasks.len()),
      };
      let block = Block::default()
        .title(title)
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

      let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| {
          ListItem::new(Line::from(vec![
            Span::styled("● ", Style::default().fg(priority_color(task.priority))),
            Span::raw(truncate(&task.title, width)),
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

      if is_selected_column && !tasks.is_empty() {
        let mut state = ListState::default();
        state.select(Some(self.card));
        frame.render_stateful_widget(list, col_area, &mut state);
      } else {
        frame.render_widget(list, col_area);
      }
    }
  }

  // ==========================================================================
  // Actions
  // ==========================================================================

  /// Move the selected card one status forward or back
  fn move_selected(&mut self, forward: bool) {
    let Some(task) = self.selected_task() else {
      return;
    };
    let target = if forward {
      task.status.next()
    } else {
      task.status.previous()
    };
    let Some(target) = target else {
      return;
    };

    let allowed = self
      .current_user_id()
      .is_some_and(|me| can_change_status(task, me, self.project_of(task)));
    if !allowed {
      self
        .ctx
        .toasts
        .warning("Only the task creator or project owner can change its status");
      return;
    }

    let id = task.id.clone();
    let project_id = task.project_id().map(str::to_string);
    debug!(task = %id, status = ?target, "Moving task");
    self.pending = Some(self.ctx.submit(
      Mutation::UpdateTask {
        id,
        project_id,
        changes: TaskChanges::status(target),
      },
      format!("Moved to {}", target),
    ));

    // Follow the card into its new column
    if self.mode == BoardMode::Kanban {
      if let Some(idx) = TaskStatus::ALL.iter().position(|s| *s == target) {
        self.column = idx;
        self.card = 0;
      }
    }
  }

  fn cycle_project(&mut self) {
    let Some(projects) = self.projects.as_ref().and_then(Query::data) else {
      return;
    };
    let next = match &self.filter.project {
      None => projects.first(),
      Some(current) => projects
        .iter()
        .position(|p| &p.id == current)
        .and_then(|idx| projects.get(idx + 1)),
    };
    self.filter.project = next.map(|p| p.id.clone());
    self.reset_selection();
  }

  fn open_new_task(&mut self) {
    if let Scope::Project { title, .. } = &self.scope {
      let title = format!("New task in {}", title);
      self.form = Some(task_form(title, None, &self.assignees()));
    }
  }

  fn submit_form(&mut self) {
    let Scope::Project { id, .. } = &self.scope else {
      return;
    };
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
    let mutation = Mutation::CreateTask {
      project_id: id.clone(),
      task: draft,
    };
    self.pending = Some(self.ctx.submit(mutation, "Task created"));
  }

  // ==========================================================================
  // Key handling
  // ==========================================================================

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
      KeyResult::Event(ConfirmEvent::Confirmed((id, project_id))) => {
        self.pending = Some(
          self
            .ctx
            .submit(Mutation::DeleteTask { id, project_id }, "Task deleted"),
        );
        return Some(ViewAction::None);
      }
      KeyResult::NotHandled => {}
      _ => return Some(ViewAction::None),
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(query)) => {
        self.filter.search = query;
        self.reset_selection();
        Some(ViewAction::None)
      }
      KeyResult::NotHandled => None,
      _ => Some(ViewAction::None),
    }
  }

  fn handle_navigation(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match (self.mode, key.code) {
      (BoardMode::List, KeyCode::Char('j') | KeyCode::Down) => self.list_state.select_next(),
      (BoardMode::List, KeyCode::Char('k') | KeyCode::Up) => self.list_state.select_previous(),
      (BoardMode::List, KeyCode::Char('g') | KeyCode::Home) => self.list_state.select_first(),
      (BoardMode::List, KeyCode::Char('G') | KeyCode::End) => self.list_state.select_last(),
      (BoardMode::Kanban, KeyCode::Char('j') | KeyCode::Down) => {
        let len = self.column_tasks(self.column).len();
        if len > 0 {
          self.card = (self.card + 1) % len;
        }
      }
      (BoardMode::Kanban, KeyCode::Char('k') | KeyCode::Up) => {
        let len = self.column_tasks(self.column).len();
        if len > 0 {
          self.card = self.card.checked_sub(1).unwrap_or(len - 1);
        }
      }
      (BoardMode::Kanban, KeyCode::Char('l') | KeyCode::Right) => {
        self.column = (self.column + 1) % TaskStatus::ALL.len();
        self.card = 0;
      }
      (BoardMode::Kanban, KeyCode::Char('h') | KeyCode::Left) => {
        self.column = self
          .column
          .checked_sub(1)
          .unwrap_or(TaskStatus::ALL.len() - 1);
        self.card = 0;
      }
      (_, KeyCode::Char('s')) => {
        self.mode = match self.mode {
          BoardMode::List => BoardMode::Kanban,
          BoardMode::Kanban => BoardMode::List,
        };
        self.column = 0;
        self.reset_selection();
      }
      (_, KeyCode::Enter) => {
        let task = self.selected_task()?;
        return Some(ViewAction::Push(Box::new(TaskDetailView::new(
          self.ctx.clone(),
          task.id.clone(),
          task.title.clone(),
        ))));
      }
      (_, KeyCode::Char('q') | KeyCode::Esc) => return Some(ViewAction::Pop),
      _ => return None,
    }
    Some(ViewAction::None)
  }

  fn handle_filters(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('f') => {
        self.filter.status = cycle(self.filter.status, &TaskStatus::ALL);
      }
      KeyCode::Char('p') => {
        self.filter.priority = cycle(self.filter.priority, &Priority::ALL);
      }
      KeyCode::Char('a') => {
        let people = self.assignees();
        let ids: Vec<&str> = people.iter().map(|u| u.id.as_str()).collect();
        self.filter.assignee = self.filter.assignee.next(&ids);
      }
      KeyCode::Char('m') => {
        self.filter.assignee = match self.filter.assignee {
          AssigneeFilter::Me => AssigneeFilter::Anyone,
          _ => AssigneeFilter::Me,
        };
      }
      KeyCode::Char('P') if self.projects.is_some() => {
        self.cycle_project();
        return Some(ViewAction::None);
      }
      KeyCode::Char('c') => {
        self.filter = TaskFilter {
          personal: self.scope == Scope::Personal,
          ..TaskFilter::default()
        };
        self.search.clear();
      }
      _ => return None,
    }
    self.reset_selection();
    Some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    // One write at a time
    if self.pending.is_some() {
      return None;
    }
    match key.code {
      KeyCode::Char('r') => {
        self.tasks.refetch();
        if let Some(project) = &mut self.project {
          project.refetch();
        }
        if let Some(members) = &mut self.members {
          members.refetch();
        }
        if let Some(projects) = &mut self.projects {
          projects.refetch();
        }
      }
      KeyCode::Char('L') => self.move_selected(true),
      KeyCode::Char('H') => self.move_selected(false),
      KeyCode::Char('n') => self.open_new_task(),
      KeyCode::Char('D') => {
        let task = self.selected_task()?;
        let question = format!("Delete task \"{}\"?", truncate(&task.title, 40));
        let value = (task.id.clone(), task.project_id().map(str::to_string));
        self.confirm.ask(question, value);
      }
      _ => return None,
    }
    Some(ViewAction::None)
  }
}

impl View for TaskBoardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_filters(key))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(0)])
      .split(area);

    self.render_filters(frame, chunks[0]);
    match self.mode {
      BoardMode::List => self.render_list(frame, chunks[1]),
      BoardMode::Kanban => self.render_kanban(frame, chunks[1]),
    }

    self.search.render_overlay(frame, area);
    self.confirm.render_overlay(frame, area);
    if let Some(form) = &self.form {
      form.render_overlay(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    match self.mode {
      BoardMode::List => self.title().to_string(),
      BoardMode::Kanban => format!("{} [Kanban]", self.title()),
    }
  }

  fn tick(&mut self) -> ViewAction {
    self.tasks.poll();
    self.session.poll();
    if let Some(project) = &mut self.project {
      if project.poll() {
        if let (Some(loaded), Scope::Project { title, .. }) = (project.data(), &mut self.scope) {
          *title = loaded.title.clone();
        }
      }
    }
    if let Some(members) = &mut self.members {
      members.poll();
    }
    if let Some(projects) = &mut self.projects {
      projects.poll();
    }

    if let Some(result) = self.pending.as_mut().and_then(|p| p.poll()) {
      self.pending = None;
      match result {
        Ok(_) => self.form = None,
        Err(e) => {
          if let Some(form) = &mut self.form {
            form.set_busy(false);
            form.set_errors(vec![e.to_string()]);
          }
        }
      }
    }
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    self.form.is_some() || self.confirm.is_active() || self.search.is_active()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    let mut shortcuts = vec![
      Shortcut::new(":", "command"),
      Shortcut::new("/", "search"),
      Shortcut::new("s", "list/kanban"),
      Shortcut::new("H/L", "move"),
      Shortcut::new("f", "status"),
      Shortcut::new("p", "priority"),
      Shortcut::new("m", "mine"),
      Shortcut::new("a", "assignee"),
    ];
    if self.projects.is_some() {
      shortcuts.push(Shortcut::new("P", "project"));
    }
    if matches!(self.scope, Scope::Project { .. }) {
      shortcuts.push(Shortcut::new("n", "new"));
    }
    shortcuts.push(Shortcut::new("D", "delete"));
    shortcuts.push(Shortcut::new("c", "clear filters"));
    shortcuts
  }
}
