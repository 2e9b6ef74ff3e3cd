use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::api::types::{Project, ProjectChanges, ProjectDraft, User};
use crate::cache::{Mutation, ResourceKey};
use crate::context::{AppContext, PendingMutation};
use crate::query::{Query, QueryState};
use crate::ui::components::{
  Confirm, ConfirmEvent, Form, FormEvent, KeyResult, SearchEvent, SearchInput,
};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_date, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::ProjectDetailView;
use crate::validate::validate_project;

enum Editing {
  New,
  Existing(String),
}

/// Root view: every project the signed-in user owns or belongs to
pub struct ProjectListView {
  ctx: AppContext,
  query: Query<Vec<Project>>,
  session: Query<Option<User>>,
  list_state: ListState,
  search: SearchInput,
  form: Option<(Editing, Form)>,
  confirm: Confirm<String>,
  pending: Option<PendingMutation>,
}

impl ProjectListView {
  pub fn new(ctx: AppContext) -> Self {
    let query = ctx.query(vec![ResourceKey::ProjectList], |cache| async move {
      cache.projects().await
    });
    let session = ctx.session();

    Self {
      ctx,
      query,
      session,
      list_state: ListState::default(),
      search: SearchInput::new(),
      form: None,
      confirm: Confirm::new(),
      pending: None,
    }
  }

  fn current_user_id(&self) -> Option<&str> {
    self.session.data()?.as_ref().map(|u| u.id.as_str())
  }

  /// Projects matching the search box
  fn projects(&self) -> Vec<&Project> {
    let needle = self.search.query().to_lowercase();
    self
      .query
      .data()
      .map(|projects| {
        projects
          .iter()
          .filter(|p| {
            needle.is_empty()
              || p.title.to_lowercase().contains(&needle)
              || p.description.to_lowercase().contains(&needle)
          })
          .collect()
      })
      .unwrap_or_default()
  }

  fn selected(&self) -> Option<&Project> {
    let idx = self.list_state.selected()?;
    self.projects().get(idx).copied()
  }

  fn open_form(&mut self, editing: Editing) {
    let form = match &editing {
      Editing::New => Form::new("New project")
        .text("title", "Title", "")
        .text("description", "Description", ""),
      Editing::Existing(_) => {
        let Some(project) = self.selected() else {
          return;
        };
        Form::new(format!("Edit {}", project.title))
          .text("title", "Title", &project.title)
          .text("description", "Description", &project.description)
      }
    };
    self.form = Some((editing, form));
  }

  fn submit_form(&mut self) {
    let Some((editing, form)) = &mut self.form else {
      return;
    };
    let draft = ProjectDraft {
      title: form.value("title").trim().to_string(),
      description: form.value("description").trim().to_string(),
    };
    if let Err(errors) = validate_project(&draft) {
      form.set_errors(errors.iter().map(ToString::to_string).collect());
      return;
    }

    let (mutation, message) = match editing {
      Editing::New => (Mutation::CreateProject(draft), "Project created"),
      Editing::Existing(id) => (
        Mutation::UpdateProject {
          id: id.clone(),
          changes: ProjectChanges {
            title: Some(draft.title),
            description: Some(draft.description),
            status: None,
          },
        },
        "Project updated",
      ),
    };
    form.set_busy(true);
    self.pending = Some(self.ctx.submit(mutation, message));
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.projects().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match self.query.state() {
      QueryState::Loading => " Projects (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Projects (error: {}) ", e),
      _ if !self.search.query().is_empty() => {
        format!(" Projects ({}) /{} ", len, self.search.query())
      }
      _ => format!(" Projects ({}) ", len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load projects. Press 'r' to retry."
      } else if !self.search.query().is_empty() {
        "No projects match the search."
      } else {
        "No projects yet. Press 'n' to create one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let me = self.current_user_id();
    let items: Vec<ListItem> = self
      .projects()
      .iter()
      .map(|project| {
        let owner = if me.is_some_and(|id| project.is_owned_by(id)) {
          Span::styled("owner ", Style::default().fg(Color::Yellow))
        } else {
          Span::raw("      ")
        };
        ListItem::new(Line::from(vec![
          owner,
          Span::styled(
            format!("{:<28}", truncate(&project.title, 28)),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(
            format!("{:>3} members  ", project.members.len()),
            Style::default().fg(Color::DarkGray),
          ),
          Span::styled(
            format!("{}  ", format_date(project.created_at.as_ref())),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(truncate(&project.description, 50)),
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

  // ==========================================================================
  // Key handling
  // ==========================================================================

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    if let Some((_, form)) = &mut self.form {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted) => self.submit_form(),
        KeyResult::Event(FormEvent::Cancelled) => self.form = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return Some(ViewAction::None);
    }

    match self.confirm.handle_key(key) {
      KeyResult::Event(ConfirmEvent::Confirmed(id)) => {
        self.pending = Some(
          self
            .ctx
            .submit(Mutation::DeleteProject { id }, "Project deleted"),
        );
        return Some(ViewAction::None);
      }
      KeyResult::NotHandled => {}
      _ => return Some(ViewAction::None),
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(_)) => {
        self.list_state.select(Some(0));
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
      KeyCode::Char('g') | KeyCode::Home => self.list_state.select_first(),
      KeyCode::Char('G') | KeyCode::End => self.list_state.select_last(),
      KeyCode::Enter => {
        let project = self.selected()?;
        return Some(ViewAction::Push(Box::new(ProjectDetailView::new(
          self.ctx.clone(),
          project.id.clone(),
          project.title.clone(),
        ))));
      }
      KeyCode::Char('q') | KeyCode::Esc => return Some(ViewAction::Pop),
      _ => return None,
    }
    Some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    // One write at a time
    if self.pending.is_some() {
      return None;
    }
    match key.code {
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('n') => self.open_form(Editing::New),
      KeyCode::Char('e') => {
        let id = self.selected()?.id.clone();
        self.open_form(Editing::Existing(id));
      }
      KeyCode::Char('D') => {
        let project = self.selected()?;
        let question = format!("Delete project \"{}\" and its tasks?", project.title);
        let id = project.id.clone();
        self.confirm.ask(question, id);
      }
      _ => return None,
    }
    Some(ViewAction::None)
  }
}

impl View for ProjectListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.search.render_overlay(frame, area);
    self.confirm.render_overlay(frame, area);
    if let Some((_, form)) = &self.form {
      form.render_overlay(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Projects".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.query.poll();
    self.session.poll();

    if let Some(result) = self.pending.as_mut().and_then(|p| p.poll()) {
      self.pending = None;
      match result {
        Ok(_) => self.form = None,
        Err(e) => {
          if let Some((_, form)) = &mut self.form {
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
    vec![
      Shortcut::new(":", "command"),
      Shortcut::new("/", "search"),
      Shortcut::new("n", "new"),
      Shortcut::new("e", "edit"),
      Shortcut::new("D", "delete"),
      Shortcut::new("r", "refresh"),
    ]
  }
}
