use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph};

use crate::api::types::{Project, Task, User};
use crate::cache::ResourceKey;
use crate::context::AppContext;
use crate::filter::{overview, Overview, RECENT_PROJECTS};
use crate::query::{Query, QueryState};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_date, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::{ProjectDetailView, ProjectListView, TaskBoardView};

/// Home screen: totals across projects and tasks, plus the newest projects
pub struct DashboardView {
  ctx: AppContext,
  projects: Query<Vec<Project>>,
  tasks: Query<Vec<Task>>,
  session: Query<Option<User>>,
  list_state: ListState,
}

impl DashboardView {
  pub fn new(ctx: AppContext) -> Self {
    let projects = ctx.query(vec![ResourceKey::ProjectList], |cache| async move {
      cache.projects().await
    });
    let tasks = ctx.query(vec![ResourceKey::TaskList], |cache| async move {
      cache.tasks().await
    });
    let session = ctx.session();

    Self {
      ctx,
      projects,
      tasks,
      session,
      list_state: ListState::default(),
    }
  }

  fn overview(&self) -> Overview<'_> {
    let projects = self.projects.data().map_or(&[][..], |p| p.as_slice());
    let tasks = self.tasks.data().map_or(&[][..], |t| t.as_slice());
    overview(projects, tasks)
  }

  fn greeting(&self) -> String {
    let name = self
      .session
      .data()
      .and_then(|s| s.as_ref())
      .and_then(|u| u.display_name().split_whitespace().next())
      .unwrap_or("there");
    format!("Welcome back, {}!", name)
  }

  fn render_stats(&self, frame: &mut Frame, area: Rect) {
    let overview = self.overview();
    let loading = self.projects.is_loading() || self.tasks.is_loading();

    let cards = [
      (
        "Projects",
        overview.projects.total,
        format!(
          "{} active, {} completed",
          overview.projects.active, overview.projects.completed
        ),
        Color::Blue,
      ),
      (
        "Active tasks",
        overview.tasks.in_progress,
        "in progress".to_string(),
        Color::Green,
      ),
      (
        "Pending tasks",
        overview.tasks.todo,
        "to do".to_string(),
        Color::Yellow,
      ),
      (
        "Completed tasks",
        overview.tasks.completed,
        format!("of {}", overview.tasks.total),
        Color::Magenta,
      ),
    ];

    let columns = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Ratio(1, 4); 4])
      .split(area);

    for ((label, count, detail, color), column) in cards.into_iter().zip(columns.iter()) {
      let block = Block::default()
        .title(format!(" {} ", label))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));
      let value = if loading {
        "...".to_string()
      } else {
        count.to_string()
      };
      let text = vec![
        Line::from(Span::styled(value, Style::default().fg(color).bold())),
        Line::from(Span::styled(detail, Style::default().fg(Color::DarkGray))),
      ];
      frame.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(block),
        *column,
      );
    }
  }

  fn render_progress(&self, frame: &mut Frame, area: Rect) {
    let stats = self.overview().tasks;
    let gauge = Gauge::default()
      .block(Block::default().title(" Progress ").borders(Borders::ALL))
      .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
      .percent(stats.percent_complete().into())
      .label(format!(
        "{}% of {} tasks complete",
        stats.percent_complete(),
        stats.total
      ));
    frame.render_widget(gauge, area);
  }

  fn render_recent(&mut self, frame: &mut Frame, area: Rect) {
    let title = match self.projects.state() {
      QueryState::Loading => " Recent projects (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Recent projects (error: {}) ", e),
      _ => " Recent projects ".to_string(),
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let items: Vec<ListItem> = self
      .overview()
      .recent
      .iter()
      .map(|project| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<28}", truncate(&project.title, 28)),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(
            format!("{}  ", format_date(project.created_at.as_ref())),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(truncate(&project.description, 50)),
        ]))
      })
      .collect();

    if items.is_empty() && self.projects.is_success() {
      let paragraph = Paragraph::new("No projects yet. Press 'p' to create one.")
        .style(Style::default().fg(Color::DarkGray))
        .block(block);
      frame.render_widget(paragraph, area);
      return;
    }

    ensure_valid_selection(&mut self.list_state, items.len());
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

  fn selected_project(&self) -> Option<(String, String)> {
    let idx = self.list_state.selected()?;
    self
      .overview()
      .recent
      .get(idx)
      .map(|p| (p.id.clone(), p.title.clone()))
  }
}

impl View for DashboardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    let view: Box<dyn View> = match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
        return ViewAction::None;
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
        return ViewAction::None;
      }
      KeyCode::Char('r') => {
        self.projects.refetch();
        self.tasks.refetch();
        return ViewAction::None;
      }
      KeyCode::Enter => match self.selected_project() {
        Some((id, title)) => Box::new(ProjectDetailView::new(self.ctx.clone(), id, title)),
        None => return ViewAction::None,
      },
      KeyCode::Char('p') => Box::new(ProjectListView::new(self.ctx.clone())),
      KeyCode::Char('t') => Box::new(TaskBoardView::all(self.ctx.clone())),
      KeyCode::Char('m') => Box::new(TaskBoardView::personal(self.ctx.clone())),
      _ => return ViewAction::None,
    };
    ViewAction::Push(view)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Greeting
        Constraint::Length(4), // Stat cards
        Constraint::Length(3), // Progress
        Constraint::Min(RECENT_PROJECTS as u16 + 2),
      ])
      .split(area);

    let greeting = Line::from(vec![
      Span::raw(" "),
      Span::styled(self.greeting(), Style::default().bold()),
      Span::styled(
        "  Here's where your projects stand.",
        Style::default().fg(Color::DarkGray),
      ),
    ]);
    frame.render_widget(Paragraph::new(greeting), chunks[0]);

    self.render_stats(frame, chunks[1]);
    self.render_progress(frame, chunks[2]);
    self.render_recent(frame, chunks[3]);
  }

  fn breadcrumb_label(&self) -> String {
    "Dashboard".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.projects.poll();
    self.tasks.poll();
    self.session.poll();
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command"),
      Shortcut::new("Enter", "open"),
      Shortcut::new("p", "projects"),
      Shortcut::new("t", "all tasks"),
      Shortcut::new("m", "my tasks"),
      Shortcut::new("r", "refresh"),
    ]
  }
}
