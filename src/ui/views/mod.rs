mod dashboard;
mod login;
mod project_detail;
mod project_list;
mod task_board;
mod task_detail;
mod task_form;

pub use dashboard::DashboardView;
pub use login::LoginView;
pub use project_detail::ProjectDetailView;
pub use project_list::ProjectListView;
pub use task_board::TaskBoardView;
pub use task_detail::TaskDetailView;
