pub mod footer;
pub mod header;
pub mod toasts;
pub mod utils;

pub use footer::draw_footer;
pub use header::draw_header;
pub use toasts::draw_toasts;
pub use utils::{format_date, priority_color, status_color, truncate};
