pub mod footer;
pub mod header;
pub mod table;
pub mod utils;

pub use footer::draw_footer;
pub use header::draw_header;
pub use table::{issue_header, issue_row, ISSUE_WIDTHS};
pub use utils::{format_date, priority_color, resolution_color};
