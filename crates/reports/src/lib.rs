//! Summary reporting domain: date windows, per-product aggregation, and
//! CSV artifact rendering.
//!
//! Everything here is pure; fetching inputs and persisting outputs is the
//! infrastructure layer's job.

pub mod artifact;
pub mod summary;
pub mod window;

pub use artifact::{CSV_HEADER, default_report_name, render_csv};
pub use summary::{SummaryReport, SummaryRow, summarize};
pub use window::Window;
