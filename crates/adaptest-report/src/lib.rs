//! adaptest-report — rendering of diagnostic reports.

pub mod markdown;

pub use markdown::{generate_markdown, write_markdown_report};
