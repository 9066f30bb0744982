//! Rendering of review reports: the Chinese Markdown layout and canonical
//! JSON, plus atomic report file output.

pub mod json;
pub mod markdown;
pub mod writer;

pub use json::render_json;
pub use markdown::{DISCLAIMER, render_markdown};
pub use writer::{REPORT_FILE_PREFIX, ReportFormat, ReportWriter};
