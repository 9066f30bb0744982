use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clausecheck_engine::ReviewReport;
use clausecheck_utils::atomic_write::write_file_atomic;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::json::render_json;
use crate::markdown::{UNKNOWN_NAME, render_markdown};

/// Prefix of every report file name.
pub const REPORT_FILE_PREFIX: &str = "合同审查报告";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Json,
}

impl ReportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }

    /// Expand an `output_format` setting (`markdown`, `json` or `both`).
    ///
    /// # Errors
    ///
    /// Returns an error for any other value.
    pub fn parse_selection(value: &str) -> Result<Vec<Self>> {
        match value.trim().to_ascii_lowercase().as_str() {
            "both" => Ok(vec![Self::Markdown, Self::Json]),
            other => Ok(vec![other.parse()?]),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => bail!("Unknown report format '{other}' (expected markdown, json or both)"),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
        })
    }
}

/// Writes rendered reports into one output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: Utf8PathBuf,
}

impl ReportWriter {
    #[must_use]
    pub fn new(output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// `合同审查报告_<name>_<YYYYmmdd_HHMMSS>.<ext>`, stamped with the
    /// report's generation time.
    #[must_use]
    pub fn file_name(report: &ReviewReport, contract_name: &str, format: ReportFormat) -> String {
        format!(
            "{}_{}_{}.{}",
            REPORT_FILE_PREFIX,
            sanitize_name(contract_name),
            report.generated_at.format("%Y%m%d_%H%M%S"),
            format.extension()
        )
    }

    /// Render `report` and write it atomically (tempfile, fsync, rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, rendering fails
    /// or the write fails.
    pub fn write(
        &self,
        report: &ReviewReport,
        contract_name: &str,
        format: ReportFormat,
    ) -> Result<Utf8PathBuf> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory: {}", self.output_dir)
        })?;

        let content = match format {
            ReportFormat::Markdown => render_markdown(report, contract_name),
            ReportFormat::Json => render_json(report)?,
        };

        let path = self
            .output_dir
            .join(Self::file_name(report, contract_name, format));
        write_file_atomic(&path, &content)
            .with_context(|| format!("Failed to write report: {path}"))?;

        info!(path = %path, format = %format, bytes = content.len(), "Report written");
        Ok(path)
    }

    /// Write every format in `formats`, returning the paths in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failed write.
    pub fn write_all(
        &self,
        report: &ReviewReport,
        contract_name: &str,
        formats: &[ReportFormat],
    ) -> Result<Vec<Utf8PathBuf>> {
        formats
            .iter()
            .map(|&format| self.write(report, contract_name, format))
            .collect()
    }
}

/// Make a document name safe to embed in a file name.
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.trim_matches(['_', '.']).is_empty() {
        UNKNOWN_NAME.to_string()
    } else {
        cleaned
    }
}
