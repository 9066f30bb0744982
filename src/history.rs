//! Review history
//!
//! A JSON file of past review runs, newest first, capped at
//! [`MAX_HISTORY_RECORDS`]. The file is rewritten atomically on every change.

use anyhow::{Context, Result};
use camino::Utf8Path;
use chrono::{DateTime, Utc};
use clausecheck_engine::{Identity, ReviewBrief};
use clausecheck_utils::atomic_write::write_file_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Oldest records beyond this count are dropped.
pub const MAX_HISTORY_RECORDS: usize = 100;

const ID_HEX_CHARS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Success,
    Degraded,
    Failed,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        })
    }
}

/// One review run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub file_name: String,
    pub file_path: String,
    pub identity: Identity,
    pub contract_type: String,
    #[serde(default)]
    pub focus_points: Vec<String>,
    pub provider: String,
    pub model: String,
    pub status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ReviewRecord {
    #[must_use]
    pub fn new(
        file_path: &Path,
        brief: &ReviewBrief,
        provider: impl Into<String>,
        model: impl Into<String>,
        status: ReviewStatus,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let file_path_str = file_path.display().to_string();
        let file_name = file_path
            .file_name()
            .map_or_else(|| file_path_str.clone(), |n| n.to_string_lossy().into_owned());

        Self {
            id: record_id(&file_path_str, timestamp),
            timestamp,
            file_name,
            file_path: file_path_str,
            identity: brief.identity,
            contract_type: brief.contract_type.clone(),
            focus_points: brief.focus_points.clone(),
            provider: provider.into(),
            model: model.into(),
            status,
            report_path: None,
            error_message: None,
            summary: None,
        }
    }

    #[must_use]
    pub fn with_report_path(mut self, path: impl Into<String>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    fn matches(&self, keyword: &str) -> bool {
        self.file_name.to_lowercase().contains(keyword)
            || self.contract_type.to_lowercase().contains(keyword)
            || self
                .focus_points
                .iter()
                .any(|point| point.to_lowercase().contains(keyword))
    }
}

/// First 12 hex characters of blake3 over path and timestamp.
fn record_id(file_path: &str, timestamp: DateTime<Utc>) -> String {
    let material = format!("{file_path}_{}", timestamp.to_rfc3339());
    let hash = blake3::hash(material.as_bytes()).to_hex();
    hash[..ID_HEX_CHARS].to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub total: usize,
    pub by_status: BTreeMap<ReviewStatus, usize>,
    pub by_contract_type: BTreeMap<String, usize>,
    pub by_provider: BTreeMap<String, usize>,
}

/// The history file and its records.
#[derive(Debug)]
pub struct ReviewHistory {
    path: PathBuf,
    records: Vec<ReviewRecord>,
}

impl ReviewHistory {
    /// Load the history at `path`.
    ///
    /// A missing file is an empty history. A file that cannot be parsed is
    /// logged and replaced on the next write.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                records: Vec::new(),
            });
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read history file: {}", path.display()))?;
        let records = match serde_json::from_str::<Vec<ReviewRecord>>(&content) {
            Ok(records) => records,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "History file is unreadable, starting empty");
                Vec::new()
            }
        };

        Ok(Self { path, records })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Prepend `record` and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn add(&mut self, record: ReviewRecord) -> Result<&ReviewRecord> {
        info!(id = %record.id, file = %record.file_name, status = %record.status, "Recording review");
        self.records.insert(0, record);
        self.records.truncate(MAX_HISTORY_RECORDS);
        self.save()?;
        Ok(&self.records[0])
    }

    /// Records newest first, at most `limit` of them.
    #[must_use]
    pub fn list(&self, limit: Option<usize>) -> &[ReviewRecord] {
        let end = limit.map_or(self.records.len(), |n| n.min(self.records.len()));
        &self.records[..end]
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ReviewRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Case-insensitive match on file name, contract type and focus points.
    #[must_use]
    pub fn search(&self, keyword: &str) -> Vec<&ReviewRecord> {
        let keyword = keyword.trim().to_lowercase();
        self.records.iter().filter(|r| r.matches(&keyword)).collect()
    }

    /// Remove the record with `id`. Returns whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let Some(position) = self.records.iter().position(|r| r.id == id) else {
            return Ok(false);
        };
        self.records.remove(position);
        self.save()?;
        Ok(true)
    }

    /// Remove every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        self.save()
    }

    #[must_use]
    pub fn statistics(&self) -> HistoryStats {
        let mut stats = HistoryStats {
            total: self.records.len(),
            ..HistoryStats::default()
        };
        for record in &self.records {
            *stats.by_status.entry(record.status).or_default() += 1;
            *stats
                .by_contract_type
                .entry(record.contract_type.clone())
                .or_default() += 1;
            *stats.by_provider.entry(record.provider.clone()).or_default() += 1;
        }
        stats
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory: {}", parent.display())
            })?;
        }
        let content =
            serde_json::to_string_pretty(&self.records).context("Failed to serialize history")?;
        let path = Utf8Path::from_path(&self.path).ok_or_else(|| {
            anyhow::anyhow!("History path is not valid UTF-8: {}", self.path.display())
        })?;
        write_file_atomic(path, &content)
            .with_context(|| format!("Failed to write history file: {path}"))?;
        Ok(())
    }
}
