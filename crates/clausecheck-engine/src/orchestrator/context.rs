use chrono::Utc;
use clausecheck_utils::canonicalization::digest_parts;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::progress::ProgressEvent;
use crate::model::Stage;

/// Run-scoped state passed explicitly through every stage.
///
/// Cloning is cheap; clones share the cancellation token and progress channel.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub cancel: CancellationToken,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl RunContext {
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Context with a fresh run id derived from the document and the clock.
    #[must_use]
    pub fn for_document(raw_document: &str) -> Self {
        let now = Utc::now();
        let stamp = now.to_rfc3339();
        let digest = digest_parts([raw_document, stamp.as_str()]);
        Self::new(format!("{}-{}", now.format("%Y%m%d%H%M%S"), &digest[..8]))
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Send a progress notification without waiting for the receiver.
    pub fn emit(&self, stage: Stage, message: impl Into<String>) {
        let Some(sender) = &self.progress else {
            return;
        };
        // A dropped receiver only means nobody is listening
        if sender
            .send(ProgressEvent {
                stage,
                message: message.into(),
            })
            .is_err()
        {
            trace!(run_id = %self.run_id, "Progress receiver dropped");
        }
    }
}
