//! In-memory fakes for the driver and mail seams (testing only).
//!
//! [`ScriptedPage`] replays a fixed sequence of catalog samples, and
//! [`RecordingTransport`] captures sent mail instead of delivering it.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{CheckError, CheckResult, MailError};
use crate::mail::{MailMessage, MailTransport};
use crate::page::CatalogPage;
use crate::poller::EntrySource;

// ---------------------------------------------------------------------------
// ScriptedPage
// ---------------------------------------------------------------------------

/// Page whose n-th title read returns the n-th scripted sample.
///
/// Reads past the end of the script repeat the last sample. An empty script
/// always reads as an empty catalog.
#[derive(Debug, Default)]
pub struct ScriptedPage {
    container: String,
    samples: Vec<Vec<String>>,
    visible: Vec<String>,
    failing_reads: usize,
    hang_reads: bool,
    fail_open: Option<String>,
    fail_visibility: Option<String>,
    reads: AtomicUsize,
    selected: Mutex<Vec<String>>,
    screenshots: Mutex<Vec<PathBuf>>,
    pending_errors: Mutex<VecDeque<String>>,
}

impl ScriptedPage {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Self::default()
        }
    }

    /// A page that renders `titles` on the first read.
    pub fn loaded<S: AsRef<str>>(titles: &[S]) -> Self {
        Self::new("catalog").then_sample(titles)
    }

    /// Append one sample to the read script.
    pub fn then_sample<S: AsRef<str>>(mut self, titles: &[S]) -> Self {
        self.samples
            .push(titles.iter().map(|t| t.as_ref().to_string()).collect());
        self
    }

    /// Append `count` empty samples to the read script.
    pub fn then_empty(mut self, count: usize) -> Self {
        for _ in 0..count {
            self.samples.push(Vec::new());
        }
        self
    }

    /// Extra visible text beyond the titles (subtitles).
    pub fn with_visible<S: AsRef<str>>(mut self, text: &[S]) -> Self {
        self.visible
            .extend(text.iter().map(|t| t.as_ref().to_string()));
        self
    }

    /// The first `count` reads return a driver error.
    pub fn with_failing_reads(mut self, count: usize) -> Self {
        self.failing_reads = count;
        self
    }

    /// Every read blocks forever.
    pub fn with_hanging_reads(mut self) -> Self {
        self.hang_reads = true;
        self
    }

    pub fn with_open_failure(mut self, detail: impl Into<String>) -> Self {
        self.fail_open = Some(detail.into());
        self
    }

    pub fn with_visibility_failure(mut self, detail: impl Into<String>) -> Self {
        self.fail_visibility = Some(detail.into());
        self
    }

    /// Queue a one-shot error for the next `select_entry` call.
    pub fn with_select_failure(self, detail: impl Into<String>) -> Self {
        if let Ok(mut q) = self.pending_errors.lock() {
            q.push_back(detail.into());
        }
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn selected(&self) -> Vec<String> {
        self.selected.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.screenshots
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EntrySource for ScriptedPage {
    fn container(&self) -> &str {
        &self.container
    }

    async fn read_titles(&self) -> CheckResult<Vec<String>> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if self.hang_reads {
            std::future::pending::<()>().await;
        }
        if n < self.failing_reads {
            return Err(CheckError::driver("read_titles", "element detached"));
        }
        let sample = self
            .samples
            .get(n)
            .or_else(|| self.samples.last())
            .cloned()
            .unwrap_or_default();
        Ok(sample)
    }
}

#[async_trait]
impl CatalogPage for ScriptedPage {
    async fn open_catalog(&self) -> CheckResult<()> {
        match &self.fail_open {
            Some(detail) => Err(CheckError::driver("open_catalog", detail)),
            None => Ok(()),
        }
    }

    async fn is_text_visible(&self, text: &str) -> CheckResult<bool> {
        if let Some(detail) = &self.fail_visibility {
            return Err(CheckError::driver("is_text_visible", detail));
        }
        let needle = text.to_lowercase();
        let rendered = self.samples.last().into_iter().flatten();
        Ok(rendered
            .chain(self.visible.iter())
            .any(|t| t.to_lowercase().contains(&needle)))
    }

    async fn select_entry(&self, title: &str) -> CheckResult<()> {
        let queued = self
            .pending_errors
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front());
        if let Some(detail) = queued {
            return Err(CheckError::driver("select_entry", detail));
        }
        if let Ok(mut s) = self.selected.lock() {
            s.push(title.to_string());
        }
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> CheckResult<()> {
        if let Ok(mut s) = self.screenshots.lock() {
            s.push(path.to_path_buf());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingTransport
// ---------------------------------------------------------------------------

/// Mail transport that records messages instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<MailMessage>>,
    reject_with: Option<u16>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send is rejected with `status`.
    pub fn rejecting(status: u16) -> Self {
        Self {
            reject_with: Some(status),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if let Some(status) = self.reject_with {
            return Err(MailError::Rejected {
                status,
                body: "rejected by test transport".to_string(),
            });
        }
        self.sent
            .lock()
            .map_err(|_| MailError::Transport("recording lock poisoned".to_string()))?
            .push(message.clone());
        Ok(())
    }
}
