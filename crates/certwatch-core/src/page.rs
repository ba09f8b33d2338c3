//! Browser-driver boundary.
//!
//! [`CatalogPage`] is the only view the check runner has of a live
//! application: open the catalog, read its titles, probe visibility, click
//! an entry, capture a screenshot. Real drivers implement it outside this
//! crate; [`SnapshotPage`] replays a recorded catalog from disk.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::artifact::read_json;
use crate::error::{CheckError, CheckResult};
use crate::poller::EntrySource;

/// Driver operations the check runner needs from one environment's page.
#[async_trait]
pub trait CatalogPage: EntrySource {
    /// Navigate to the catalog and open the container holding the entries.
    async fn open_catalog(&self) -> CheckResult<()>;

    /// Whether `text` is currently visible anywhere on the page.
    async fn is_text_visible(&self, text: &str) -> CheckResult<bool>;

    /// Click the entry whose text is `title`.
    async fn select_entry(&self, title: &str) -> CheckResult<()>;

    async fn screenshot(&self, path: &Path) -> CheckResult<()>;
}

/// A recorded catalog: container identity, entry titles and other visible text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub container: String,
    pub titles: Vec<String>,
    /// Visible text outside the title elements (subtitles, badges).
    #[serde(default)]
    pub visible: Vec<String>,
}

/// [`CatalogPage`] backed by a [`CatalogSnapshot`] JSON file.
///
/// The file is read on `open_catalog`, so a missing or corrupt snapshot
/// fails inside the check run and still produces a summary artifact.
pub struct SnapshotPage {
    path: PathBuf,
    container: String,
    snapshot: Mutex<Option<CatalogSnapshot>>,
}

impl SnapshotPage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let container = path.display().to_string();
        Self {
            path,
            container,
            snapshot: Mutex::new(None),
        }
    }

    fn loaded(&self, step: &str) -> CheckResult<CatalogSnapshot> {
        self.snapshot
            .lock()
            .map_err(|_| CheckError::driver(step, "snapshot lock poisoned"))?
            .clone()
            .ok_or_else(|| CheckError::driver(step, "catalog not opened"))
    }
}

#[async_trait]
impl EntrySource for SnapshotPage {
    fn container(&self) -> &str {
        &self.container
    }

    async fn read_titles(&self) -> CheckResult<Vec<String>> {
        Ok(self.loaded("read_titles")?.titles)
    }
}

#[async_trait]
impl CatalogPage for SnapshotPage {
    async fn open_catalog(&self) -> CheckResult<()> {
        let snapshot: CatalogSnapshot =
            read_json(&self.path).map_err(|e| CheckError::driver("open_catalog", e))?;
        *self
            .snapshot
            .lock()
            .map_err(|_| CheckError::driver("open_catalog", "snapshot lock poisoned"))? =
            Some(snapshot);
        Ok(())
    }

    async fn is_text_visible(&self, text: &str) -> CheckResult<bool> {
        let snapshot = self.loaded("is_text_visible")?;
        let needle = text.to_lowercase();
        Ok(snapshot
            .titles
            .iter()
            .chain(snapshot.visible.iter())
            .any(|t| t.to_lowercase().contains(&needle)))
    }

    async fn select_entry(&self, title: &str) -> CheckResult<()> {
        let snapshot = self.loaded("select_entry")?;
        if snapshot.titles.iter().any(|t| t.trim() == title) {
            Ok(())
        } else {
            Err(CheckError::driver(
                "select_entry",
                format!("no entry titled '{title}'"),
            ))
        }
    }

    async fn screenshot(&self, _path: &Path) -> CheckResult<()> {
        Err(CheckError::driver(
            "screenshot",
            "recorded snapshots cannot be rendered",
        ))
    }
}
