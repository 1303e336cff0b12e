use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use super::file::JOURNALS_DIR;
use super::{ChangeEvent, StepTable};

/// Translates on-disk edits of step tables into change events
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl StoreWatcher {
    pub fn new(root: &Path, sender: broadcast::Sender<ChangeEvent>) -> Result<Self> {
        Self::with_poll_interval(root, sender, Duration::from_secs(1))
    }

    pub fn with_poll_interval(
        root: &Path,
        sender: broadcast::Sender<ChangeEvent>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let journals = root.join(JOURNALS_DIR);
        std::fs::create_dir_all(&journals)
            .with_context(|| format!("Failed to create {}", journals.display()))?;

        let watch_root = root.to_path_buf();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for change in classify_event(&watch_root, &event) {
                        debug!(journal_id = %change.journal_id, table = %change.table, "Detected table change on disk");
                        let _ = sender.send(change);
                    }
                }
                Err(e) => warn!(error = %e, "File watcher error"),
            },
            Config::default().with_poll_interval(poll_interval),
        )?;

        watcher
            .watch(&journals, RecursiveMode::Recursive)
            .context("Failed to watch journals directory")?;

        Ok(Self {
            _watcher: watcher,
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn classify_event(root: &Path, event: &Event) -> Vec<ChangeEvent> {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return Vec::new();
    }
    let mut changes: Vec<ChangeEvent> = Vec::new();
    for change in event.paths.iter().filter_map(|p| classify_path(root, p)) {
        if !changes.contains(&change) {
            changes.push(change);
        }
    }
    changes
}

/// Map `<root>/journals/<id>/<table>.json` to its change event
///
/// Temporary files, the journal header and the activity log are ignored.
pub fn classify_path(root: &Path, path: &Path) -> Option<ChangeEvent> {
    let relative = path.strip_prefix(root.join(JOURNALS_DIR)).ok()?;
    let mut components = relative.components();

    let journal_id = match components.next()? {
        Component::Normal(name) => Uuid::parse_str(name.to_str()?).ok()?,
        _ => return None,
    };
    let file = match components.next()? {
        Component::Normal(name) => Path::new(name),
        _ => return None,
    };
    if components.next().is_some() || file.extension().is_none_or(|e| e != "json") {
        return None;
    }
    let table = StepTable::parse(file.file_stem()?.to_str()?)?;
    Some(ChangeEvent::new(journal_id, table))
}
