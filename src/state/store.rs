// src/state/store.rs

//! Atomic load/save of persisted step statuses.
//!
//! The state file is a sibling of the workflow file named
//! `.<workflow_basename>.state.json`. Saves go through a temp file in the
//! same directory, fsync, then rename, so a crash at any moment leaves
//! either the old or the new file intact, never a partial one.
//!
//! Loading is selective: the caller passes the current per-task structural
//! hashes, and only records whose persisted hash still matches are returned.
//! Editing one task's commands invalidates that task alone.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::model::task::Status;

pub const STATE_VERSION: u32 = 1;

/// Persisted projection of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTask {
    pub structural_hash: String,
    pub steps: Vec<Status>,
}

/// The whole state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub tasks: BTreeMap<String, PersistedTask>,
}

impl PersistedState {
    pub fn empty() -> Self {
        Self {
            version: STATE_VERSION,
            tasks: BTreeMap::new(),
        }
    }
}

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store for the given workflow file: `.<basename>.state.json` in the
    /// same directory.
    pub fn for_workflow(workflow_path: &Path) -> Self {
        let base = workflow_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workflow".to_string());
        let dir = match workflow_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            path: dir.join(format!(".{base}.state.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted records whose structural hash matches the current
    /// workflow. A missing, malformed, or wrong-version file reads as empty:
    /// resuming is best-effort, never fatal.
    pub fn load(&self, current_hashes: &HashMap<String, String>) -> HashMap<String, PersistedTask> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => {
                debug!(path = ?self.path, "no state file; starting fresh");
                return HashMap::new();
            }
        };

        let state: PersistedState = match serde_json::from_str(&contents) {
            Ok(s) => s,
            Err(err) => {
                warn!(path = ?self.path, error = %err, "malformed state file; starting fresh");
                return HashMap::new();
            }
        };

        if state.version != STATE_VERSION {
            warn!(
                version = state.version,
                "state file has an unknown version; starting fresh"
            );
            return HashMap::new();
        }

        let mut resumed = HashMap::new();
        for (task_id, record) in state.tasks {
            match current_hashes.get(&task_id) {
                Some(hash) if *hash == record.structural_hash => {
                    resumed.insert(task_id, record);
                }
                Some(_) => {
                    debug!(task = %task_id, "structural hash changed; discarding persisted state");
                }
                None => {
                    debug!(task = %task_id, "task no longer in workflow; dropping persisted state");
                }
            }
        }
        resumed
    }

    /// Atomically write the full projection.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        let payload = serde_json::to_vec_pretty(state)
            .map_err(|e| anyhow::anyhow!("serializing state: {e}"))?;

        let tmp = self.path.with_file_name(format!(
            "{}.tmp",
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "state".to_string())
        ));

        {
            let mut file = File::create(&tmp)?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(path = ?self.path, "state saved");
        Ok(())
    }
}
