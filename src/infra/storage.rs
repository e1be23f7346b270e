// src/infra/storage.rs — Device-local session fragment persistence
//
// Writes `state/active-session.json` at each lifecycle transition so a page
// reload cannot silently lose "which recipe am I cooking" before the next
// remote sync. Uses atomic write (temp file + rename). The fragment is a
// bootstrap hint for recovery, never a display source of truth.

use std::io::Write;
use std::path::PathBuf;

use crate::core::types::SessionSnapshot;
use crate::infra::paths;

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Store rooted at the default platform state directory.
    pub fn new() -> Self {
        Self {
            dir: paths::state_dir(),
        }
    }

    /// Store rooted at an explicit directory (config override, tests).
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("active-session.json")
    }

    /// Atomically persist the fragment (temp file + rename).
    pub fn save(&self, snapshot: &SessionSnapshot) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.dir.join(".active-session.json.tmp");
        let dst = self.snapshot_path();

        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        f.flush()?;
        f.sync_all()?;
        std::fs::rename(&tmp, &dst)?;
        Ok(())
    }

    /// Read the persisted fragment, if any.
    ///
    /// A missing or malformed file is "no valid session" — recovery must
    /// never crash on whatever a previous build left behind.
    pub fn load(&self) -> Option<SessionSnapshot> {
        let content = std::fs::read_to_string(self.snapshot_path()).ok()?;
        match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("Discarding malformed session fragment: {}", e);
                None
            }
        }
    }

    /// Remove the persisted fragment. Missing file is fine.
    pub fn clear(&self) {
        let _ = std::fs::remove_file(self.snapshot_path());
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
