//! Change detection for the mocks folder.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Polling period of the files watcher
pub const WATCH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileStamp {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

/// Snapshot of every file under a folder. Two snapshots differ when a file
/// was added, removed, resized or touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint(Vec<FileStamp>);

impl Fingerprint {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn fingerprint(root: &Path) -> Fingerprint {
    let mut stamps = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.is_dir() {
                pending.push(entry.path());
            } else {
                stamps.push(FileStamp {
                    path: entry.path(),
                    len: metadata.len(),
                    modified: metadata.modified().ok(),
                });
            }
        }
    }
    stamps.sort_by(|a, b| a.path.cmp(&b.path));
    Fingerprint(stamps)
}
