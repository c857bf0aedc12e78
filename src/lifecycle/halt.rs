//! Service halt marker.
//!
//! While the marker file exists, every routed request is answered with 503.
//! The file holds a JSON pair `[since, message]`. The kernel reads the flag
//! per request; a watcher keeps it in sync with the file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{SecondsFormat, Utc};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};

/// Why and since when the service is halted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct HaltNotice {
    pub since: String,
    pub message: String,
}

impl HaltNotice {
    /// A notice stamped with the current time.
    pub fn now(message: &str) -> Self {
        Self {
            since: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            message: message.to_string(),
        }
    }
}

impl From<(String, String)> for HaltNotice {
    fn from((since, message): (String, String)) -> Self {
        Self { since, message }
    }
}

impl From<HaltNotice> for (String, String) {
    fn from(notice: HaltNotice) -> Self {
        (notice.since, notice.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HaltError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("halt marker is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Write the marker file, creating its directory when needed.
pub fn write_marker(path: &Path, notice: &HaltNotice) -> Result<(), HaltError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, serde_json::to_string(notice)?)?;
    Ok(())
}

/// Remove the marker file. Returns false when there was none.
pub fn clear_marker(path: &Path) -> Result<bool, HaltError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Read the marker file; `None` when it does not exist.
pub fn read_marker(path: &Path) -> Result<Option<HaltNotice>, HaltError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The halt state as seen by request workers.
#[derive(Debug, Default)]
pub struct HaltFlag {
    notice: ArcSwapOption<HaltNotice>,
    path: Option<PathBuf>,
}

impl HaltFlag {
    /// A flag not backed by a file; only [`HaltFlag::set`] changes it.
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag backed by a marker file, read once now.
    pub fn from_file(path: &Path) -> Self {
        let flag = Self {
            notice: ArcSwapOption::empty(),
            path: Some(path.to_path_buf()),
        };
        flag.refresh();
        flag
    }

    pub fn current(&self) -> Option<Arc<HaltNotice>> {
        self.notice.load_full()
    }

    pub fn set(&self, notice: Option<HaltNotice>) {
        self.notice.store(notice.map(Arc::new));
    }

    /// Re-read the marker file. A malformed marker still halts the service.
    pub fn refresh(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let notice = match read_marker(path) {
            Ok(notice) => notice,
            Err(HaltError::Malformed(e)) => {
                tracing::warn!(path = ?path, error = %e, "Halt marker is malformed");
                Some(HaltNotice {
                    since: String::new(),
                    message: "Service halted".to_string(),
                })
            }
            Err(e) => {
                tracing::error!(path = ?path, error = %e, "Failed to read halt marker");
                return;
            }
        };
        match &notice {
            Some(n) if self.current().as_deref() != Some(n) => {
                tracing::warn!(since = %n.since, message = %n.message, "Service halted");
            }
            None if self.current().is_some() => tracing::info!("Service resumed"),
            _ => {}
        }
        self.set(notice);
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Keeps a file-backed [`HaltFlag`] in sync with its marker.
pub struct HaltWatcher {
    flag: Arc<HaltFlag>,
}

impl HaltWatcher {
    pub fn new(flag: Arc<HaltFlag>) -> Self {
        Self { flag }
    }

    /// Start watching the marker's directory in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as updates matter.
    pub fn run(self) -> Result<Option<RecommendedWatcher>, notify::Error> {
        let Some(path) = self.flag.path().map(Path::to_path_buf) else {
            return Ok(None);
        };
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!(dir = ?dir, error = %e, "Cannot create halt marker directory");
        }

        let flag = self.flag.clone();
        let name = path.file_name().map(|n| n.to_os_string());
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let concerns_marker = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == name);
                    if concerns_marker {
                        flag.refresh();
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Halt watcher started");
        Ok(Some(watcher))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("portkernel-halt-{}-{}", name, std::process::id()))
            .join("http.halt")
    }

    #[test]
    fn test_marker_format_is_a_pair() {
        let notice = HaltNotice {
            since: "2024-01-01T00:00:00Z".into(),
            message: "upgrading".into(),
        };
        assert_eq!(
            serde_json::to_string(&notice).unwrap(),
            r#"["2024-01-01T00:00:00Z","upgrading"]"#
        );
    }

    #[test]
    fn test_flag_follows_marker_file() {
        let path = marker("follow");
        let _ = clear_marker(&path);
        let flag = HaltFlag::from_file(&path);
        assert!(flag.current().is_none());

        write_marker(&path, &HaltNotice::now("maintenance")).unwrap();
        flag.refresh();
        assert_eq!(flag.current().unwrap().message, "maintenance");

        assert!(clear_marker(&path).unwrap());
        flag.refresh();
        assert!(flag.current().is_none());
        assert!(!clear_marker(&path).unwrap());
    }

    #[test]
    fn test_malformed_marker_still_halts() {
        let path = marker("malformed");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();
        let flag = HaltFlag::from_file(&path);
        assert!(flag.current().is_some());
        clear_marker(&path).unwrap();
    }

    #[test]
    fn test_in_memory_flag() {
        let flag = HaltFlag::new();
        flag.set(Some(HaltNotice::now("drain")));
        assert_eq!(flag.current().unwrap().message, "drain");
        flag.refresh();
        assert!(flag.current().is_some());
    }
}
