use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, channel};

use crate::config::{TerrainConfig, load_config_from_path};

/// Watches a config file on a background thread and reloads it on demand.
pub struct ConfigWatcher {
    path: PathBuf,
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl ConfigWatcher {
    /// Start watching `path`. If the platform watcher cannot be created the
    /// returned value still supports [`ConfigWatcher::request_reload`].
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (tx, rx) = channel::<()>();
        let watch_tx = tx.clone();
        let watch_path = path.clone();
        std::thread::spawn(move || {
            use notify::{EventKind, RecursiveMode, Watcher};
            let watcher =
                notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                    if let Ok(event) = res {
                        match event.kind {
                            EventKind::Modify(_)
                            | EventKind::Create(_)
                            | EventKind::Remove(_)
                            | EventKind::Any => {
                                let _ = watch_tx.send(());
                            }
                            _ => {}
                        }
                    }
                });
            let mut watcher = match watcher {
                Ok(w) => w,
                Err(e) => {
                    log::warn!("config watcher unavailable: {}", e);
                    return;
                }
            };
            if let Err(e) = watcher.watch(&watch_path, RecursiveMode::NonRecursive) {
                log::warn!("failed to watch {:?}: {}", watch_path, e);
                return;
            }
            loop {
                std::thread::sleep(std::time::Duration::from_secs(3600));
            }
        });
        Self { path, tx, rx }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Force a reload at the next [`ConfigWatcher::poll`].
    pub fn request_reload(&self) {
        let _ = self.tx.send(());
    }

    /// Reload the file if it changed since the last poll. Bursts of events
    /// collapse into one reload.
    pub fn poll(&self) -> Option<Result<TerrainConfig, Box<dyn Error>>> {
        let mut changed = false;
        for _ in self.rx.try_iter() {
            changed = true;
        }
        if !changed {
            return None;
        }
        let res = load_config_from_path(&self.path);
        match &res {
            Ok(_) => log::info!("terrain config reloaded from {:?}", self.path),
            Err(e) => log::warn!("terrain config reload failed ({:?}): {}", self.path, e),
        }
        Some(res)
    }
}
