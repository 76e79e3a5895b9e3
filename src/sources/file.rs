use std::path::PathBuf;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;
use tracing::warn;

use super::{LoadEvent, LogSource};
use crate::config::DEFAULT_CHANNEL_BUFFER;
use crate::loader::ChunkedLoader;

/// A log source that reads a local file in chunks on a blocking worker
pub struct FileSource {
    path: PathBuf,
    loader: ChunkedLoader,
}

impl FileSource {
    pub fn new(path: PathBuf, chunk_size: usize) -> Self {
        Self {
            path,
            loader: ChunkedLoader::new(chunk_size),
        }
    }
}

#[async_trait::async_trait]
impl LogSource for FileSource {
    async fn stream(&self) -> mpsc::Receiver<LoadEvent> {
        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);
        let path = self.path.clone();
        let loader = self.loader.clone();

        tokio::task::spawn_blocking(move || {
            let progress_tx = tx.clone();
            let result = loader.load(&path, |bytes_read, total| {
                // Progress is advisory; a closed receiver just means nobody is watching
                let _ = progress_tx.blocking_send(LoadEvent::Progress { bytes_read, total });
            });

            let event = match result {
                Ok(result) => LoadEvent::Finished(Box::new(result)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "load failed");
                    LoadEvent::Error(e)
                }
            };
            let _ = tx.blocking_send(event);
        });

        rx
    }

    fn cancel(&self) {
        self.loader.cancel_handle().store(true, Ordering::Relaxed);
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
