//! Background loading of log sources.
//!
//! Loading is the one blocking operation in the viewer. A source runs its
//! load on a worker and reports back over a channel; the UI thread only sees
//! the finished line array once `LoadEvent::Finished` arrives.

pub mod file;

use tokio::sync::mpsc;

use crate::error::LoadError;
use crate::loader::LoadResult;

/// Events emitted by a loading source
#[derive(Debug)]
pub enum LoadEvent {
    Progress { bytes_read: u64, total: u64 },
    Finished(Box<LoadResult>),
    Error(LoadError),
}

/// Trait for log sources
#[async_trait::async_trait]
pub trait LogSource: Send + Sync {
    /// Start loading and stream progress, then exactly one terminal event
    async fn stream(&self) -> mpsc::Receiver<LoadEvent>;

    /// Ask an in-flight load to stop at the next chunk boundary
    fn cancel(&self);

    /// Get the display name for this source
    fn name(&self) -> String;
}
