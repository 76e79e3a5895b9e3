//! Large-file log viewing core: chunked loading with encoding detection,
//! windowed viewing, and a layered, debounced search/highlight engine.

pub mod config;
pub mod encoding;
pub mod error;
pub mod export;
pub mod grep;
pub mod highlight;
pub mod keywords;
pub mod loader;
pub mod palette;
pub mod rules;
pub mod search;
pub mod sources;
pub mod template;
pub mod templates;
pub mod viewer;
pub mod viewport;

pub use error::{LoadError, TemplateError};
pub use loader::{ChunkedLoader, LineStore, LoadResult};
pub use search::{Match, SearchEngine, SearchMode};
