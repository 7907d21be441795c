//! Archive download, release lookup and extraction
//!
//! - `core` - streaming HTTP fetch with progress and cancellation
//! - `github` - newest-tag lookup for the firmware sources
//! - `extract` - scratch-directory extraction into canonical slots

mod core;
mod extract;
pub mod github;

pub use self::core::{FetchJob, Fetcher, USER_AGENT};
pub use extract::{ArchiveKind, ExtractRequest, extract};
