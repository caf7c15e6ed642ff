//! Log store and observer bridge for logdeck
//!
//! Single-writer authoritative state over ingested entries, the latest-value
//! cells readers consume, and per-source color assignment.

mod observer;
mod palette;
mod store;

pub use observer::{LogObserver, LookupTables};
pub use palette::ColorGenerator;
pub use store::{CLEAR_ACTION_ID, LogStore, Snapshot};

// Re-exported so downstream crates can depend on this one alone.
pub use logdeck_types::{
    Action, ActionRole, Category, Content, Entry, EntryId, Rgb, Source, SourceColor, UserInfo,
};
