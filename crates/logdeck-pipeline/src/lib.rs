//! Reactive filtering for logdeck
//!
//! Derives the visible entry list from the store's observer: the active
//! filter set, the debounced search query and the sort order combine into
//! continuously recomputed filter candidates, breadcrumb labels and the
//! visible id sequence. User preferences mirror to a small settings store.

mod pipeline;
mod settings;
mod timing;

pub use pipeline::FilterPipeline;
pub use settings::{FileSettings, MemorySettings, SettingsError, SettingsStore};
pub use timing::{debounce, throttle};

// Re-exported so hosts can depend on this crate alone.
pub use logdeck_types::{EntryId, Filter, FilterKind, SortOrder};
