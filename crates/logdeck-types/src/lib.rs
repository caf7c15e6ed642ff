//! Shared types for logdeck
//!
//! The value records used across the logdeck crates: entry identity and
//! metadata, the filter model, display actions, and the colors assigned to
//! sources.

mod action;
mod color;
mod entry;
mod filter;

pub use action::{Action, ActionHandler, ActionRole, RESERVED_ACTION_PREFIX};
pub use color::{Rgb, SourceColor};
pub use entry::{Category, Content, Entry, EntryId, PLACEHOLDER_VALUE, Source, UserInfo};
pub use filter::{Filter, FilterKind};

use serde::{Deserialize, Serialize};

/// Sort direction for the visible entry list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Store order, oldest entry first.
    #[default]
    Ascending,
    /// Newest entry first.
    Descending,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_sort_order_flips_direction() {
        assert_eq!(SortOrder::Ascending.toggled(), SortOrder::Descending);
        assert_eq!(SortOrder::Descending.toggled(), SortOrder::Ascending);
    }
}
