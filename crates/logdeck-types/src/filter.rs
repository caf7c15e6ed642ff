use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{Category, Source};

/// Entry dimensions a filter can match against, as a small bitset.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterKind(u8);

impl FilterKind {
    pub const SOURCE: Self = Self(1);
    pub const CATEGORY: Self = Self(1 << 1);
    pub const CONTENT: Self = Self(1 << 2);
    pub const USER_INFO: Self = Self(1 << 3);
    /// Every dimension at once (free-text search).
    pub const ALL: Self = Self(0b1111);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    fn label(self) -> String {
        if self == Self::ALL {
            return "all".to_string();
        }
        let mut parts = Vec::new();
        for (bit, name) in [
            (Self::SOURCE, "source"),
            (Self::CATEGORY, "category"),
            (Self::CONTENT, "content"),
            (Self::USER_INFO, "user-info"),
        ] {
            if self.contains(bit) {
                parts.push(name);
            }
        }
        parts.join("|")
    }
}

impl std::ops::BitOr for FilterKind {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FilterKind({})", self.label())
    }
}

/// A named predicate over one or more entry dimensions, used both for filter
/// candidate listing and for inclusion testing.
///
/// Identity is the kind plus the query text; the display name carries
/// decoration (emoji, casing) that never affects matching or equality.
#[derive(Clone)]
pub struct Filter {
    kind: FilterKind,
    id: String,
    display_name: String,
    query: String,
    query_lower: String,
}

impl Filter {
    pub fn new(
        kind: FilterKind,
        display_name: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        let query = query.into();
        let query_lower = query.to_lowercase();
        let id = format!("{}:{}", kind.label(), query);
        Self {
            kind,
            id,
            display_name: display_name.into(),
            query,
            query_lower,
        }
    }

    /// Filter selecting entries from one source.
    pub fn source(source: &Source) -> Self {
        Self::new(FilterKind::SOURCE, source.display_name(), source.name())
    }

    /// Filter selecting entries in one category.
    pub fn category(category: &Category) -> Self {
        Self::new(
            FilterKind::CATEGORY,
            category.display_name(),
            category.filter_query(),
        )
    }

    /// Free-text filter matching every dimension.
    pub fn search(text: &str) -> Self {
        let trimmed = text.trim();
        Self::new(FilterKind::ALL, trimmed, trimmed)
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Case-insensitive substring test against one projected candidate
    /// string. An empty query matches everything.
    pub fn matches_text(&self, candidate: &str) -> bool {
        if self.query_lower.is_empty() {
            return true;
        }
        candidate.to_lowercase().contains(&self.query_lower)
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.query == other.query
    }
}

impl Eq for Filter {}

impl Hash for Filter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.query.hash(state);
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("kind", &self.kind)
            .field("query", &self.query)
            .field("display_name", &self.display_name)
            .finish()
    }
}
