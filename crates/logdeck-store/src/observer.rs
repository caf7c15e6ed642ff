use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::watch;

use logdeck_types::{Action, Category, Content, EntryId, Source, SourceColor, UserInfo};

use crate::store::Snapshot;

/// Cached per-entry mappings served on demand rather than pushed.
#[derive(Clone, Debug, Default)]
pub struct LookupTables {
    pub entry_categories: HashMap<EntryId, Category>,
    pub entry_contents: HashMap<EntryId, Content>,
    pub entry_user_info: HashMap<EntryId, UserInfo>,
    pub source_colors: HashMap<String, SourceColor>,
}

/// Read side of the store: one latest-value cell per pushed field plus cached
/// mappings for on-demand lookups.
///
/// A cell holds exactly one current value. New subscribers read it
/// immediately via `borrow`; on each store publish the value is replaced and
/// waiters see only the newest state, so intermediate values coalesce away.
/// Publishes update the cached tables first, then the independent cells, then
/// the all-entries cell last. Code reacting to the entry list can therefore
/// assume every other field is at least as current as the list it was woken
/// for.
pub struct LogObserver {
    actions: watch::Sender<Vec<Action>>,
    entries: watch::Sender<Vec<EntryId>>,
    categories: watch::Sender<Vec<Category>>,
    sources: watch::Sender<Vec<Source>>,
    entry_sources: watch::Sender<HashMap<EntryId, Source>>,
    tables: RwLock<LookupTables>,
}

impl LogObserver {
    pub(crate) fn new() -> Self {
        Self {
            actions: watch::Sender::new(Vec::new()),
            entries: watch::Sender::new(Vec::new()),
            categories: watch::Sender::new(Vec::new()),
            sources: watch::Sender::new(Vec::new()),
            entry_sources: watch::Sender::new(HashMap::new()),
            tables: RwLock::new(LookupTables::default()),
        }
    }

    /// Registered actions, in display order.
    pub fn actions(&self) -> watch::Receiver<Vec<Action>> {
        self.actions.subscribe()
    }

    /// Every known entry id, in creation order.
    pub fn entries(&self) -> watch::Receiver<Vec<EntryId>> {
        self.entries.subscribe()
    }

    /// Every category seen so far, sorted.
    pub fn categories(&self) -> watch::Receiver<Vec<Category>> {
        self.categories.subscribe()
    }

    /// Every source seen so far, sorted.
    pub fn sources(&self) -> watch::Receiver<Vec<Source>> {
        self.sources.subscribe()
    }

    /// Source of each known entry.
    pub fn entry_sources(&self) -> watch::Receiver<HashMap<EntryId, Source>> {
        self.entry_sources.subscribe()
    }

    pub fn category_for(&self, id: EntryId) -> Option<Category> {
        self.tables.read().entry_categories.get(&id).cloned()
    }

    pub fn content_for(&self, id: EntryId) -> Option<Content> {
        self.tables.read().entry_contents.get(&id).cloned()
    }

    pub fn user_info_for(&self, id: EntryId) -> Option<UserInfo> {
        self.tables.read().entry_user_info.get(&id).cloned()
    }

    pub fn color_for(&self, source_name: &str) -> Option<SourceColor> {
        self.tables.read().source_colors.get(source_name).copied()
    }

    /// Bulk copy of the cached lookups, for one consistent recompute pass.
    pub fn lookup_tables(&self) -> LookupTables {
        self.tables.read().clone()
    }

    pub(crate) fn apply(&self, snapshot: &Snapshot) {
        *self.tables.write() = LookupTables {
            entry_categories: snapshot.entry_categories.clone(),
            entry_contents: snapshot.entry_contents.clone(),
            entry_user_info: snapshot.entry_user_info.clone(),
            source_colors: snapshot.source_colors.clone(),
        };

        self.actions.send_replace(snapshot.actions.clone());
        self.categories.send_replace(snapshot.categories.clone());
        self.sources.send_replace(snapshot.sources.clone());
        self.entry_sources.send_replace(snapshot.entry_sources.clone());
        self.entries.send_replace(snapshot.entries.clone());
    }
}
