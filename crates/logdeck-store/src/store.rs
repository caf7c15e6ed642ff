use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use logdeck_types::{
    Action, ActionRole, Category, Content, Entry, EntryId, Source, SourceColor, UserInfo,
};

use crate::observer::LogObserver;
use crate::palette::ColorGenerator;

/// Id of the built-in action that empties the store.
pub const CLEAR_ACTION_ID: &str = "logdeck.clear";

/// Point-in-time copy of every store-derived field. All fields belong to the
/// same store revision.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub actions: Vec<Action>,
    pub entries: Vec<EntryId>,
    pub categories: Vec<Category>,
    pub sources: Vec<Source>,
    pub entry_sources: HashMap<EntryId, Source>,
    pub entry_categories: HashMap<EntryId, Category>,
    pub entry_contents: HashMap<EntryId, Content>,
    pub entry_user_info: HashMap<EntryId, UserInfo>,
    pub source_colors: HashMap<String, SourceColor>,
}

#[derive(Default)]
struct StoreState {
    /// Creation-ordered id set; doubles as the duplicate gate.
    ids: BTreeSet<EntryId>,
    categories: BTreeSet<Category>,
    sources: BTreeSet<Source>,
    entry_categories: HashMap<EntryId, Category>,
    entry_sources: HashMap<EntryId, Source>,
    entry_contents: HashMap<EntryId, Content>,
    entry_user_info: HashMap<EntryId, UserInfo>,
    actions: Vec<Action>,
    palette: ColorGenerator,
    observers: Vec<Weak<LogObserver>>,
}

/// Single-writer authoritative log state.
///
/// Every mutation serializes through one internal lock and publishes a full
/// snapshot to the registered observers before the lock is released, so
/// publishes arrive in mutation order and no reader ever sees a
/// partially-applied change. Handles are cheap to clone and safe to share
/// across threads.
#[derive(Clone, Default)]
pub struct LogStore {
    inner: Arc<Mutex<StoreState>>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one entry and publish the result. Re-ingesting a known id is a
    /// no-op; malformed metadata is normalized rather than rejected.
    pub fn ingest(&self, entry: Entry) {
        let mut state = self.inner.lock();
        if !state.ids.insert(entry.id) {
            trace!(id = ?entry.id, "duplicate entry ignored");
            return;
        }

        let Entry {
            id,
            category,
            source,
            content,
            user_info,
        } = entry;

        state.categories.insert(category.clone());
        state.entry_categories.insert(id, category);

        if state.sources.insert(source.clone()) {
            state.palette.generate_if_needed(source.name());
        }
        state.entry_sources.insert(id, source);

        state.entry_contents.insert(id, content);

        let facts = user_info
            .map(|value| UserInfo::from_value(&value))
            .unwrap_or_default();
        state.entry_user_info.insert(id, facts);

        if !state
            .actions
            .iter()
            .any(|action| action.id() == CLEAR_ACTION_ID)
        {
            let clear = self.clear_action();
            state.actions.push(clear);
        }

        trace!(?id, count = state.ids.len(), "entry ingested");
        Self::publish(&mut state);
    }

    /// Add `action` to the registry, replacing any action with the same id.
    pub fn register_action(&self, action: Action) {
        let mut state = self.inner.lock();
        state.actions.retain(|existing| existing != &action);
        state.actions.push(action);
        Self::publish(&mut state);
    }

    /// Remove `action` from the registry by identity.
    pub fn unregister_action(&self, action: &Action) {
        let mut state = self.inner.lock();
        state.actions.retain(|existing| existing != action);
        Self::publish(&mut state);
    }

    /// Drop every entry and index, and retire the built-in clear action. The
    /// color cache is kept: a source keeps its color for the lifetime of the
    /// store.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.ids.clear();
        state.categories.clear();
        state.sources.clear();
        state.entry_categories.clear();
        state.entry_sources.clear();
        state.entry_contents.clear();
        state.entry_user_info.clear();
        state.actions.retain(|action| action.id() != CLEAR_ACTION_ID);
        debug!("store cleared");
        Self::publish(&mut state);
    }

    /// Allocate an observer primed with the current snapshot. The store holds
    /// only a weak reference; once every strong handle is gone, publishes to
    /// it stop.
    pub fn create_observer(&self) -> Arc<LogObserver> {
        let mut state = self.inner.lock();
        let observer = Arc::new(LogObserver::new());
        observer.apply(&Self::snapshot(&state));
        state.observers.push(Arc::downgrade(&observer));
        observer
    }

    /// Number of distinct entries currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Built-in destructive action that empties the store. Holds a weak
    /// reference so the action registry never keeps the store alive.
    fn clear_action(&self) -> Action {
        let weak = Arc::downgrade(&self.inner);
        Action::new(CLEAR_ACTION_ID, "Clear logs", move || {
            let weak = Weak::clone(&weak);
            async move {
                if let Some(inner) = weak.upgrade() {
                    LogStore { inner }.clear();
                }
            }
        })
        .with_role(ActionRole::Destructive)
        .with_image("trash")
    }

    fn snapshot(state: &StoreState) -> Snapshot {
        let mut actions = state.actions.clone();
        actions.sort_by(Action::display_cmp);

        Snapshot {
            actions,
            entries: state.ids.iter().copied().collect(),
            categories: state.categories.iter().cloned().collect(),
            sources: state.sources.iter().cloned().collect(),
            entry_sources: state.entry_sources.clone(),
            entry_categories: state.entry_categories.clone(),
            entry_contents: state.entry_contents.clone(),
            entry_user_info: state.entry_user_info.clone(),
            source_colors: state.palette.assigned().clone(),
        }
    }

    fn publish(state: &mut StoreState) {
        debug_assert_eq!(state.ids.len(), state.entry_categories.len());
        debug_assert_eq!(state.ids.len(), state.entry_sources.len());
        debug_assert_eq!(state.ids.len(), state.entry_contents.len());
        debug_assert_eq!(state.ids.len(), state.entry_user_info.len());

        let snapshot = Self::snapshot(state);
        state.observers.retain(|weak| match weak.upgrade() {
            Some(observer) => {
                observer.apply(&snapshot);
                true
            }
            None => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn entry(category: &str, source: &str, title: &str) -> Entry {
        Entry::new(
            Category::new(category),
            Source::new(source),
            Content::new(title),
        )
    }

    #[test]
    fn ingestion_is_idempotent_per_id() {
        let store = LogStore::new();
        let e = entry("net", "Api", "request sent");
        store.ingest(e.clone());
        store.ingest(e);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn entries_publish_in_creation_order_not_arrival_order() {
        let store = LogStore::new();
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let early = entry("net", "Api", "first").with_id(EntryId::at(t));
        let late =
            entry("net", "Api", "second").with_id(EntryId::at(t + chrono::Duration::seconds(5)));
        let (early_id, late_id) = (early.id, late.id);

        store.ingest(late);
        store.ingest(early);

        let observer = store.create_observer();
        assert_eq!(*observer.entries().borrow(), [early_id, late_id]);
    }

    #[test]
    fn first_ingestion_registers_the_clear_action() {
        let store = LogStore::new();
        let observer = store.create_observer();
        assert!(observer.actions().borrow().is_empty());

        store.ingest(entry("net", "Api", "hello"));

        let actions = observer.actions().borrow().clone();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].id(), CLEAR_ACTION_ID);
        assert!(actions[0].is_reserved());
        assert_eq!(actions[0].role(), ActionRole::Destructive);
    }

    #[test]
    fn clear_empties_the_store_and_retires_the_clear_action() {
        let store = LogStore::new();
        let observer = store.create_observer();
        store.ingest(entry("net", "Api", "one"));
        store.ingest(entry("db", "Query", "two"));

        store.clear();

        assert!(store.is_empty());
        assert!(observer.entries().borrow().is_empty());
        assert!(observer.categories().borrow().is_empty());
        assert!(observer.sources().borrow().is_empty());
        assert!(observer.actions().borrow().is_empty());
    }

    #[test]
    fn source_colors_survive_clear() {
        let store = LogStore::new();
        let observer = store.create_observer();

        store.ingest(entry("net", "Api", "one"));
        let before = observer.color_for("Api").unwrap();

        store.clear();
        store.ingest(entry("net", "Api", "two"));
        let after = observer.color_for("Api").unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn entries_sharing_a_source_name_share_a_color() {
        let store = LogStore::new();
        let observer = store.create_observer();

        store.ingest(entry("net", "Api.rs", "one"));
        store.ingest(
            Entry::new(
                Category::new("net"),
                Source::with_emoji("📡", "Api"),
                Content::new("two"),
            ),
        );

        assert_eq!(store.len(), 2);
        assert_eq!(observer.sources().borrow().len(), 1);
        assert!(observer.color_for("Api").is_some());
    }

    #[test]
    fn ingest_flattens_user_info_into_facts() {
        let store = LogStore::new();
        let e = entry("net", "Api", "request failed")
            .with_user_info(json!({"code": 404, "path": "/x"}));
        let id = e.id;
        store.ingest(e);

        let observer = store.create_observer();
        let info = observer.user_info_for(id).unwrap();
        assert_eq!(info.len(), 2);
        assert_eq!(info.get("code"), Some("404"));
        assert_eq!(info.get("path"), Some("/x"));
    }

    #[test]
    fn actions_replace_by_id_and_sort_for_display() {
        let store = LogStore::new();
        let observer = store.create_observer();
        store.ingest(entry("net", "Api", "hello"));

        store.register_action(Action::new("export", "Export", || async {}));
        store.register_action(Action::new("copy", "Copy all", || async {}));
        store.register_action(Action::new("export", "Export as JSON", || async {}));

        let actions = observer.actions().borrow().clone();
        let titles: Vec<_> = actions.iter().map(Action::title).collect();
        // reserved first, then case-insensitive title order; same-id
        // registration replaced the original Export
        assert_eq!(titles, ["Clear logs", "Copy all", "Export as JSON"]);

        store.unregister_action(&Action::new("copy", "irrelevant", || async {}));
        let remaining: Vec<_> = observer
            .actions()
            .borrow()
            .iter()
            .map(|a| a.id().to_string())
            .collect();
        assert_eq!(remaining, [CLEAR_ACTION_ID, "export"]);
    }

    #[tokio::test]
    async fn running_the_clear_action_clears_the_store() {
        let store = LogStore::new();
        let observer = store.create_observer();
        store.ingest(entry("net", "Api", "hello"));

        let clear = observer.actions().borrow().first().cloned().unwrap();
        assert_eq!(clear.id(), CLEAR_ACTION_ID);
        clear.run().await;

        assert!(store.is_empty());
        assert!(observer.entries().borrow().is_empty());
    }

    #[tokio::test]
    async fn clear_action_outlives_the_store_without_keeping_it_alive() {
        let store = LogStore::new();
        let observer = store.create_observer();
        store.ingest(entry("net", "Api", "hello"));

        let clear = observer.actions().borrow().first().cloned().unwrap();
        drop(store);
        // nothing left to clear; the weak handle makes this a no-op
        clear.run().await;
    }

    #[test]
    fn dropped_observers_stop_receiving_publishes() {
        let store = LogStore::new();
        let observer = store.create_observer();
        let entries = observer.entries();
        drop(observer);

        store.ingest(entry("net", "Api", "hello"));
        assert_eq!(store.len(), 1);
        // the cell kept by the receiver stays at its last published state
        assert!(entries.borrow().is_empty());
    }

    #[test]
    fn observers_created_after_ingestion_are_primed() {
        let store = LogStore::new();
        store.ingest(entry("net", "Api", "hello"));
        store.ingest(entry("db", "Query", "world"));

        let observer = store.create_observer();
        assert_eq!(observer.entries().borrow().len(), 2);
        assert_eq!(observer.categories().borrow().len(), 2);
        assert_eq!(observer.entry_sources().borrow().len(), 2);
    }

    #[test]
    fn categories_and_sources_publish_sorted() {
        let store = LogStore::new();
        store.ingest(entry("network", "Zeta", "a"));
        store.ingest(entry("Auth", "alpha", "b"));
        store.ingest(entry("database", "Beta", "c"));

        let observer = store.create_observer();
        let categories: Vec<_> = observer
            .categories()
            .borrow()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(categories, ["Auth", "database", "network"]);

        let sources: Vec<_> = observer
            .sources()
            .borrow()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(sources, ["alpha", "Beta", "Zeta"]);
    }

    #[test]
    fn concurrent_ingestion_linearizes() {
        let store = LogStore::new();
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let store = store.clone();
                scope.spawn(move || {
                    for i in 0..50 {
                        store.ingest(Entry::new(
                            Category::new("bulk"),
                            Source::new(format!("worker-{worker}")),
                            Content::new(format!("line {i}")),
                        ));
                    }
                });
            }
        });

        assert_eq!(store.len(), 400);
        let observer = store.create_observer();
        assert_eq!(observer.entries().borrow().len(), 400);
        assert_eq!(observer.sources().borrow().len(), 8);
        assert_eq!(observer.categories().borrow().len(), 1);
    }
}
