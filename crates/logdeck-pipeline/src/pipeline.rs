use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use logdeck_store::{LogObserver, LookupTables};
use logdeck_types::{Category, EntryId, Filter, FilterKind, SortOrder, Source};

use crate::settings::SettingsStore;
use crate::timing::{debounce, throttle};

/// Store- and filter-driven recomputes happen at most once per window.
const RECOMPUTE_WINDOW: Duration = Duration::from_millis(150);

/// Search input must go quiet for this long before it applies.
const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Reactive composition of the active filter set, search query, sort order
/// and entry set into one continuously recomputed visible list.
///
/// Inputs and outputs are latest-value cells. All recomputation and all
/// output publication happen on a single worker task, so consumers observe
/// one ordered stream of updates. Store- and filter-driven recomputes are
/// throttled and the search input is debounced, but the newest input state is
/// always the state that lands; within a pass the visible list publishes
/// last, after the candidate lists and labels it was derived with.
pub struct FilterPipeline {
    observer: Arc<LogObserver>,
    settings: Arc<dyn SettingsStore>,
    filters: watch::Sender<Vec<Filter>>,
    search: watch::Sender<String>,
    sort: watch::Sender<SortOrder>,
    show_filters: watch::Sender<bool>,
    visible: watch::Receiver<Vec<EntryId>>,
    category_filters: watch::Receiver<Vec<Filter>>,
    source_filters: watch::Receiver<Vec<Filter>>,
    scope_labels: watch::Receiver<Vec<String>>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl FilterPipeline {
    /// Build the pipeline and spawn its worker; must run inside a Tokio
    /// runtime. Sort order and drawer visibility seed from `settings`, and
    /// the outputs are primed before this returns.
    pub fn new(observer: Arc<LogObserver>, settings: Arc<dyn SettingsStore>) -> Self {
        let filters = watch::Sender::new(Vec::new());
        let search = watch::Sender::new(String::new());
        let sort = watch::Sender::new(settings.sort_order().unwrap_or_default());
        let show_filters = watch::Sender::new(settings.show_filters().unwrap_or(false));

        let mut worker = Worker {
            observer: Arc::clone(&observer),
            entries: observer.entries(),
            entry_sources: observer.entry_sources(),
            categories: observer.categories(),
            filters: filters.subscribe(),
            store_trigger: throttle(RECOMPUTE_WINDOW, observer.entries()),
            filter_trigger: throttle(RECOMPUTE_WINDOW, filters.subscribe()),
            search: debounce(SEARCH_DEBOUNCE, search.subscribe()),
            sort: sort.subscribe(),
            visible_tx: watch::Sender::new(Vec::new()),
            category_filters_tx: watch::Sender::new(Vec::new()),
            source_filters_tx: watch::Sender::new(Vec::new()),
            scope_labels_tx: watch::Sender::new(Vec::new()),
        };

        let visible = worker.visible_tx.subscribe();
        let category_filters = worker.category_filters_tx.subscribe();
        let source_filters = worker.source_filters_tx.subscribe();
        let scope_labels = worker.scope_labels_tx.subscribe();

        worker.recompute();

        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let handle = tokio::spawn(async move { worker.run(worker_cancel).await });

        Self {
            observer,
            settings,
            filters,
            search,
            sort,
            show_filters,
            visible,
            category_filters,
            source_filters,
            scope_labels,
            cancel,
            worker: handle,
        }
    }

    /// Observer backing this pipeline, for per-entry lookups at render time.
    pub fn observer(&self) -> &Arc<LogObserver> {
        &self.observer
    }

    /// Currently active filters, in activation order.
    pub fn active_filters(&self) -> Vec<Filter> {
        self.filters.borrow().clone()
    }

    /// Activate `filter`; a no-op when it is already active.
    pub fn activate(&self, filter: Filter) {
        self.filters.send_if_modified(|active| {
            if active.contains(&filter) {
                false
            } else {
                active.push(filter);
                true
            }
        });
    }

    /// Deactivate `filter`; a no-op when it is not active.
    pub fn deactivate(&self, filter: &Filter) {
        self.filters.send_if_modified(|active| {
            let before = active.len();
            active.retain(|existing| existing != filter);
            active.len() != before
        });
    }

    /// Flip one filter's activation state.
    pub fn toggle(&self, filter: Filter) {
        self.filters.send_modify(|active| {
            if active.contains(&filter) {
                active.retain(|existing| existing != &filter);
            } else {
                active.push(filter);
            }
        });
    }

    /// Raw search text as last set (not yet debounced).
    pub fn search_query(&self) -> String {
        self.search.borrow().clone()
    }

    /// Replace the search text; it applies after a short quiet period.
    pub fn set_search_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.search.send_if_modified(|current| {
            if *current == query {
                false
            } else {
                *current = query;
                true
            }
        });
    }

    pub fn sort_order(&self) -> SortOrder {
        *self.sort.borrow()
    }

    /// Change the sort direction; an actual change mirrors to settings.
    pub fn set_sort_order(&self, order: SortOrder) {
        let modified = self.sort.send_if_modified(|current| {
            if *current == order {
                false
            } else {
                *current = order;
                true
            }
        });
        if modified {
            self.settings.set_sort_order(order);
        }
    }

    pub fn toggle_sort_order(&self) {
        self.set_sort_order(self.sort_order().toggled());
    }

    /// Whether the filter drawer is shown.
    pub fn show_filters(&self) -> bool {
        *self.show_filters.borrow()
    }

    /// Show or hide the filter drawer; an actual change mirrors to settings.
    pub fn set_show_filters(&self, show: bool) {
        let modified = self.show_filters.send_if_modified(|current| {
            if *current == show {
                false
            } else {
                *current = show;
                true
            }
        });
        if modified {
            self.settings.set_show_filters(show);
        }
    }

    /// Drawer visibility as a subscribable cell.
    pub fn show_filters_updates(&self) -> watch::Receiver<bool> {
        self.show_filters.subscribe()
    }

    /// The filtered, searched and sorted id sequence to render.
    pub fn visible_entries(&self) -> watch::Receiver<Vec<EntryId>> {
        self.visible.clone()
    }

    /// Category filter candidates, active ones first.
    pub fn category_filters(&self) -> watch::Receiver<Vec<Filter>> {
        self.category_filters.clone()
    }

    /// Source filter candidates, active ones first.
    pub fn source_filters(&self) -> watch::Receiver<Vec<Filter>> {
        self.source_filters.clone()
    }

    /// Breadcrumb labels for the active filter scope.
    pub fn scope_labels(&self) -> watch::Receiver<Vec<String>> {
        self.scope_labels.clone()
    }

    /// Stop the worker; outputs freeze at their last published values.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.worker.abort();
    }
}

impl Drop for FilterPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    observer: Arc<LogObserver>,
    // data taps, read fresh at compute time
    entries: watch::Receiver<Vec<EntryId>>,
    entry_sources: watch::Receiver<HashMap<EntryId, Source>>,
    categories: watch::Receiver<Vec<Category>>,
    filters: watch::Receiver<Vec<Filter>>,
    // wakeup sources
    store_trigger: watch::Receiver<Vec<EntryId>>,
    filter_trigger: watch::Receiver<Vec<Filter>>,
    search: watch::Receiver<String>,
    sort: watch::Receiver<SortOrder>,
    // outputs
    visible_tx: watch::Sender<Vec<EntryId>>,
    category_filters_tx: watch::Sender<Vec<Filter>>,
    source_filters_tx: watch::Sender<Vec<Filter>>,
    scope_labels_tx: watch::Sender<Vec<String>>,
}

impl Worker {
    async fn run(mut self, cancel: CancellationToken) {
        loop {
            let changed = tokio::select! {
                _ = cancel.cancelled() => break,
                changed = self.store_trigger.changed() => changed,
                changed = self.filter_trigger.changed() => changed,
                changed = self.search.changed() => changed,
                changed = self.sort.changed() => changed,
            };
            if changed.is_err() {
                break;
            }
            self.recompute();
        }
    }

    /// One full pass: read every input fresh, derive every output, publish
    /// outputs that changed (visible list last).
    fn recompute(&mut self) {
        // marking all inputs seen here collapses simultaneous wakeups into
        // one pass
        let _ = self.store_trigger.borrow_and_update();
        let _ = self.filter_trigger.borrow_and_update();
        let active = self.filters.borrow_and_update().clone();
        let search = self.search.borrow_and_update().trim().to_string();
        let sort = *self.sort.borrow_and_update();

        // the entry list is read before the lookup cells; publish order on
        // the observer side guarantees the lookups are at least as new
        let entries = self.entries.borrow_and_update().clone();
        let entry_sources = self.entry_sources.borrow_and_update().clone();
        let categories = self.categories.borrow_and_update().clone();
        let tables = self.observer.lookup_tables();

        let lookup = EntryLookup {
            sources: &entry_sources,
            tables: &tables,
        };

        let visible = visible_entries(&entries, &lookup, &active, &search, sort);
        let categories = category_candidates(&categories, &active);
        let sources = source_candidates(&visible, &lookup, &active);
        let labels = scope_labels(&active, &search);

        trace!(
            visible = visible.len(),
            active = active.len(),
            "pipeline recomputed"
        );

        publish(&self.category_filters_tx, categories);
        publish(&self.source_filters_tx, sources);
        publish(&self.scope_labels_tx, labels);
        publish(&self.visible_tx, visible);
    }
}

/// Replace the cell value only when it actually changed, so downstream
/// waiters are not woken for identical recompute results.
fn publish<T: PartialEq>(tx: &watch::Sender<T>, value: T) {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}

struct EntryLookup<'a> {
    sources: &'a HashMap<EntryId, Source>,
    tables: &'a LookupTables,
}

impl EntryLookup<'_> {
    /// Whether `filter` matches the entry on any of its applicable
    /// dimensions; first hit wins. Entries missing from a lookup (a publish
    /// racing a clear) simply fail that dimension.
    fn matches(&self, filter: &Filter, id: EntryId) -> bool {
        let kind = filter.kind();
        if kind.intersects(FilterKind::SOURCE) {
            if let Some(source) = self.sources.get(&id) {
                if filter.matches_text(source.filter_query()) {
                    return true;
                }
            }
        }
        if kind.intersects(FilterKind::CATEGORY) {
            if let Some(category) = self.tables.entry_categories.get(&id) {
                if filter.matches_text(category.filter_query()) {
                    return true;
                }
            }
        }
        if kind.intersects(FilterKind::CONTENT) {
            if let Some(content) = self.tables.entry_contents.get(&id) {
                if filter.matches_text(&content.filter_query()) {
                    return true;
                }
            }
        }
        if kind.intersects(FilterKind::USER_INFO) {
            if let Some(info) = self.tables.entry_user_info.get(&id) {
                if info
                    .pairs()
                    .any(|(key, value)| filter.matches_text(key) || filter.matches_text(value))
                {
                    return true;
                }
            }
        }
        false
    }

    fn source_of(&self, id: EntryId) -> Option<&Source> {
        self.sources.get(&id)
    }
}

/// One filter stage: entries pass when the stage is empty or any member
/// matches.
fn apply_stage(ids: Vec<EntryId>, stage: &[&Filter], lookup: &EntryLookup<'_>) -> Vec<EntryId> {
    if stage.is_empty() {
        return ids;
    }
    ids.into_iter()
        .filter(|&id| stage.iter().any(|filter| lookup.matches(filter, id)))
        .collect()
}

/// Store order, narrowed by the active filters (one OR pool across kinds),
/// narrowed again by the search filter, then ordered by `sort`.
fn visible_entries(
    entries: &[EntryId],
    lookup: &EntryLookup<'_>,
    active: &[Filter],
    search: &str,
    sort: SortOrder,
) -> Vec<EntryId> {
    let pool: Vec<&Filter> = active.iter().collect();
    let mut visible = apply_stage(entries.to_vec(), &pool, lookup);

    if !search.is_empty() {
        let query = Filter::search(search);
        visible = apply_stage(visible, &[&query], lookup);
    }

    if sort == SortOrder::Descending {
        visible.reverse();
    }
    visible
}

/// Every known category as a candidate filter, active ones first. Categories
/// sharing a name yield filters with the same identity; only the first
/// occurrence is kept.
fn category_candidates(categories: &[Category], active: &[Filter]) -> Vec<Filter> {
    let mut candidates: Vec<Filter> = Vec::new();
    for category in categories {
        let filter = Filter::category(category);
        if !candidates.contains(&filter) {
            candidates.push(filter);
        }
    }
    sort_candidates(&mut candidates, active);
    candidates
}

/// Sources of the visible entries as candidate filters, plus any active
/// source filter whose source is no longer visible (so it stays
/// deactivatable), active ones first.
fn source_candidates(
    visible: &[EntryId],
    lookup: &EntryLookup<'_>,
    active: &[Filter],
) -> Vec<Filter> {
    let mut seen = BTreeSet::new();
    for &id in visible {
        if let Some(source) = lookup.source_of(id) {
            seen.insert(source.clone());
        }
    }

    let mut candidates: Vec<Filter> = seen.iter().map(Filter::source).collect();
    for filter in active {
        if filter.kind() == FilterKind::SOURCE && !candidates.contains(filter) {
            candidates.push(filter.clone());
        }
    }
    sort_candidates(&mut candidates, active);
    candidates
}

/// Active filters first; each group ordered by query text,
/// case-insensitively.
fn sort_candidates(candidates: &mut [Filter], active: &[Filter]) {
    candidates.sort_by_key(|filter| {
        (
            !active.contains(filter),
            filter.query().to_lowercase(),
            filter.query().to_string(),
        )
    });
}

/// Breadcrumb labels: active filter names sorted case-insensitively, with a
/// pending search query appended as an implicit trailing filter.
fn scope_labels(active: &[Filter], search: &str) -> Vec<String> {
    let mut labels: Vec<String> = active
        .iter()
        .map(|filter| filter.display_name().to_string())
        .collect();
    labels.sort_by_key(|label| label.to_lowercase());
    if !search.is_empty() {
        labels.push(search.to_string());
    }
    labels
}
