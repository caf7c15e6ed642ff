use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use serde_json::Value;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

/// Identity of one ingested entry: a creation timestamp plus a process-wide
/// uniqueness token. Ids order by timestamp, with the token breaking ties
/// between entries created in the same instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryId {
    created_at: DateTime<Utc>,
    token: u64,
}

impl EntryId {
    /// Allocate an id stamped with the current time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Allocate an id for a record created at a known time (replayed logs).
    pub fn at(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            token: NEXT_TOKEN.fetch_add(1, AtomicOrdering::Relaxed),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl Ord for EntryId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then(self.token.cmp(&other.token))
    }
}

impl PartialOrd for EntryId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Grouping dimension for entries ("network", "database", ...). Two
/// categories are the same only when both the name and the emoji agree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Category {
    pub emoji: Option<String>,
    pub name: String,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            emoji: None,
            name: name.into(),
        }
    }

    pub fn with_emoji(emoji: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            emoji: Some(emoji.into()),
            name: name.into(),
        }
    }

    /// Name with the emoji glyph prefixed, for labels and breadcrumbs.
    pub fn display_name(&self) -> String {
        match &self.emoji {
            Some(emoji) => format!("{} {}", emoji, self.name),
            None => self.name.clone(),
        }
    }

    /// Projection the filter mechanism compares queries against.
    pub fn filter_query(&self) -> &str {
        &self.name
    }
}

impl Ord for Category {
    // Case-insensitive name order; raw name and emoji break ties so the
    // ordering agrees with equality.
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .to_lowercase()
            .cmp(&other.name.to_lowercase())
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.emoji.cmp(&other.emoji))
    }
}

impl PartialOrd for Category {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Origin of an entry (a subsystem, module, or file name). Identity is the
/// normalized name alone; emoji and info are display metadata.
#[derive(Clone, Debug)]
pub struct Source {
    name: String,
    pub emoji: Option<String>,
    pub info: Option<String>,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: normalize_name(&name.into()),
            emoji: None,
            info: None,
        }
    }

    pub fn with_emoji(emoji: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: normalize_name(&name.into()),
            emoji: Some(emoji.into()),
            info: None,
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name with the emoji glyph prefixed, for labels and breadcrumbs.
    pub fn display_name(&self) -> String {
        match &self.emoji {
            Some(emoji) => format!("{} {}", emoji, self.name),
            None => self.name.clone(),
        }
    }

    /// Projection the filter mechanism compares queries against.
    pub fn filter_query(&self) -> &str {
        &self.name
    }
}

/// "worker.rs" and "worker" name the same source: a trailing
/// file-extension-like suffix does not participate in identity.
fn normalize_name(raw: &str) -> String {
    match raw.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            stem.to_string()
        }
        _ => raw.to_string(),
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Source {}

impl Hash for Source {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Ord for Source {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .to_lowercase()
            .cmp(&other.name.to_lowercase())
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for Source {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Primary and secondary text of an entry. Empty and whitespace-only strings
/// count as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Content {
    title: String,
    subtitle: Option<String>,
}

impl Content {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
        }
    }

    pub fn with_subtitle(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: Some(subtitle.into()),
        }
    }

    pub fn title(&self) -> Option<&str> {
        non_empty(&self.title)
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref().and_then(non_empty)
    }

    /// Projection the filter mechanism compares queries against: the present
    /// text parts joined with a space.
    pub fn filter_query(&self) -> String {
        match (self.title(), self.subtitle()) {
            (Some(title), Some(subtitle)) => format!("{title} {subtitle}"),
            (Some(title), None) => title.to_string(),
            (None, Some(subtitle)) => subtitle.to_string(),
            (None, None) => String::new(),
        }
    }
}

fn non_empty(text: &str) -> Option<&str> {
    if text.trim().is_empty() { None } else { Some(text) }
}

/// Placeholder shown for user-info values with no textual rendering.
pub const PLACEHOLDER_VALUE: &str = "∅";

/// Flat, key-sorted string facts attached to an entry.
///
/// Built by flattening a JSON value: object keys map directly, array indices
/// become keys, and a bare scalar lands under `"value"`. Null and
/// whitespace-only text normalize to [`PLACEHOLDER_VALUE`]. Containers nested
/// below the top level stay as compact JSON.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserInfo {
    pairs: BTreeMap<String, String>,
}

impl UserInfo {
    pub fn from_value(value: &Value) -> Self {
        let mut pairs = BTreeMap::new();
        match value {
            Value::Object(map) => {
                for (key, item) in map {
                    pairs.insert(key.clone(), scalar_text(item));
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    pairs.insert(index.to_string(), scalar_text(item));
                }
            }
            Value::Null => {}
            scalar => {
                pairs.insert("value".to_string(), scalar_text(scalar));
            }
        }
        Self { pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    /// Key/value facts in key order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => PLACEHOLDER_VALUE.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.trim().is_empty() => PLACEHOLDER_VALUE.to_string(),
        Value::String(s) => s.clone(),
        nested => serde_json::to_string(nested).unwrap_or_else(|_| PLACEHOLDER_VALUE.to_string()),
    }
}

/// One ingested log record.
#[derive(Clone, Debug)]
pub struct Entry {
    pub id: EntryId,
    pub category: Category,
    pub source: Source,
    pub content: Content,
    /// Raw structured payload; the store flattens it into [`UserInfo`] facts.
    pub user_info: Option<Value>,
}

impl Entry {
    pub fn new(category: Category, source: Source, content: Content) -> Self {
        Self {
            id: EntryId::new(),
            category,
            source,
            content,
            user_info: None,
        }
    }

    pub fn with_user_info(mut self, user_info: Value) -> Self {
        self.user_info = Some(user_info);
        self
    }

    /// Replace the auto-assigned id, for records with a known creation time.
    pub fn with_id(mut self, id: EntryId) -> Self {
        self.id = id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_ids_order_by_timestamp_then_token() {
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(1);

        // allocation order does not matter when timestamps differ
        let late = EntryId::at(t2);
        let early = EntryId::at(t1);
        assert!(early < late);

        // same timestamp: allocation order decides
        let first = EntryId::at(t1);
        let second = EntryId::at(t1);
        assert!(first < second);
    }

    #[test]
    fn source_identity_ignores_emoji_and_info() {
        let plain = Source::new("NetworkClient");
        let decorated = Source::with_emoji("🌐", "NetworkClient").with_info("v2");
        assert_eq!(plain, decorated);

        let mut set = std::collections::HashSet::new();
        set.insert(plain);
        assert!(set.contains(&decorated));
    }

    #[test]
    fn source_name_strips_extension_suffixes() {
        assert_eq!(Source::new("NetworkClient.swift").name(), "NetworkClient");
        assert_eq!(Source::new("worker.rs").name(), "worker");
        assert_eq!(Source::new("plain").name(), "plain");
        assert_eq!(Source::new(".env").name(), ".env");
        assert_eq!(Source::new("trailing.").name(), "trailing.");
        assert_eq!(Source::new("a.b-c").name(), "a.b-c");
    }

    #[test]
    fn category_ordering_is_case_insensitive() {
        let mut categories = vec![
            Category::new("network"),
            Category::new("Auth"),
            Category::new("database"),
        ];
        categories.sort();
        let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Auth", "database", "network"]);
    }

    #[test]
    fn category_equality_includes_emoji() {
        assert_eq!(Category::new("io"), Category::new("io"));
        assert_ne!(Category::new("io"), Category::with_emoji("💾", "io"));
    }

    #[test]
    fn display_names_prefix_the_emoji() {
        assert_eq!(Category::with_emoji("🌐", "network").display_name(), "🌐 network");
        assert_eq!(Category::new("network").display_name(), "network");
        assert_eq!(Source::with_emoji("📡", "Api.rs").display_name(), "📡 Api");
    }

    #[test]
    fn empty_content_parts_count_as_absent() {
        let content = Content::with_subtitle("", "  ");
        assert_eq!(content.title(), None);
        assert_eq!(content.subtitle(), None);
        assert_eq!(content.filter_query(), "");

        let full = Content::with_subtitle("request failed", "retrying");
        assert_eq!(full.filter_query(), "request failed retrying");
    }

    #[test]
    fn user_info_flattens_objects_to_sorted_pairs() {
        let info = UserInfo::from_value(&json!({"path": "/x", "code": 404}));
        let pairs: Vec<_> = info.pairs().collect();
        assert_eq!(pairs, [("code", "404"), ("path", "/x")]);
    }

    #[test]
    fn user_info_flattens_arrays_with_index_keys() {
        let info = UserInfo::from_value(&json!(["a", 7]));
        let pairs: Vec<_> = info.pairs().collect();
        assert_eq!(pairs, [("0", "a"), ("1", "7")]);
    }

    #[test]
    fn user_info_scalar_lands_under_value_key() {
        let info = UserInfo::from_value(&json!(42));
        assert_eq!(info.get("value"), Some("42"));

        let text = UserInfo::from_value(&json!("hello"));
        assert_eq!(text.get("value"), Some("hello"));
    }

    #[test]
    fn user_info_normalizes_blank_values_to_placeholder() {
        let info = UserInfo::from_value(&json!({"a": null, "b": "", "c": "  "}));
        assert_eq!(info.get("a"), Some(PLACEHOLDER_VALUE));
        assert_eq!(info.get("b"), Some(PLACEHOLDER_VALUE));
        assert_eq!(info.get("c"), Some(PLACEHOLDER_VALUE));
    }

    #[test]
    fn user_info_keeps_nested_containers_as_json() {
        let info = UserInfo::from_value(&json!({"req": {"verb": "GET"}}));
        assert_eq!(info.get("req"), Some(r#"{"verb":"GET"}"#));
    }

    #[test]
    fn user_info_from_null_is_empty() {
        let info = UserInfo::from_value(&Value::Null);
        assert!(info.is_empty());
        assert_eq!(info.len(), 0);
    }
}
