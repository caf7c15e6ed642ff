use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use logdeck_pipeline::{FileSettings, FilterPipeline, MemorySettings, SettingsStore};
use logdeck_store::{LogObserver, LogStore};
use logdeck_types::{Category, Content, Entry, EntryId, Filter, SortOrder, Source, SourceColor};

/// Logdeck - an in-process log aggregation and live-filtering engine
///
/// Reads JSON-lines entry records from stdin, runs them through the store and
/// filter pipeline, and prints the visible list that results.
#[derive(Parser, Debug)]
#[command(name = "logdeck")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sort direction for the visible list
    #[arg(long, value_enum)]
    sort: Option<SortArg>,

    /// Activate a category filter (repeatable)
    #[arg(long = "category", value_name = "NAME")]
    categories: Vec<String>,

    /// Activate a source filter (repeatable)
    #[arg(long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Free-text search over content, sources, categories and user-info
    #[arg(long)]
    search: Option<String>,

    /// Settings file for persisted sort order and drawer visibility
    #[arg(long, value_name = "FILE")]
    settings: Option<std::path::PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortArg {
    Asc,
    Desc,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Asc => SortOrder::Ascending,
            SortArg::Desc => SortOrder::Descending,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing for debugging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

/// One stdin record. Unknown fields are ignored; a line that is not valid
/// JSON becomes a plain entry with the raw line as its title.
#[derive(Debug, Deserialize)]
struct Record {
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    category_emoji: Option<String>,
    #[serde(default = "default_source")]
    source: String,
    #[serde(default)]
    source_emoji: Option<String>,
    #[serde(default)]
    source_info: Option<String>,
    title: String,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    user_info: Option<serde_json::Value>,
    /// RFC 3339 creation time; defaults to arrival time
    #[serde(default)]
    timestamp: Option<String>,
}

fn default_category() -> String {
    "log".to_string()
}

fn default_source() -> String {
    "stdin".to_string()
}

impl Record {
    fn into_entry(self) -> Entry {
        let category = match self.category_emoji {
            Some(emoji) => Category::with_emoji(emoji, self.category),
            None => Category::new(self.category),
        };

        let mut source = match self.source_emoji {
            Some(emoji) => Source::with_emoji(emoji, self.source),
            None => Source::new(self.source),
        };
        if let Some(info) = self.source_info {
            source = source.with_info(info);
        }

        let content = match self.subtitle {
            Some(subtitle) => Content::with_subtitle(self.title, subtitle),
            None => Content::new(self.title),
        };

        let mut entry = Entry::new(category, source, content);
        if let Some(raw) = self.timestamp {
            if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(&raw) {
                entry = entry.with_id(EntryId::at(ts.with_timezone(&chrono::Utc)));
            }
        }
        if let Some(user_info) = self.user_info {
            entry = entry.with_user_info(user_info);
        }
        entry
    }
}

fn raw_line_entry(line: String) -> Entry {
    Entry::new(
        Category::new(default_category()),
        Source::new(default_source()),
        Content::new(line),
    )
}

async fn run(args: Args) -> Result<()> {
    let store = LogStore::new();
    let observer = store.create_observer();

    let settings: Arc<dyn SettingsStore> = match &args.settings {
        Some(path) => Arc::new(FileSettings::open(path)?),
        None => Arc::new(MemorySettings::new()),
    };

    let pipeline = FilterPipeline::new(Arc::clone(&observer), settings);

    if let Some(sort) = args.sort {
        pipeline.set_sort_order(sort.into());
    }
    for name in &args.categories {
        pipeline.activate(Filter::category(&Category::new(name.clone())));
    }
    for name in &args.sources {
        pipeline.activate(Filter::source(&Source::new(name.clone())));
    }
    if let Some(search) = &args.search {
        pipeline.set_search_query(search.clone());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut read = 0usize;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let entry = match serde_json::from_str::<Record>(&line) {
            Ok(record) => record.into_entry(),
            Err(_) => raw_line_entry(line),
        };
        store.ingest(entry);
        read += 1;
    }
    tracing::debug!(read, "stdin drained");

    // let the search debounce and recompute throttle windows drain
    tokio::time::sleep(Duration::from_millis(600)).await;

    let labels = pipeline.scope_labels().borrow().clone();
    if !labels.is_empty() {
        println!("scope: {}", labels.join(" > "));
    }

    let visible = pipeline.visible_entries().borrow().clone();
    print_entries(&observer, &visible);
    println!("{} of {} entries visible", visible.len(), store.len());

    Ok(())
}

fn print_entries(observer: &LogObserver, ids: &[EntryId]) {
    let sources = observer.entry_sources().borrow().clone();
    for &id in ids {
        let source = sources.get(&id);
        let color = source
            .and_then(|s| observer.color_for(s.name()))
            .unwrap_or(SourceColor::FALLBACK);

        let category_label = observer
            .category_for(id)
            .map(|c| c.display_name())
            .unwrap_or_else(|| "?".to_string());
        let source_label = source
            .map(|s| s.display_name())
            .unwrap_or_else(|| "?".to_string());
        let content = observer.content_for(id);

        let mut line = format!(
            "{} {} {}/{}: {}",
            id.created_at().format("%H:%M:%S%.3f"),
            color.light.hex(),
            category_label,
            source_label,
            content
                .as_ref()
                .and_then(|c| c.title())
                .unwrap_or("(no title)"),
        );
        if let Some(subtitle) = content.as_ref().and_then(|c| c.subtitle()) {
            line.push_str(" | ");
            line.push_str(subtitle);
        }
        if let Some(info) = observer.user_info_for(id).filter(|info| !info.is_empty()) {
            let facts: Vec<String> = info
                .pairs()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            line.push_str(&format!(" ({})", facts.join(" ")));
        }
        println!("{line}");
    }
}
