use std::cmp::Ordering;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

/// Ids with this prefix belong to actions the store itself provides.
pub const RESERVED_ACTION_PREFIX: &str = "logdeck.";

/// Handler invoked when the presentation layer runs an action.
pub type ActionHandler = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActionRole {
    #[default]
    Regular,
    /// Rendered with destructive styling (deletes, clears).
    Destructive,
}

/// A host- or store-provided operation surfaced in the action bar.
///
/// Identity is the id alone. Display order is separate from identity: see
/// [`Action::display_cmp`].
#[derive(Clone)]
pub struct Action {
    id: String,
    title: String,
    role: ActionRole,
    image: Option<String>,
    handler: ActionHandler,
}

impl Action {
    pub fn new<F, Fut>(id: impl Into<String>, title: impl Into<String>, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            id: id.into(),
            title: title.into(),
            role: ActionRole::Regular,
            image: None,
            handler: Arc::new(move || handler().boxed()),
        }
    }

    pub fn with_role(mut self, role: ActionRole) -> Self {
        self.role = role;
        self
    }

    /// Symbolic image name for the action button.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn role(&self) -> ActionRole {
        self.role
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Whether the id sits in the store's reserved namespace.
    pub fn is_reserved(&self) -> bool {
        self.id.starts_with(RESERVED_ACTION_PREFIX)
    }

    /// Run the handler to completion.
    pub async fn run(&self) {
        (self.handler)().await;
    }

    /// Display order: reserved actions first, then case-insensitively by
    /// title, then id.
    pub fn display_cmp(&self, other: &Self) -> Ordering {
        other
            .is_reserved()
            .cmp(&self.is_reserved())
            .then_with(|| self.title.to_lowercase().cmp(&other.title.to_lowercase()))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Action {}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("role", &self.role)
            .finish()
    }
}
