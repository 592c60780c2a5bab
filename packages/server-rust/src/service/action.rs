//! Route descriptors and the append-only registry that collects them.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::routing::MethodFilter;
use serde_json::Value;
use topo_core::{CcError, MapStr};

use crate::context::{ContextParams, PathParams, QueryParams};

/// Result returned by a resource handler: a JSON payload or an error.
pub type HandlerResult = Result<Value, CcError>;

/// Boxed future produced by a resource handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Type-erased resource handler stored in an [`Action`].
pub type HandlerFn =
    Arc<dyn Fn(ContextParams, PathParams, QueryParams, MapStr) -> HandlerFuture + Send + Sync>;

/// HTTP verbs a route can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    #[must_use]
    pub fn method_filter(self) -> MethodFilter {
        match self {
            Self::Get => MethodFilter::GET,
            Self::Post => MethodFilter::POST,
            Self::Put => MethodFilter::PUT,
            Self::Delete => MethodFilter::DELETE,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One route: verb, path template with `{name}` placeholders, and handler.
///
/// Each action owns its handler directly; binding the action to the router
/// clones the `Arc`, so no per-iteration state is shared between routes.
#[derive(Clone)]
pub struct Action {
    verb: Verb,
    path: String,
    handler: HandlerFn,
}

impl Action {
    pub fn new<F, Fut>(verb: Verb, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ContextParams, PathParams, QueryParams, MapStr) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            verb,
            path: path.into(),
            handler: Arc::new(
                move |ctx: ContextParams, path: PathParams, query: QueryParams, data: MapStr| -> HandlerFuture {
                    Box::pin(handler(ctx, path, query, data))
                },
            ),
        }
    }

    #[must_use]
    pub fn verb(&self) -> Verb {
        self.verb
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn handler(&self) -> &HandlerFn {
        &self.handler
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Errors raised while registering routes at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("route {verb} {path} conflicts with already registered {existing}")]
    Duplicate {
        verb: Verb,
        path: String,
        existing: String,
    },
    #[error("route {path} names a placeholder differently than already registered {existing}")]
    ConflictingPlaceholders { path: String, existing: String },
    #[error("invalid route path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

/// Ordered, append-only list of actions.
///
/// Two templates that differ only in placeholder names (e.g. `/set/{id}`
/// and `/set/{app_id}`) match the same requests, so they count as the same
/// route for duplicate detection. Across verbs, templates sharing a prefix
/// must name the placeholders in that prefix the same way, since the router
/// keeps one name per path position.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: Vec<Action>,
    seen: HashSet<(Verb, String)>,
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `action`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidPath` for a malformed template and
    /// `RegistryError::Duplicate` if an equivalent (verb, path) is already
    /// registered. Returns `RegistryError::ConflictingPlaceholders` if a
    /// registered template names a placeholder at the same position
    /// differently.
    pub fn register(&mut self, action: Action) -> Result<(), RegistryError> {
        let shape = route_shape(&action.path)?;
        if !self.seen.insert((action.verb, shape.clone())) {
            let existing = self
                .actions
                .iter()
                .find(|a| a.verb == action.verb && route_shape(&a.path).ok().as_ref() == Some(&shape))
                .map(|a| a.path.clone())
                .unwrap_or_default();
            return Err(RegistryError::Duplicate {
                verb: action.verb,
                path: action.path,
                existing,
            });
        }
        if let Some(existing) = self
            .actions
            .iter()
            .find(|a| placeholders_conflict(&a.path, &action.path))
        {
            let existing = existing.path.clone();
            self.seen.remove(&(action.verb, shape));
            return Err(RegistryError::ConflictingPlaceholders {
                path: action.path,
                existing,
            });
        }
        self.actions.push(action);
        Ok(())
    }

    /// Registered actions in registration order.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Validates a path template and erases placeholder names: `/set/{app_id}`
/// becomes `/set/{}`.
fn route_shape(path: &str) -> Result<String, RegistryError> {
    let invalid = |reason| RegistryError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    let mut shape = String::with_capacity(path.len());
    for segment in path.split('/').skip(1) {
        shape.push('/');
        if let Some(name) = segment.strip_prefix('{') {
            let name = name
                .strip_suffix('}')
                .ok_or_else(|| invalid("unterminated placeholder"))?;
            if name.is_empty() || name.contains(['{', '}']) {
                return Err(invalid("bad placeholder name"));
            }
            shape.push_str("{}");
        } else if segment.contains(['{', '}']) {
            return Err(invalid("placeholder must span a whole segment"));
        } else {
            shape.push_str(segment);
        }
    }
    Ok(shape)
}

/// Walks two templates while their segments route alike and reports a
/// placeholder position named differently by each.
fn placeholders_conflict(a: &str, b: &str) -> bool {
    for (left, right) in a.split('/').zip(b.split('/')) {
        match (left.starts_with('{'), right.starts_with('{')) {
            (true, true) if left != right => return true,
            (true, true) => {}
            (false, false) if left == right => {}
            _ => return false,
        }
    }
    false
}
