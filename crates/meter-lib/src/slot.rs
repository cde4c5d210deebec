//! Published-model slot with atomic replacement
//!
//! Models are built outside the slot and swapped in as a whole, so readers
//! observe either the previous model or the new one.

use std::sync::{Arc, RwLock};

pub struct ModelSlot<T> {
    inner: RwLock<Option<Arc<T>>>,
}

impl<T> Default for ModelSlot<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }
}

impl<T> ModelSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently published model
    pub fn current(&self) -> Option<Arc<T>> {
        self.inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Replace the published model, returning the new reference
    pub fn publish(&self, model: T) -> Arc<T> {
        let model = Arc::new(model);
        *self.inner.write().unwrap_or_else(|p| p.into_inner()) = Some(Arc::clone(&model));
        model
    }

    pub fn invalidate(&self) {
        *self.inner.write().unwrap_or_else(|p| p.into_inner()) = None;
    }

    pub fn is_valid(&self) -> bool {
        self.current().is_some()
    }
}

/// What a cache revalidation did
#[derive(Debug)]
pub enum RefreshOutcome<T> {
    /// Stored model still matches its source
    Reused(Arc<T>),
    /// A new model was fitted and published
    Retrained(Arc<T>),
    /// Not enough data to fit; the slot was invalidated
    Insufficient { available: usize, required: usize },
    /// Backing data does not exist; the slot was invalidated
    MissingSource,
    /// Reading or fitting failed; the slot was invalidated
    Failed(String),
}

impl<T> RefreshOutcome<T> {
    /// The model published after this refresh, if any
    pub fn model(&self) -> Option<Arc<T>> {
        match self {
            RefreshOutcome::Reused(m) | RefreshOutcome::Retrained(m) => Some(Arc::clone(m)),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Reused(_) => "reused",
            RefreshOutcome::Retrained(_) => "retrained",
            RefreshOutcome::Insufficient { .. } => "insufficient_data",
            RefreshOutcome::MissingSource => "missing_source",
            RefreshOutcome::Failed(_) => "failed",
        }
    }
}
