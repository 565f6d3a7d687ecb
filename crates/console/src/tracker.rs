//! Per-entity dirty state for display flags.
//!
//! Each loaded entity keeps the flag it had when fetched. An entity is dirty
//! exactly when its current flag differs from that baseline; dirtiness is
//! derived, never stored, so it cannot drift.
//!
//! ```text
//! Clean --toggle to other value--> Dirty
//! Dirty --toggle back-----------> Clean   (no network call)
//! Dirty --apply succeeded-------> Clean   (baseline := current)
//! Dirty --apply failed----------> Dirty
//! ```

use core::fmt;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

use display_toggle_core::wire::{CategoryUpdate, ProductUpdate};
use display_toggle_core::{Category, CategoryId, DisplayFlag, Product, ProductId};
use thiserror::Error;

/// Errors from tracker operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// No loaded entity has this ID.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
}

/// A record whose display flag can be tracked and updated.
pub trait Entity {
    /// Identifier type.
    type Id: Clone + Eq + Hash + fmt::Display;
    /// Item sent to the update endpoint.
    type Update: Send + Sync;

    /// This entity's ID.
    fn id(&self) -> &Self::Id;
    /// Current flag.
    fn display_flag(&self) -> DisplayFlag;
    /// Overwrite the current flag.
    fn set_display_flag(&mut self, flag: DisplayFlag);
    /// Update item carrying the current flag.
    fn to_update(&self) -> Self::Update;
}

impl Entity for Product {
    type Id = ProductId;
    type Update = ProductUpdate;

    fn id(&self) -> &ProductId {
        &self.product_id
    }

    fn display_flag(&self) -> DisplayFlag {
        self.display_flag
    }

    fn set_display_flag(&mut self, flag: DisplayFlag) {
        self.display_flag = flag;
    }

    fn to_update(&self) -> ProductUpdate {
        ProductUpdate {
            product_id: self.product_id.clone(),
            display_flag: self.display_flag,
            product_name: self.product_name.clone(),
            category_id: self.category_id.clone(),
        }
    }
}

impl Entity for Category {
    type Id = CategoryId;
    type Update = CategoryUpdate;

    fn id(&self) -> &CategoryId {
        &self.category_id
    }

    fn display_flag(&self) -> DisplayFlag {
        self.display_flag
    }

    fn set_display_flag(&mut self, flag: DisplayFlag) {
        self.display_flag = flag;
    }

    fn to_update(&self) -> CategoryUpdate {
        CategoryUpdate {
            category_id: self.category_id.clone(),
            display_flag: self.display_flag,
        }
    }
}

/// Sends one entity's update to the backend.
pub trait EntityUpdater<E: Entity> {
    /// Why an update failed.
    type Error: fmt::Display;

    /// Apply a single update.
    fn update(&self, update: &E::Update) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// One entity that failed to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    /// Entity ID.
    pub id: String,
    /// Why it failed.
    pub error: String,
}

/// Overall outcome of an apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    /// Nothing was dirty; no calls were made.
    NoChanges,
    /// Every dirty entity was applied.
    Complete,
    /// Some entities applied, some did not.
    Partial,
    /// No entity applied.
    Failed,
}

/// Per-entity outcome of an apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// IDs applied, in order.
    pub succeeded: Vec<String>,
    /// Entities that stayed dirty, in order.
    pub failed: Vec<ApplyFailure>,
}

impl ApplyReport {
    /// Summarise the outcome.
    #[must_use]
    pub fn status(&self) -> ApplyStatus {
        match (self.succeeded.is_empty(), self.failed.is_empty()) {
            (true, true) => ApplyStatus::NoChanges,
            (_, true) => ApplyStatus::Complete,
            (false, false) => ApplyStatus::Partial,
            (true, false) => ApplyStatus::Failed,
        }
    }
}

struct Tracked<E> {
    entity: E,
    original: DisplayFlag,
}

/// A collection of entities with per-entity dirty state.
pub struct DirtyTracker<E: Entity> {
    rows: Vec<Tracked<E>>,
    index: HashMap<E::Id, usize>,
}

impl<E: Entity> Default for DirtyTracker<E> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<E: Entity> DirtyTracker<E> {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the collection and take every current flag as the baseline.
    ///
    /// Pending toggles are discarded. If an ID occurs twice, the first
    /// occurrence is the one toggles and applies address.
    pub fn load(&mut self, records: Vec<E>) {
        self.index.clear();
        self.rows = records
            .into_iter()
            .map(|entity| Tracked {
                original: entity.display_flag(),
                entity,
            })
            .collect();
        for (position, row) in self.rows.iter().enumerate() {
            self.index.entry(row.entity.id().clone()).or_insert(position);
        }
    }

    /// Set an entity's flag and return whether it is now dirty.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::UnknownEntity` if no entity has this ID.
    pub fn toggle(&mut self, id: &E::Id, shown: bool) -> Result<bool, TrackerError> {
        let position = *self
            .index
            .get(id)
            .ok_or_else(|| TrackerError::UnknownEntity(id.to_string()))?;
        let row = self
            .rows
            .get_mut(position)
            .ok_or_else(|| TrackerError::UnknownEntity(id.to_string()))?;

        row.entity.set_display_flag(DisplayFlag::from_shown(shown));
        Ok(row.entity.display_flag() != row.original)
    }

    /// Entity by ID.
    #[must_use]
    pub fn get(&self, id: &E::Id) -> Option<&E> {
        self.index
            .get(id)
            .and_then(|position| self.rows.get(*position))
            .map(|row| &row.entity)
    }

    /// Whether an entity differs from its baseline; `None` if unknown.
    #[must_use]
    pub fn is_dirty(&self, id: &E::Id) -> Option<bool> {
        self.index
            .get(id)
            .and_then(|position| self.rows.get(*position))
            .map(|row| row.entity.display_flag() != row.original)
    }

    /// Flag the entity had when loaded or last applied.
    #[must_use]
    pub fn original_flag(&self, id: &E::Id) -> Option<DisplayFlag> {
        self.index
            .get(id)
            .and_then(|position| self.rows.get(*position))
            .map(|row| row.original)
    }

    /// All entities in load order.
    pub fn entities(&self) -> impl Iterator<Item = &E> {
        self.rows.iter().map(|row| &row.entity)
    }

    /// Number of loaded entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of dirty entities.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.dirty_rows().count()
    }

    /// Update items for every dirty entity, once each, in load order.
    #[must_use]
    pub fn changeset(&self) -> Vec<E::Update> {
        self.dirty_rows().map(|row| row.entity.to_update()).collect()
    }

    /// Push every dirty entity through `updater`, one at a time.
    ///
    /// A failed entity stays dirty and is reported; it does not stop the
    /// rest. Succeeded entities take their current flag as the new baseline.
    pub async fn apply<U>(&mut self, updater: &U) -> ApplyReport
    where
        U: EntityUpdater<E> + Sync,
    {
        let dirty: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(position, row)| {
                row.entity.display_flag() != row.original
                    && self.index.get(row.entity.id()) == Some(position)
            })
            .map(|(position, _)| position)
            .collect();

        let mut report = ApplyReport::default();

        for position in dirty {
            let Some(row) = self.rows.get_mut(position) else {
                continue;
            };
            let id = row.entity.id().to_string();

            match updater.update(&row.entity.to_update()).await {
                Ok(()) => {
                    row.original = row.entity.display_flag();
                    tracing::info!(id = %id, flag = %row.original, "Display flag applied");
                    report.succeeded.push(id);
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Display flag update failed");
                    report.failed.push(ApplyFailure {
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    fn dirty_rows(&self) -> impl Iterator<Item = &Tracked<E>> {
        self.rows.iter().enumerate().filter_map(|(position, row)| {
            (row.entity.display_flag() != row.original
                && self.index.get(row.entity.id()) == Some(&position))
            .then_some(row)
        })
    }
}
