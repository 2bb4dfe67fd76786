//! Startup reconciliation of the index and its attribute settings.
//!
//! Idempotent: the index is created only when missing, and each attribute
//! set is replaced only when it differs from the declared one as a set.

use std::collections::HashSet;

use tracing::info;

use crate::engine::SearchEngine;
use crate::error::SearchError;

/// Attribute sets the index must declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredAttributes {
    pub filterable: Vec<String>,
    pub sortable: Vec<String>,
}

impl Default for DeclaredAttributes {
    /// `signer` and `timelines` filterable, `signedAt` sortable.
    fn default() -> Self {
        Self {
            filterable: vec!["signer".into(), "timelines".into()],
            sortable: vec!["signedAt".into()],
        }
    }
}

/// What reconciliation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: bool,
    pub filterable_updated: bool,
    pub sortable_updated: bool,
}

fn same_set(current: &[String], declared: &[String]) -> bool {
    let current: HashSet<&str> = current.iter().map(String::as_str).collect();
    let declared: HashSet<&str> = declared.iter().map(String::as_str).collect();
    current == declared
}

/// Bring the engine's index in line with `declared`.
pub async fn reconcile_index(
    engine: &dyn SearchEngine,
    declared: &DeclaredAttributes,
) -> Result<ReconcileReport, SearchError> {
    let mut report = ReconcileReport::default();

    if !engine.index_exists().await? {
        info!(index = engine.index_name(), "Creating index");
        engine.create_index().await?;
        report.created = true;
    }

    let filterable = engine.filterable_attributes().await?;
    if !same_set(&filterable, &declared.filterable) {
        info!(
            current = ?filterable,
            declared = ?declared.filterable,
            "Updating filterable attributes"
        );
        engine.set_filterable_attributes(&declared.filterable).await?;
        report.filterable_updated = true;
    }

    let sortable = engine.sortable_attributes().await?;
    if !same_set(&sortable, &declared.sortable) {
        info!(
            current = ?sortable,
            declared = ?declared.sortable,
            "Updating sortable attributes"
        );
        engine.set_sortable_attributes(&declared.sortable).await?;
        report.sortable_updated = true;
    }

    Ok(report)
}
