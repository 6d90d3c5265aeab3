//! Converges the in-memory collapsed-set toward the remote store's per-node flags.
//!
//! The remote store is authoritative, with one exception: for a short window after a local
//! collapse/expand the reconciler does nothing at all, so an edit that has not yet been durably
//! written cannot be clobbered by a stale read. Two sessions editing inside the same window can
//! still race; the last write to reach the store wins.

use crate::{
    cluster::ClusterEngine,
    config::DEFAULT_DEBOUNCE_MS,
    error::OrbitError,
    event::EventOrigin,
    persistence::{PersistenceAdapter, SessionMode},
    properties::NodeId,
};
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Ids collapsed to match the remote store, in application order (including descendants
    /// collapsed along with them).
    pub collapsed: Vec<NodeId>,
    /// Ids expanded to match the remote store, root to leaf.
    pub expanded: Vec<NodeId>,
    /// Ids left alone because a local write for them is still owed to the store.
    pub skipped_pending: Vec<NodeId>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.collapsed.is_empty() && self.expanded.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReconcileOutcome {
    Applied(ReconcileReport),
    /// A local change is younger than the debounce window.
    Debounced { remaining: Duration },
    /// Anonymous sessions have no remote store to reconcile with.
    LocalOnly,
    /// The remote flags could not be fetched. Retried on the next trigger.
    Unavailable(OrbitError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReconciler {
    debounce: Duration,
}

impl Default for SyncReconciler {
    fn default() -> Self {
        SyncReconciler::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }
}

impl SyncReconciler {
    pub fn new(debounce: Duration) -> SyncReconciler {
        SyncReconciler { debounce }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub async fn reconcile<S: PersistenceAdapter>(
        &self,
        engine: &mut ClusterEngine<S>,
    ) -> Result<ReconcileOutcome, OrbitError> {
        self.reconcile_at(engine, Instant::now()).await
    }

    /// Run one reconciliation pass as of `now`.
    ///
    /// Only structural failures of the local graph are returned as errors; an unreachable
    /// store is reported through [`ReconcileOutcome::Unavailable`].
    #[tracing::instrument(skip_all)]
    pub async fn reconcile_at<S: PersistenceAdapter>(
        &self,
        engine: &mut ClusterEngine<S>,
        now: Instant,
    ) -> Result<ReconcileOutcome, OrbitError> {
        if engine.mode() == SessionMode::Anonymous {
            return Ok(ReconcileOutcome::LocalOnly);
        }
        if let Some(last) = engine.last_local_change() {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.debounce {
                let remaining = self.debounce - elapsed;
                tracing::debug!("[reconcile] local change {elapsed:?} ago, skipping");
                return Ok(ReconcileOutcome::Debounced { remaining });
            }
        }

        let pending = engine.flush_pending().await;

        let remote = match engine.store().load_collapsed_flags().await {
            Ok(flags) => flags,
            Err(e) => {
                tracing::warn!("[reconcile] remote flags unavailable: {e}");
                return Ok(ReconcileOutcome::Unavailable(e));
            }
        };

        let mut report = ReconcileReport {
            skipped_pending: pending.iter().cloned().collect(),
            ..Default::default()
        };

        let to_collapse = remote
            .iter()
            .filter(|(id, is_collapsed)| {
                **is_collapsed
                    && !pending.contains(*id)
                    && engine.graph().contains(id)
                    && !engine.is_collapsed(id)
            })
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();
        for id in engine.bottom_up_order(&to_collapse)? {
            report
                .collapsed
                .extend(engine.collapse(&id, EventOrigin::Remote).await?);
        }

        // Re-read membership after the collapses: they may have pulled in descendants the
        // remote store has expanded.
        let mut to_expand = Vec::new();
        for (id, is_collapsed) in remote.iter() {
            if !*is_collapsed && !pending.contains(id) && engine.is_collapsed(id) {
                to_expand.push((engine.graph().depth(id)?, id.clone()));
            }
        }
        to_expand.sort();
        for (_, id) in to_expand {
            if engine.expand(&id, EventOrigin::Remote).await? {
                report.expanded.push(id);
            }
        }

        if !report.is_empty() {
            tracing::info!(
                "[reconcile] applied {} collapses, {} expands from remote",
                report.collapsed.len(),
                report.expanded.len()
            );
        }
        Ok(ReconcileOutcome::Applied(report))
    }
}
