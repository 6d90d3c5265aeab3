//! Make a hidden node visible by expanding exactly the collapsed ancestors that hide it.
//!
//! Revealing is split in two so a caller can confirm first and redraw between steps:
//! [`plan`] works out which ancestors are in the way, and a [`RevealSequence`] expands them
//! one at a time, outermost first.

use crate::{
    cluster::ClusterEngine,
    error::OrbitError,
    event::EventOrigin,
    persistence::PersistenceAdapter,
    properties::NodeId,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Why a node could not be revealed. Never fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum RevealFailure {
    #[error("node {0} is not in the graph")]
    UnknownNode(NodeId),
    #[error("node {0} is hidden but none of its ancestors is collapsed")]
    NoCollapsedAncestor(NodeId),
    #[error("could not walk the ancestors of {target}: {error}")]
    Structural { target: NodeId, error: OrbitError },
    #[error("expanding the ancestors of {0} was declined")]
    Declined(NodeId),
    #[error("reveal of {target} stopped with {} ancestors still collapsed", remaining.len())]
    Abandoned {
        target: NodeId,
        remaining: Vec<NodeId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RevealPlan {
    AlreadyVisible(NodeId),
    NeedsExpansion {
        target: NodeId,
        /// Root first.
        collapsed_ancestors: Vec<NodeId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RevealOutcome {
    Revealed {
        target: NodeId,
        /// Root first; empty when the target was already visible.
        expanded_ancestors: Vec<NodeId>,
    },
    NotRevealed {
        target: NodeId,
        reason: RevealFailure,
    },
}

impl RevealOutcome {
    pub fn is_revealed(&self) -> bool {
        matches!(self, RevealOutcome::Revealed { .. })
    }
}

pub fn plan<S: PersistenceAdapter>(
    engine: &ClusterEngine<S>,
    target: &NodeId,
) -> Result<RevealPlan, RevealFailure> {
    if !engine.graph().contains(target) {
        return Err(RevealFailure::UnknownNode(target.clone()));
    }
    if engine.is_visible(target) {
        return Ok(RevealPlan::AlreadyVisible(target.clone()));
    }
    let mut chain = engine
        .graph()
        .ancestors(target)
        .map_err(|error| RevealFailure::Structural {
            target: target.clone(),
            error,
        })?;
    chain.reverse();
    chain.retain(|id| engine.is_collapsed(id));
    if chain.is_empty() {
        tracing::warn!("[reveal] {target} is hidden without a collapsed ancestor");
        return Err(RevealFailure::NoCollapsedAncestor(target.clone()));
    }
    tracing::debug!("[reveal] {target} is behind {} collapsed ancestors", chain.len());
    Ok(RevealPlan::NeedsExpansion {
        target: target.clone(),
        collapsed_ancestors: chain,
    })
}

/// Sequential, root-to-leaf expansion of a planned ancestor chain. Dropping the sequence part
/// way through leaves the already expanded ancestors expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealSequence {
    target: NodeId,
    remaining: VecDeque<NodeId>,
    expanded: Vec<NodeId>,
}

impl RevealSequence {
    pub fn new(plan: RevealPlan) -> RevealSequence {
        match plan {
            RevealPlan::AlreadyVisible(target) => RevealSequence {
                target,
                remaining: VecDeque::new(),
                expanded: Vec::new(),
            },
            RevealPlan::NeedsExpansion {
                target,
                collapsed_ancestors,
            } => RevealSequence {
                target,
                remaining: collapsed_ancestors.into(),
                expanded: Vec::new(),
            },
        }
    }

    pub fn target(&self) -> &NodeId {
        &self.target
    }

    pub fn next_ancestor(&self) -> Option<&NodeId> {
        self.remaining.front()
    }

    pub fn is_done(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Expand the next ancestor. Returns it, or `None` once the chain is exhausted. An ancestor
    /// an earlier step already opened counts as expanded.
    pub async fn step<S: PersistenceAdapter>(
        &mut self,
        engine: &mut ClusterEngine<S>,
    ) -> Result<Option<NodeId>, OrbitError> {
        let Some(ancestor) = self.remaining.pop_front() else {
            return Ok(None);
        };
        engine.expand(&ancestor, EventOrigin::Local).await?;
        if !engine.is_collapsed(&ancestor) {
            self.expanded.push(ancestor.clone());
        }
        Ok(Some(ancestor))
    }

    pub fn finish<S: PersistenceAdapter>(self, engine: &ClusterEngine<S>) -> RevealOutcome {
        if !self.remaining.is_empty() {
            return RevealOutcome::NotRevealed {
                target: self.target.clone(),
                reason: RevealFailure::Abandoned {
                    target: self.target,
                    remaining: self.remaining.into(),
                },
            };
        }
        if !engine.is_visible(&self.target) {
            return RevealOutcome::NotRevealed {
                target: self.target.clone(),
                reason: RevealFailure::NoCollapsedAncestor(self.target),
            };
        }
        RevealOutcome::Revealed {
            target: self.target,
            expanded_ancestors: self.expanded,
        }
    }
}

/// Plan a reveal of `target` and ask `confirm` before anything is expanded.
///
/// `confirm` sees the collapsed ancestors (root first) and is not called when the target is
/// already visible. Returns the sequence to run, or the final outcome when there is nothing to
/// run.
pub fn prepare<S, F>(
    engine: &ClusterEngine<S>,
    target: &NodeId,
    confirm: F,
) -> Result<RevealSequence, RevealOutcome>
where
    S: PersistenceAdapter,
    F: FnOnce(&[NodeId]) -> bool,
{
    let plan = plan(engine, target).map_err(|reason| RevealOutcome::NotRevealed {
        target: target.clone(),
        reason,
    })?;
    if let RevealPlan::NeedsExpansion {
        collapsed_ancestors,
        ..
    } = &plan
    {
        if !confirm(collapsed_ancestors) {
            return Err(RevealOutcome::NotRevealed {
                target: target.clone(),
                reason: RevealFailure::Declined(target.clone()),
            });
        }
    }
    Ok(RevealSequence::new(plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        persistence::{MemoryStore, SessionMode},
        tests::helpers::{edge, id, leaf, memory_store, reveal_snapshot},
    };
    use test_log::test;

    async fn reveal<F>(
        engine: &mut ClusterEngine<MemoryStore>,
        target: &NodeId,
        confirm: F,
    ) -> RevealOutcome
    where
        F: FnOnce(&[NodeId]) -> bool,
    {
        let mut sequence = match prepare(engine, target, confirm) {
            Ok(sequence) => sequence,
            Err(outcome) => return outcome,
        };
        while sequence.step(engine).await.unwrap().is_some() {}
        sequence.finish(engine)
    }

    /// R and M both collapsed, M on its own before R.
    async fn collapsed_chain() -> ClusterEngine<MemoryStore> {
        let snapshot = reveal_snapshot();
        let store = memory_store(snapshot.clone());
        let (mut engine, _) =
            ClusterEngine::from_snapshot(store, SessionMode::Anonymous, snapshot)
                .await
                .unwrap();
        engine.collapse(&id("M"), EventOrigin::Local).await.unwrap();
        engine.collapse(&id("R"), EventOrigin::Local).await.unwrap();
        assert!(engine.is_collapsed(&id("M")));
        engine
    }

    #[test(tokio::test)]
    async fn test_reveal_expands_root_first() {
        let mut engine = collapsed_chain().await;
        let mut seen = Vec::new();
        let outcome = reveal(&mut engine, &id("T"), |chain| {
            seen = chain.to_vec();
            true
        })
        .await;
        assert_eq!(seen, vec![id("R"), id("M")]);
        assert_eq!(
            outcome,
            RevealOutcome::Revealed {
                target: id("T"),
                expanded_ancestors: vec![id("R"), id("M")],
            }
        );
        assert!(engine.is_visible(&id("T")));
    }

    #[test(tokio::test)]
    async fn test_partial_sequence_leaves_valid_state() {
        let mut engine = collapsed_chain().await;
        let plan = plan(&engine, &id("T")).unwrap();
        let mut sequence = RevealSequence::new(plan);
        assert_eq!(sequence.step(&mut engine).await.unwrap(), Some(id("R")));
        assert!(engine.is_visible(&id("M")));
        assert!(!engine.is_visible(&id("T")));

        let outcome = sequence.finish(&engine);
        assert!(matches!(
            outcome,
            RevealOutcome::NotRevealed {
                reason: RevealFailure::Abandoned { .. },
                ..
            }
        ));
    }

    #[test(tokio::test)]
    async fn test_visible_target_needs_no_confirmation() {
        let mut engine = collapsed_chain().await;
        let outcome = reveal(&mut engine, &id("R"), |_| panic!("not asked")).await;
        assert_eq!(
            outcome,
            RevealOutcome::Revealed {
                target: id("R"),
                expanded_ancestors: vec![],
            }
        );
    }

    #[test(tokio::test)]
    async fn test_failures() {
        let mut engine = collapsed_chain().await;
        assert_eq!(
            plan(&engine, &id("ghost")),
            Err(RevealFailure::UnknownNode(id("ghost")))
        );

        let outcome = reveal(&mut engine, &id("T"), |_| false).await;
        assert_eq!(
            outcome,
            RevealOutcome::NotRevealed {
                target: id("T"),
                reason: RevealFailure::Declined(id("T")),
            }
        );
        assert!(engine.is_collapsed(&id("R")));
        assert!(engine.is_collapsed(&id("M")));
    }

    #[test(tokio::test)]
    async fn test_only_collapsed_ancestors_are_planned() {
        let mut engine = collapsed_chain().await;
        let graph = engine.graph_mut();
        graph.add_node(leaf("X")).unwrap();
        graph.insert_edge(edge("T", "X")).unwrap();

        // R stays collapsed, M is expanded by hand: only R is in the way of X.
        engine.expand(&id("M"), EventOrigin::Local).await.unwrap();
        assert_eq!(
            plan(&engine, &id("X")),
            Ok(RevealPlan::NeedsExpansion {
                target: id("X"),
                collapsed_ancestors: vec![id("R")],
            })
        );
    }
}
