//! # orbit-core
//!
//! The hierarchical collapse/expand engine behind a visual knowledge-graph editor, with
//! collapsed-state reconciliation between a local cache and a remote store.
//!
//! ## Overview
//!
//! Users build a tree of topics, links and notes. Any parent can be folded into a single
//! "cluster" node standing in for its whole subtree. orbit-core keeps track of which parents
//! are folded, derives the graph a renderer should draw, persists the folded state, and keeps it
//! converged with a remote store another device may be writing to.
//!
//! ### Key Features
//!
//! - **Recursive collapse, shallow expand**: collapsing a parent folds every parent below it;
//!   expanding only opens one level, so nested state is remembered
//! - **Pure projection**: the visible graph is a function of the full graph and the
//!   collapsed-set, re-derivable at any time
//! - **Reconciliation**: the remote store's per-node flags win, except right after a local edit
//! - **Reveal**: expand exactly the collapsed ancestors hiding a node, outermost first
//! - **Pluggable persistence**: a JSON snapshot file, an in-memory store, and (with `service`)
//!   an SQLite store
//!
//! ## Architecture
//!
//! - **[`graph`]**: [`graph::GraphStore`], [`graph::CollapsedSet`] and the [`graph::view`]
//!   projector
//! - **[`cluster`]**: [`cluster::ClusterEngine`], the only writer of the collapsed-set
//! - **[`sync`]**: [`sync::SyncReconciler`]
//! - **[`reveal`]**: reveal planning and stepwise execution
//! - **[`persistence`]**: the [`persistence::PersistenceAdapter`] trait and its stores
//! - **[`session`]**: [`session::Session`], tying the above to a renderer's events
//! - **[`commands`]**: the [`commands::Op`] command set a host can drive a session with
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orbit_core::{
//!     config::OrbitConfig,
//!     persistence::{LocalStore, SessionMode},
//!     session::Session,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OrbitConfig::default();
//!     let store = LocalStore::new(&config.snapshot_path);
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let (mut session, _diagnostics) =
//!         Session::load(store, SessionMode::Anonymous, &config, Some(tx)).await?;
//!
//!     let root = session.search_index()[0].id.clone();
//!     session.toggle(&root).await?;
//!
//!     while let Ok(event) = rx.try_recv() {
//!         println!("{event}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **default**: engine, JSON snapshot store, in-memory store
//! - **service**: SQLite store (`sqlx`), [`db`] module
//! - **bin**: the `orbit` command line tool

pub mod cluster;
pub mod commands;
pub mod config;
#[cfg(all(feature = "service", not(target_arch = "wasm32")))]
pub mod db;
pub mod error;
pub mod event;
pub mod graph;
pub mod persistence;
pub mod properties;
pub mod reveal;
pub mod session;
pub mod sync;
#[cfg(test)]
mod tests;

pub use error::*;
