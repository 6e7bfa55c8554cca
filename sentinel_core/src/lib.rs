//! # Sentinel Core
//!
//! Binds worker entities to anchor blocks and logs who comes near them.
//! This crate consumes the vocabulary of `sentinel_rules` and exposes a
//! single facade, [`Sentinel`], which the host engine drives with its block
//! and actor notifications.
//!
//! ## Core Components
//!
//! - **registry**: anchor/worker bindings, companion markers, grace tokens and logs
//! - **monitor**: edge-triggered proximity detection and interaction logging
//! - **persistence**: the durable snapshot of anchor positions
//! - **reconcile**: respawning workers for persisted anchors after a restart
//! - **events**: outcome types returned to the host
//!
//! ## Design Philosophy
//!
//! - **Event-Driven**: the tracker reacts to host notifications and never owns the game loop
//! - **Host-Agnostic**: spawns and despawns go through [`WorkerHost`] or are returned as outcomes
//! - **Per-Key Concurrency**: state is sharded by position so unrelated anchors never contend

pub mod error;
pub mod events;
pub mod host;
pub mod monitor;
pub mod persistence;
pub mod reconcile;
pub mod registry;
pub mod sentinel;

pub use error::{Result, SentinelError};
pub use events::*;
pub use host::WorkerHost;
pub use monitor::ProximityMonitor;
pub use persistence::PersistenceBridge;
pub use reconcile::Reconciler;
pub use registry::*;
pub use sentinel::Sentinel;
