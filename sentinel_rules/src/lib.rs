//! # Sentinel Rules
//!
//! World vocabulary shared by the tracker and its host: block positions,
//! entity and actor handles, marker classification and configuration.
//! This crate holds no shared mutable state.

pub mod config;
pub mod entities;
pub mod error;
pub mod mechanics;
pub mod world;

pub use config::*;
pub use entities::*;
pub use error::{Result, RulesError};
pub use mechanics::*;
pub use world::*;
