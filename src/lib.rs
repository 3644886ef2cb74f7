//! # Streamcast
//!
//! Degree-bounded multicast tree construction and online reconfiguration
//! for high-volume stream dissemination.
//!
//! This crate is the control-plane core for fanning a single tuple stream
//! out from one source to many downstream replicas through a tree of
//! forwarding nodes, while keeping every link's fan-out below a bound
//! derived from observed load:
//!
//! - **Tree construction**: [`tree::TreeBuilder`] builds a balanced partial
//!   tree under a fan-out bound and splits requested parallelism evenly
//!   across tree positions.
//! - **Rate control**: [`rate::RateController`] derives a safe degree bound
//!   from input rate and queue capacity, and reads queue-length trend to
//!   decide when to rebalance.
//! - **Reconfiguration**: [`tree::reconfigure`] recomputes the tree under a
//!   new bound while preserving as much existing wiring as possible and
//!   emits a minimal per-role instruction set.
//! - **Control messages**: [`control::ControlMessage`] carries the new tree
//!   plus reconnect instructions to running nodes.
//!
//! ## Design Principles
//!
//! 1. **Pure control plane** — construction and reconfiguration are
//!    synchronous, deterministic computations with no I/O; they never run
//!    on the tuple data path.
//! 2. **Roles are stable** — reconfiguration rewires physical links but
//!    never creates or destroys logical roles.
//! 3. **Minimal disruption** — only roles whose parent or position changed
//!    receive an instruction.
//! 4. **No hidden globals** — partition bookkeeping lives in an explicit
//!    [`registry::PartitionRegistry`] passed by reference.
//!
//! ## Example
//!
//! ```rust,ignore
//! use streamcast::{MulticastConfig, MulticastController};
//! use streamcast::tree::TreeShape;
//!
//! let config = MulticastConfig::default();
//! let mut controller = MulticastController::new(config);
//!
//! controller.build_tree(TreeShape::Bounded, "source", 9, 3, 2, factory)?;
//! let message = controller.reconfigure_to(1)?;
//! ```

#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod control;
pub mod controller;
pub mod rate;
pub mod registry;
pub mod tree;

// Re-export key types
pub use config::MulticastConfig;
pub use controller::MulticastController;
pub use rate::ScaleDirection;

/// Result type for streamcast operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for streamcast.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Tree construction or reconfiguration errors.
    #[error("Tree error: {0}")]
    Tree(#[from] tree::TreeError),

    /// Control message and instruction errors.
    #[error("Control error: {0}")]
    Control(#[from] control::ControlError),

    /// Rate controller errors.
    #[error("Rate error: {0}")]
    Rate(#[from] rate::RateError),
}
