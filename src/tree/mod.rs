//! # Multicast Tree Construction and Reconfiguration
//!
//! The dissemination tree for a single high-volume stream: one root
//! forwards to a bounded number of children, which forward onward until
//! every replica role is covered.
//!
//! ## Overview
//!
//! - **[`MulticastGraph`]**: the layer-indexed tree, with a JSON wire form
//! - **[`TreeBuilder`]**: breadth-first construction under a degree bound,
//!   with [`TreeShape`] variants built on the same attach primitive
//! - **[`reconfigure`]** / [`scale_down`] / [`scale_up`]: pure functions
//!   recomputing the tree for a new degree bound with minimal rewiring
//!
//! ## Key Design Principles
//!
//! 1. **Roles never change** — reconfiguration moves wiring and positions,
//!    never the logical role set baked into the engine's topology.
//! 2. **Pure reconfiguration** — a new graph is computed from the old one;
//!    nothing is mutated in place, so every pass is directly testable.
//! 3. **Minimal instructions** — the emitted change map names exactly the
//!    roles whose parent or position moved.
//!
//! ## Example
//!
//! ```rust,ignore
//! use streamcast::tree::{reconfigure, TreeBuilder, TreeShape};
//!
//! let builder = TreeBuilder::new("source");
//! let graph = builder.build_tree(TreeShape::Bounded, 9, 3, 2, |p| {
//!     Ok(format!("fwd{}", p.id))
//! })?;
//!
//! let message = reconfigure(&graph, 2, 1)?;
//! assert!(message.changes.values().all(|c| !c.is_empty()));
//! ```

pub mod builder;
pub mod error;
pub mod graph;
pub mod reconfigure;


// Re-export key types
pub use builder::{FactoryResult, TreeBuilder, TreeShape};
pub use error::TreeError;
pub use graph::{MulticastGraph, NodeHandle, NodePosition, TreeVertex, HANDLE_SEPARATOR};
pub use reconfigure::{reconfigure, scale_down, scale_up};
