//! Error types for multicast tree operations.

use super::graph::NodePosition;

/// Errors that can occur during tree construction and reconfiguration.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A graph wire payload is structurally invalid.
    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    /// A vertex with the same role already exists.
    #[error("duplicate role: {0}")]
    DuplicateRole(String),

    /// An operation references a role that does not exist.
    #[error("role not found: {0}")]
    RoleNotFound(String),

    /// A role name contains the wire separator character.
    #[error("invalid role name (must not contain '-'): {0}")]
    InvalidRoleName(String),

    /// An edge would give a vertex a second parent or form a cycle.
    #[error("invalid edge from {from} to {target}: {reason}")]
    InvalidEdge {
        /// Parent role of the rejected edge.
        from: String,
        /// Child role of the rejected edge.
        target: String,
        /// Description of the violation.
        reason: String,
    },

    /// No tree has been built or imported yet.
    #[error("no multicast tree has been built or imported")]
    NoTree,

    /// A construction parameter violates its precondition.
    #[error("invalid parameter {name}: {value} (must be >= 1)")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: i64,
    },

    /// The caller-supplied replica factory failed.
    ///
    /// Construction fails as a whole; a partially built tree is never
    /// returned.
    #[error("replica creation failed at {position}: {reason}")]
    NodeCreation {
        /// Position the failed replica would have occupied.
        position: NodePosition,
        /// Factory-supplied failure description.
        reason: String,
    },
}
