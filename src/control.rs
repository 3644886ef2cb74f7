//! Control-plane messages for live tree reconfiguration.
//!
//! A [`ControlMessage`] carries the recomputed tree plus one
//! [`ControlConfiguration`] per affected role. Each running node applies
//! its own instruction independently through the engine's
//! [`ConnectionPool`], disconnecting before reconnecting; tuples routed
//! through the edge during that brief window are dropped (at-most-once
//! for this stream).

use std::collections::BTreeMap;

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::rate::ScaleDirection;
use crate::tree::{MulticastGraph, NodePosition, TreeError};

/// Errors for control message handling and instruction application.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// An instruction references an unknown or inconsistent role. Fatal
    /// for the computation; the previous tree is retained.
    #[error("invalid instruction for role '{role}': {reason}")]
    InvalidInstruction {
        /// The role the instruction addressed.
        role: String,
        /// Description of the inconsistency.
        reason: String,
    },

    /// Wire (de)serialization failed.
    #[error("control message serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The embedded graph payload was invalid.
    #[error(transparent)]
    Graph(#[from] TreeError),
}

/// The engine-side connection pool a node uses to rewire itself.
///
/// `disconnect` tears down the node's current upstream link; `reconnect`
/// wires the node under `target`. Implementations report unknown roles as
/// [`ControlError::InvalidInstruction`].
pub trait ConnectionPool {
    /// Disconnects `role` from its current parent.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidInstruction`] if `role` is unknown
    /// or has no upstream link.
    fn disconnect(&mut self, role: &str) -> Result<(), ControlError>;

    /// Connects `role` under `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidInstruction`] if either role is
    /// unknown.
    fn reconnect(&mut self, role: &str, target: &str) -> Result<(), ControlError>;
}

/// Per-role reconfiguration instruction.
///
/// A role with only a `meta` change keeps its existing physical link.
/// `disconnect` and `reconnect` never name the same role: setting them
/// equal clears both, since tearing down a link only to rebuild it would
/// drop tuples for nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlConfiguration {
    /// Former parent to disconnect from.
    pub disconnect: Option<String>,
    /// New parent to reconnect under.
    pub reconnect: Option<String>,
    /// New `(id, layer, index)` position, when it changed.
    pub meta: Option<NodePosition>,
}

impl ControlConfiguration {
    /// Builds an instruction for a parent change, auto-clearing the pair
    /// when old and new parent are the same role.
    #[must_use]
    pub fn rewire(old_parent: impl Into<String>, new_parent: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.set_rewire(old_parent.into(), new_parent.into());
        config
    }

    /// Sets the disconnect/reconnect pair, clearing both when equal.
    pub fn set_rewire(&mut self, old_parent: String, new_parent: String) {
        if old_parent == new_parent {
            self.disconnect = None;
            self.reconnect = None;
        } else {
            self.disconnect = Some(old_parent);
            self.reconnect = Some(new_parent);
        }
    }

    /// Attaches a position change.
    #[must_use]
    pub fn with_meta(mut self, meta: NodePosition) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Returns whether the instruction changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.disconnect.is_none() && self.reconnect.is_none() && self.meta.is_none()
    }

    /// Returns whether the physical link is kept (meta-only change).
    #[must_use]
    pub fn keeps_link(&self) -> bool {
        self.disconnect.is_none() && self.reconnect.is_none()
    }

    /// Applies this instruction for `role` against the connection pool,
    /// disconnecting before reconnecting. Position metadata is the node's
    /// own bookkeeping and involves no pool call.
    ///
    /// # Errors
    ///
    /// Propagates [`ControlError::InvalidInstruction`] from the pool.
    pub fn apply<P: ConnectionPool>(&self, role: &str, pool: &mut P) -> Result<(), ControlError> {
        if self.disconnect.is_some() {
            pool.disconnect(role)?;
        }
        if let Some(target) = &self.reconnect {
            pool.reconnect(role, target)?;
        }
        Ok(())
    }
}

/// The payload broadcast to running nodes after a reconfiguration.
#[derive(Debug, Clone)]
pub struct ControlMessage {
    /// The recomputed tree.
    pub graph: MulticastGraph,
    /// Direction of the scale decision that produced this message.
    pub direction: ScaleDirection,
    /// Instructions, keyed by role. Roles whose parent and position are
    /// unchanged have no entry.
    pub changes: FxHashMap<String, ControlConfiguration>,
}

impl ControlMessage {
    /// Creates a message.
    #[must_use]
    pub fn new(
        graph: MulticastGraph,
        direction: ScaleDirection,
        changes: FxHashMap<String, ControlConfiguration>,
    ) -> Self {
        Self {
            graph,
            direction,
            changes,
        }
    }

    /// Creates a message that changes nothing.
    #[must_use]
    pub fn noop(graph: MulticastGraph) -> Self {
        Self::new(graph, ScaleDirection::None, FxHashMap::default())
    }

    /// Returns whether this message carries no instructions.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the instruction for a role, if it has one.
    #[must_use]
    pub fn instruction_for(&self, role: &str) -> Option<&ControlConfiguration> {
        self.changes.get(role)
    }

    /// Applies the instruction for `role`, if any, against the pool.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidInstruction`] if `role` is not part
    /// of the tree, or propagates pool failures.
    pub fn apply_for<P: ConnectionPool>(
        &self,
        role: &str,
        pool: &mut P,
    ) -> Result<(), ControlError> {
        if self.graph.vertex(role).is_none() {
            return Err(ControlError::InvalidInstruction {
                role: role.to_string(),
                reason: "role is not part of the tree".to_string(),
            });
        }
        match self.changes.get(role) {
            Some(config) => config.apply(role, pool),
            None => Ok(()),
        }
    }

    /// Checks that every instruction references roles present in the tree.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidInstruction`] for the first
    /// inconsistent entry.
    pub fn validate(&self) -> Result<(), ControlError> {
        for (role, config) in &self.changes {
            let invalid = |reason: String| ControlError::InvalidInstruction {
                role: role.clone(),
                reason,
            };
            if self.graph.vertex(role).is_none() {
                return Err(invalid("role is not part of the tree".to_string()));
            }
            for referenced in [&config.disconnect, &config.reconnect]
                .into_iter()
                .flatten()
            {
                if self.graph.vertex(referenced).is_none() {
                    return Err(invalid(format!(
                        "instruction references unknown role '{referenced}'"
                    )));
                }
            }
            if config.disconnect.is_some() && config.disconnect == config.reconnect {
                return Err(invalid(
                    "disconnect and reconnect name the same role".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Serializes the message into its wire JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Serialization`] or a graph serialization
    /// failure.
    pub fn to_json(&self) -> Result<String, ControlError> {
        let graph: serde_json::Value = serde_json::from_str(&self.graph.to_json()?)?;
        let control_configuration: BTreeMap<String, WireInstruction> = self
            .changes
            .iter()
            .map(|(role, config)| (role.clone(), WireInstruction::from(config)))
            .collect();
        let wire = WireControlMessage {
            graph,
            current_status: match self.direction {
                ScaleDirection::None => None,
                direction => Some(direction),
            },
            control_configuration,
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Deserializes and validates a message from its wire JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Serialization`] on parse failure, a
    /// [`TreeError`] for a malformed embedded graph, or
    /// [`ControlError::InvalidInstruction`] for inconsistent entries.
    /// Callers keep their previous tree on any failure.
    pub fn from_json(text: &str) -> Result<Self, ControlError> {
        let wire: WireControlMessage = serde_json::from_str(text)?;
        let graph = MulticastGraph::from_json(&serde_json::to_string(&wire.graph)?)?;
        let mut changes = FxHashMap::default();
        for (role, instruction) in wire.control_configuration {
            let config = instruction.into_config(&role)?;
            changes.insert(role, config);
        }
        let message = Self {
            graph,
            direction: wire.current_status.unwrap_or(ScaleDirection::None),
            changes,
        };
        message.validate()?;
        Ok(message)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireControlMessage {
    graph: serde_json::Value,
    current_status: Option<ScaleDirection>,
    control_configuration: BTreeMap<String, WireInstruction>,
}

#[derive(Serialize, Deserialize)]
struct WireInstruction {
    #[serde(skip_serializing_if = "Option::is_none")]
    disconnect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reconnect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    layer: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<u32>,
}

impl From<&ControlConfiguration> for WireInstruction {
    fn from(config: &ControlConfiguration) -> Self {
        Self {
            disconnect: config.disconnect.clone(),
            reconnect: config.reconnect.clone(),
            id: config.meta.map(|m| m.id),
            layer: config.meta.map(|m| m.layer),
            index: config.meta.map(|m| m.index),
        }
    }
}

impl WireInstruction {
    fn into_config(self, role: &str) -> Result<ControlConfiguration, ControlError> {
        let meta = match (self.id, self.layer, self.index) {
            (Some(id), Some(layer), Some(index)) => Some(NodePosition { id, layer, index }),
            (None, None, None) => None,
            _ => {
                return Err(ControlError::InvalidInstruction {
                    role: role.to_string(),
                    reason: "partial position metadata (id, layer, index must all be set)"
                        .to_string(),
                })
            }
        };
        Ok(ControlConfiguration {
            disconnect: self.disconnect,
            reconnect: self.reconnect,
            meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeBuilder;

    /// Records pool calls in order.
    #[derive(Default)]
    struct RecordingPool {
        calls: Vec<String>,
    }

    impl ConnectionPool for RecordingPool {
        fn disconnect(&mut self, role: &str) -> Result<(), ControlError> {
            self.calls.push(format!("disconnect {role}"));
            Ok(())
        }

        fn reconnect(&mut self, role: &str, target: &str) -> Result<(), ControlError> {
            self.calls.push(format!("reconnect {role} {target}"));
            Ok(())
        }
    }

    fn chain_graph() -> MulticastGraph {
        TreeBuilder::new("root")
            .build_balanced_partial_tree(9, 3, 1, |p| Ok(format!("n{}", p.id)))
            .unwrap()
    }

    #[test]
    fn test_rewire_auto_clears_same_parent() {
        let config = ControlConfiguration::rewire("p", "p");
        assert!(config.keeps_link());
        assert!(config.is_empty());

        let config = ControlConfiguration::rewire("p", "q");
        assert_eq!(config.disconnect.as_deref(), Some("p"));
        assert_eq!(config.reconnect.as_deref(), Some("q"));
    }

    #[test]
    fn test_apply_disconnects_before_reconnecting() {
        let config = ControlConfiguration::rewire("old", "new");
        let mut pool = RecordingPool::default();
        config.apply("n2", &mut pool).unwrap();
        assert_eq!(
            pool.calls,
            vec!["disconnect n2".to_string(), "reconnect n2 new".to_string()]
        );
    }

    #[test]
    fn test_meta_only_instruction_keeps_link() {
        let config = ControlConfiguration::default().with_meta(NodePosition {
            id: 2,
            layer: 1,
            index: 1,
        });
        assert!(config.keeps_link());
        let mut pool = RecordingPool::default();
        config.apply("n2", &mut pool).unwrap();
        assert!(pool.calls.is_empty());
    }

    #[test]
    fn test_apply_for_unknown_role() {
        let message = ControlMessage::noop(chain_graph());
        let mut pool = RecordingPool::default();
        let result = message.apply_for("ghost", &mut pool);
        assert!(matches!(
            result,
            Err(ControlError::InvalidInstruction { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_reference() {
        let mut changes = FxHashMap::default();
        changes.insert("n2".to_string(), ControlConfiguration::rewire("ghost", "n1"));
        let message = ControlMessage::new(chain_graph(), ScaleDirection::Down, changes);
        assert!(matches!(
            message.validate(),
            Err(ControlError::InvalidInstruction { .. })
        ));
    }

    #[test]
    fn test_message_round_trip() {
        let mut changes = FxHashMap::default();
        changes.insert(
            "n3".to_string(),
            ControlConfiguration::rewire("n2", "n1").with_meta(NodePosition {
                id: 3,
                layer: 2,
                index: 1,
            }),
        );
        let message = ControlMessage::new(chain_graph(), ScaleDirection::Up, changes);
        let json = message.to_json().unwrap();
        let decoded = ControlMessage::from_json(&json).unwrap();
        assert_eq!(decoded.direction, ScaleDirection::Up);
        assert_eq!(decoded.changes.len(), 1);
        assert_eq!(decoded.changes["n3"], message.changes["n3"]);
        assert_eq!(decoded.graph.vertex_count(), 4);
    }

    #[test]
    fn test_noop_status_is_null_on_wire() {
        let message = ControlMessage::noop(chain_graph());
        let json = message.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["currentStatus"].is_null());
    }
}
