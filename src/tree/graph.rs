//! Multicast tree data structure and its JSON wire form.
//!
//! [`MulticastGraph`] is a purpose-built, layer-indexed adjacency structure:
//! it exposes only the operations the tree builder and reconfiguration
//! engine need, instead of leaning on a general-purpose graph library.
//! Identity is split into a stable `role` (survives reconfiguration) and a
//! [`NodePosition`] (may change when the tree is rebalanced).

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::error::TreeError;

/// Separator used by the canonical wire encoding of a node handle.
///
/// Role names must not contain this character; [`MulticastGraph::add_vertex`]
/// rejects them so a wire identifier always decodes unambiguously.
pub const HANDLE_SEPARATOR: char = '-';

/// Breadth-first position of a node within the tree.
///
/// `id` is the breadth-first creation sequence number (root = 0), `layer`
/// the BFS depth from the root, and `index` the position within its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePosition {
    /// Breadth-first sequence number.
    pub id: u32,
    /// BFS depth from the root (root = layer 0).
    pub layer: u32,
    /// Position within the layer.
    pub index: u32,
}

impl NodePosition {
    /// Position of the tree root.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            id: 0,
            layer: 0,
            index: 0,
        }
    }
}

impl fmt::Display for NodePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={} layer={} index={}",
            self.id, self.layer, self.index
        )
    }
}

/// A role paired with its current tree position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    /// Stable logical identity of the tree position.
    pub role: String,
    /// Current breadth-first position.
    pub position: NodePosition,
}

impl NodeHandle {
    /// Encodes the handle into its canonical wire form
    /// `role-id-layer-index`.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            self.role,
            self.position.id,
            self.position.layer,
            self.position.index,
            sep = HANDLE_SEPARATOR,
        )
    }

    /// Decodes a canonical wire identifier back into a handle.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::MalformedGraph`] if the identifier does not
    /// have exactly four `-`-separated fields or the numeric fields do not
    /// parse.
    pub fn decode(encoded: &str) -> Result<Self, TreeError> {
        let mut fields = encoded.rsplitn(4, HANDLE_SEPARATOR);
        let (index, layer, id, role) = match (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) {
            (Some(index), Some(layer), Some(id), Some(role)) => (index, layer, id, role),
            _ => {
                return Err(TreeError::MalformedGraph(format!(
                    "node identifier '{encoded}' is not of the form role-id-layer-index"
                )))
            }
        };
        if role.is_empty() || role.contains(HANDLE_SEPARATOR) {
            return Err(TreeError::MalformedGraph(format!(
                "node identifier '{encoded}' has an invalid role field"
            )));
        }
        let parse = |name: &str, value: &str| {
            value.parse::<u32>().map_err(|_| {
                TreeError::MalformedGraph(format!(
                    "node identifier '{encoded}' has a non-numeric {name} field"
                ))
            })
        };
        Ok(Self {
            role: role.to_string(),
            position: NodePosition {
                id: parse("id", id)?,
                layer: parse("layer", layer)?,
                index: parse("index", index)?,
            },
        })
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// A vertex of the multicast tree.
#[derive(Debug, Clone)]
pub struct TreeVertex {
    /// Stable logical identity.
    pub role: String,
    /// Current breadth-first position.
    pub position: NodePosition,
    /// Number of downstream replicas this tree position serves.
    pub parallelism: u32,
    /// Parent role (`None` only for the root).
    pub parent: Option<String>,
    /// Child roles in attachment order. `SmallVec` avoids heap alloc for
    /// the common small fan-out.
    children: SmallVec<[String; 4]>,
}

impl TreeVertex {
    /// Returns a handle combining role and position.
    #[must_use]
    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            role: self.role.clone(),
            position: self.position,
        }
    }

    /// Returns this vertex's children in attachment order.
    #[must_use]
    pub fn children(&self) -> &[String] {
        &self.children
    }
}

/// The multicast dissemination tree.
///
/// A single-rooted, layer-indexed tree keyed by role. Children are kept in
/// attachment order; that order is what the reconfiguration engine's
/// "first `new_degree` children survive" rule refers to.
#[derive(Clone)]
pub struct MulticastGraph {
    /// All vertices, keyed by role.
    vertices: FxHashMap<String, TreeVertex>,
    /// Ordered roles per layer; index 0 holds only the root.
    layer_elements: Vec<Vec<String>>,
    /// Maximum out-degree the tree was built for.
    max_degree: usize,
    /// Root role.
    root: String,
}

impl fmt::Debug for MulticastGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MulticastGraph")
            .field("root", &self.root)
            .field("vertex_count", &self.vertices.len())
            .field("layer_count", &self.layer_elements.len())
            .field("max_degree", &self.max_degree)
            .finish_non_exhaustive()
    }
}

impl MulticastGraph {
    /// Creates a tree containing only the root.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidRoleName`] if the root role contains the
    /// wire separator.
    pub fn new(root_role: impl Into<String>, max_degree: usize) -> Result<Self, TreeError> {
        let root = root_role.into();
        check_role_name(&root)?;
        let mut vertices = FxHashMap::default();
        vertices.insert(
            root.clone(),
            TreeVertex {
                role: root.clone(),
                position: NodePosition::root(),
                parallelism: 0,
                parent: None,
                children: SmallVec::new(),
            },
        );
        Ok(Self {
            vertices,
            layer_elements: vec![vec![root.clone()]],
            max_degree,
            root,
        })
    }

    /// Adds a non-root vertex at the given position.
    ///
    /// The vertex starts unattached; wire it with [`add_edge`](Self::add_edge).
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidRoleName`] if the role contains the wire
    /// separator, [`TreeError::DuplicateRole`] if the role already exists,
    /// or [`TreeError::MalformedGraph`] if the position targets layer 0.
    pub fn add_vertex(
        &mut self,
        role: impl Into<String>,
        position: NodePosition,
        parallelism: u32,
    ) -> Result<(), TreeError> {
        let role = role.into();
        check_role_name(&role)?;
        if self.vertices.contains_key(&role) {
            return Err(TreeError::DuplicateRole(role));
        }
        if position.layer == 0 {
            return Err(TreeError::MalformedGraph(format!(
                "vertex '{role}' placed at layer 0, which is reserved for the root"
            )));
        }
        let layer = position.layer as usize;
        if self.layer_elements.len() <= layer {
            self.layer_elements.resize(layer + 1, Vec::new());
        }
        self.layer_elements[layer].push(role.clone());
        self.vertices.insert(
            role.clone(),
            TreeVertex {
                role,
                position,
                parallelism,
                parent: None,
                children: SmallVec::new(),
            },
        );
        Ok(())
    }

    /// Adds a parent → child edge.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::RoleNotFound`] if either role is missing, or
    /// [`TreeError::InvalidEdge`] if the child already has a parent, the
    /// child is the root, or the edge does not go to a strictly deeper
    /// layer (which also rules out cycles).
    pub fn add_edge(&mut self, parent: &str, child: &str) -> Result<(), TreeError> {
        let parent_layer = self
            .vertices
            .get(parent)
            .ok_or_else(|| TreeError::RoleNotFound(parent.to_string()))?
            .position
            .layer;
        let child_vertex = self
            .vertices
            .get(child)
            .ok_or_else(|| TreeError::RoleNotFound(child.to_string()))?;
        let invalid = |reason: &str| TreeError::InvalidEdge {
            from: parent.to_string(),
            target: child.to_string(),
            reason: reason.to_string(),
        };
        if child == self.root {
            return Err(invalid("root cannot have a parent"));
        }
        if child_vertex.parent.is_some() {
            return Err(invalid("child already has a parent"));
        }
        if child_vertex.position.layer <= parent_layer {
            return Err(invalid("edges must go to a strictly deeper layer"));
        }
        if let Some(v) = self.vertices.get_mut(child) {
            v.parent = Some(parent.to_string());
        }
        if let Some(v) = self.vertices.get_mut(parent) {
            v.children.push(child.to_string());
        }
        Ok(())
    }

    // ---- Accessors ----

    /// Returns the root role.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns the degree bound the tree was built for.
    #[must_use]
    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    /// Returns the total vertex count, root included.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns a vertex by role.
    #[must_use]
    pub fn vertex(&self, role: &str) -> Option<&TreeVertex> {
        self.vertices.get(role)
    }

    /// Returns the number of outgoing edges of a role (0 if unknown).
    #[inline]
    #[must_use]
    pub fn out_degree(&self, role: &str) -> usize {
        self.vertices.get(role).map_or(0, |v| v.children.len())
    }

    /// Returns a role's children in attachment order.
    #[must_use]
    pub fn children_of(&self, role: &str) -> &[String] {
        self.vertices.get(role).map_or(&[], |v| v.children.as_slice())
    }

    /// Returns a role's parent, if any.
    #[must_use]
    pub fn parent_of(&self, role: &str) -> Option<&str> {
        self.vertices.get(role)?.parent.as_deref()
    }

    /// Returns a role's current position.
    #[must_use]
    pub fn position_of(&self, role: &str) -> Option<NodePosition> {
        self.vertices.get(role).map(|v| v.position)
    }

    /// Returns a role's BFS depth from the root.
    #[must_use]
    pub fn layer_of(&self, role: &str) -> Option<u32> {
        self.vertices.get(role).map(|v| v.position.layer)
    }

    /// Returns the ordered roles at the given layer.
    #[must_use]
    pub fn elements_at_layer(&self, layer: u32) -> &[String] {
        self.layer_elements
            .get(layer as usize)
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the number of layers (root layer included).
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layer_elements.len()
    }

    /// Iterates over all vertices in unspecified order.
    pub fn vertices(&self) -> impl Iterator<Item = &TreeVertex> {
        self.vertices.values()
    }

    /// Returns all roles in breadth-first order, following attachment order
    /// within each vertex's child list.
    #[must_use]
    pub fn bfs_order(&self) -> Vec<String> {
        let mut order = Vec::with_capacity(self.vertices.len());
        let mut queue = VecDeque::from([self.root.clone()]);
        while let Some(role) = queue.pop_front() {
            for child in self.children_of(&role) {
                queue.push_back(child.clone());
            }
            order.push(role);
        }
        order
    }

    // ---- Wire format ----

    /// Serializes the tree into its JSON wire envelope.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::MalformedGraph`] if serialization fails
    /// (practically unreachable for an in-memory tree).
    pub fn to_json(&self) -> Result<String, TreeError> {
        let mut nodes: Vec<WireNode> = self
            .vertices
            .values()
            .map(|v| WireNode {
                id: v.handle().encode(),
                parallelism: v.parallelism,
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges = Vec::new();
        for role in self.bfs_order() {
            let parent = &self.vertices[&role];
            for child in parent.children() {
                edges.push(WireEdge {
                    id: format!("e{}", edges.len()),
                    source: parent.handle().encode(),
                    target: self.vertices[child].handle().encode(),
                });
            }
        }

        let layer_element_map: BTreeMap<u32, Vec<String>> = self
            .layer_elements
            .iter()
            .enumerate()
            .map(|(layer, roles)| (u32::try_from(layer).unwrap_or(u32::MAX), roles.clone()))
            .collect();

        let wire = WireGraph {
            graph: WireEnvelope {
                creator: WIRE_CREATOR.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                nodes,
                edges,
            },
            max_degree: self.max_degree as u64,
            layer_element_map,
        };
        serde_json::to_string(&wire).map_err(|e| TreeError::MalformedGraph(e.to_string()))
    }

    /// Deserializes a tree from its JSON wire envelope.
    ///
    /// Validates the full structure: node identifiers must decode, edges
    /// must reference known vertices, every non-root vertex must have
    /// exactly one parent on a strictly deeper layer, the single root
    /// must sit at layer 0, and the layer map must agree with the vertex
    /// set, including each vertex's `index` matching its slot in its
    /// layer. On failure the caller keeps its previous tree.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::MalformedGraph`] describing the first
    /// violation found.
    pub fn from_json(text: &str) -> Result<Self, TreeError> {
        let wire: WireGraph =
            serde_json::from_str(text).map_err(|e| TreeError::MalformedGraph(e.to_string()))?;

        let mut vertices: FxHashMap<String, TreeVertex> = FxHashMap::default();
        for node in &wire.graph.nodes {
            let handle = NodeHandle::decode(&node.id)?;
            if vertices.contains_key(&handle.role) {
                return Err(TreeError::MalformedGraph(format!(
                    "duplicate role '{}'",
                    handle.role
                )));
            }
            vertices.insert(
                handle.role.clone(),
                TreeVertex {
                    role: handle.role,
                    position: handle.position,
                    parallelism: node.parallelism,
                    parent: None,
                    children: SmallVec::new(),
                },
            );
        }

        for edge in &wire.graph.edges {
            let source = NodeHandle::decode(&edge.source)?;
            let target = NodeHandle::decode(&edge.target)?;
            let source_layer = vertices
                .get(&source.role)
                .ok_or_else(|| {
                    TreeError::MalformedGraph(format!(
                        "edge '{}' references unknown vertex '{}'",
                        edge.id, source.role
                    ))
                })?
                .position
                .layer;
            let child = vertices.get_mut(&target.role).ok_or_else(|| {
                TreeError::MalformedGraph(format!(
                    "edge '{}' references unknown vertex '{}'",
                    edge.id, target.role
                ))
            })?;
            if child.parent.is_some() {
                return Err(TreeError::MalformedGraph(format!(
                    "vertex '{}' has more than one parent",
                    target.role
                )));
            }
            if child.position.layer <= source_layer {
                return Err(TreeError::MalformedGraph(format!(
                    "edge '{}' does not go to a strictly deeper layer",
                    edge.id
                )));
            }
            child.parent = Some(source.role.clone());
            if let Some(parent) = vertices.get_mut(&source.role) {
                parent.children.push(target.role.clone());
            }
        }

        let mut roots = vertices
            .values()
            .filter(|v| v.parent.is_none())
            .map(|v| v.role.clone());
        let root = roots.next().ok_or_else(|| {
            TreeError::MalformedGraph("graph has no root (every vertex has a parent)".to_string())
        })?;
        if let Some(second) = roots.next() {
            return Err(TreeError::MalformedGraph(format!(
                "graph has multiple roots: '{root}' and '{second}'"
            )));
        }
        let root_layer = vertices.get(&root).map_or(0, |v| v.position.layer);
        if root_layer != 0 {
            return Err(TreeError::MalformedGraph(format!(
                "root '{root}' is at layer {root_layer}, not layer 0"
            )));
        }

        let layer_count = wire
            .layer_element_map
            .keys()
            .next_back()
            .map_or(0, |&l| l as usize + 1);
        let mut layer_elements = vec![Vec::new(); layer_count];
        let mut mapped: FxHashSet<&str> = FxHashSet::default();
        for (&layer, roles) in &wire.layer_element_map {
            for (slot, role) in roles.iter().enumerate() {
                let vertex = vertices.get(role).ok_or_else(|| {
                    TreeError::MalformedGraph(format!(
                        "layer map references unknown vertex '{role}'"
                    ))
                })?;
                if vertex.position.layer != layer {
                    return Err(TreeError::MalformedGraph(format!(
                        "vertex '{role}' is at layer {} but mapped to layer {layer}",
                        vertex.position.layer
                    )));
                }
                let slot = u32::try_from(slot).unwrap_or(u32::MAX);
                if vertex.position.index != slot {
                    return Err(TreeError::MalformedGraph(format!(
                        "vertex '{role}' has index {} but occupies slot {slot} of layer {layer}",
                        vertex.position.index
                    )));
                }
                if !mapped.insert(role) {
                    return Err(TreeError::MalformedGraph(format!(
                        "vertex '{role}' appears twice in the layer map"
                    )));
                }
            }
            layer_elements[layer as usize].clone_from(roles);
        }
        if mapped.len() != vertices.len() {
            return Err(TreeError::MalformedGraph(format!(
                "layer map covers {} vertices but the graph has {}",
                mapped.len(),
                vertices.len()
            )));
        }

        // usize::MAX round-trips through u64 on 64-bit targets.
        #[allow(clippy::cast_possible_truncation)]
        let max_degree = wire.max_degree as usize;

        Ok(Self {
            vertices,
            layer_elements,
            max_degree,
            root,
        })
    }
}

fn check_role_name(role: &str) -> Result<(), TreeError> {
    if role.is_empty() || role.contains(HANDLE_SEPARATOR) {
        return Err(TreeError::InvalidRoleName(role.to_string()));
    }
    Ok(())
}

/// Creator tag stamped into the wire envelope.
const WIRE_CREATOR: &str = "streamcast";

#[derive(Serialize, Deserialize)]
struct WireNode {
    id: String,
    parallelism: u32,
}

#[derive(Serialize, Deserialize)]
struct WireEdge {
    id: String,
    source: String,
    target: String,
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    creator: String,
    version: String,
    nodes: Vec<WireNode>,
    edges: Vec<WireEdge>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGraph {
    graph: WireEnvelope,
    max_degree: u64,
    layer_element_map: BTreeMap<u32, Vec<String>>,
}
