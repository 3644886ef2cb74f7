//! Online tree reconfiguration under a new degree bound.
//!
//! Both directions are pure functions: they take the current tree by
//! reference, produce a fresh [`MulticastGraph`] over the same role set,
//! and derive the instruction map by comparing old against new wiring.
//! The role set is never changed here; only physical links and positions
//! move.
//!
//! - [`scale_down`] prunes every node to its first `new_degree` children
//!   (severed subtrees cascade into a FIFO detached queue) and reattaches
//!   the detached roles breadth-first into the spare positions.
//! - [`scale_up`] pulls the most recently attached roles (highest
//!   creation id first) out of the deep tree and reattaches them close to
//!   the root, preferring every existing parent→child edge it can keep.

use std::collections::VecDeque;

use fxhash::{FxHashMap, FxHashSet};

use crate::control::{ControlConfiguration, ControlMessage};
use crate::rate::ScaleDirection;

use super::error::TreeError;
use super::graph::{MulticastGraph, NodePosition};

/// Recomputes the tree for a changed degree bound.
///
/// Dispatches to [`scale_down`] or [`scale_up`]; an unchanged bound
/// returns a no-op message carrying the unchanged tree.
///
/// # Errors
///
/// Returns [`TreeError::InvalidParameter`] for a zero bound.
pub fn reconfigure(
    graph: &MulticastGraph,
    old_degree: usize,
    new_degree: usize,
) -> Result<ControlMessage, TreeError> {
    if new_degree == 0 {
        return Err(TreeError::InvalidParameter {
            name: "new_degree",
            value: 0,
        });
    }
    if new_degree < old_degree {
        scale_down(graph, new_degree)
    } else if new_degree > old_degree {
        scale_up(graph, new_degree)
    } else {
        Ok(ControlMessage::noop(graph.clone()))
    }
}

/// Shrinks the tree's fan-out to `new_degree`.
///
/// Breadth-first over the current tree, each surviving node keeps only
/// its first `new_degree` children (attachment order); the rest are
/// severed together with their entire subtrees, in BFS order, into a
/// FIFO detached queue. The tree is then rebuilt breadth-first over the
/// same vertex count: each position prefers the node's surviving old
/// children and falls back to the detached queue.
///
/// If the root is already within the bound the tree is left untouched
/// and an empty instruction map is returned.
///
/// # Errors
///
/// Returns [`TreeError::InvalidParameter`] for a zero bound.
pub fn scale_down(graph: &MulticastGraph, new_degree: usize) -> Result<ControlMessage, TreeError> {
    if new_degree == 0 {
        return Err(TreeError::InvalidParameter {
            name: "new_degree",
            value: 0,
        });
    }
    if graph.out_degree(graph.root()) <= new_degree {
        // Cheap no-op: the tree was built under a tighter bound already.
        return Ok(ControlMessage::new(
            graph.clone(),
            ScaleDirection::Down,
            FxHashMap::default(),
        ));
    }

    let mut detached: VecDeque<String> = VecDeque::new();
    let mut severed: FxHashSet<String> = FxHashSet::default();
    let mut preferred: FxHashMap<String, VecDeque<String>> = FxHashMap::default();

    for role in graph.bfs_order() {
        let children = graph.children_of(&role);
        if severed.contains(&role) {
            // Severing cascades: a detached node loses all its children.
            for child in children {
                severed.insert(child.clone());
                detached.push_back(child.clone());
            }
            continue;
        }
        for child in children.iter().skip(new_degree) {
            severed.insert(child.clone());
            detached.push_back(child.clone());
        }
        preferred.insert(
            role,
            children.iter().take(new_degree).cloned().collect(),
        );
    }

    rebuild(graph, new_degree, ScaleDirection::Down, preferred, detached)
}

/// Grows the tree's fan-out to `new_degree`.
///
/// Builds a cut pool of all non-root roles in descending creation-id
/// order (most recently attached first), then rebuilds breadth-first:
/// every position prefers an existing parent→child edge, and a node with
/// spare capacity beyond its old children pulls the next unplaced role
/// from the pool, lifting deep nodes toward the root.
///
/// # Errors
///
/// Returns [`TreeError::InvalidParameter`] for a zero bound.
pub fn scale_up(graph: &MulticastGraph, new_degree: usize) -> Result<ControlMessage, TreeError> {
    if new_degree == 0 {
        return Err(TreeError::InvalidParameter {
            name: "new_degree",
            value: 0,
        });
    }

    let mut pool: Vec<&str> = graph
        .vertices()
        .filter(|v| v.role != graph.root())
        .map(|v| v.role.as_str())
        .collect();
    pool.sort_by_key(|role| std::cmp::Reverse(graph.position_of(role).map_or(0, |p| p.id)));
    let pool: VecDeque<String> = pool.into_iter().map(str::to_string).collect();

    let preferred: FxHashMap<String, VecDeque<String>> = graph
        .vertices()
        .map(|v| (v.role.clone(), v.children().iter().cloned().collect()))
        .collect();

    rebuild(graph, new_degree, ScaleDirection::Up, preferred, pool)
}

/// Rebuilds a tree breadth-first over the old tree's role set.
///
/// At each frontier node with spare capacity, the next child is the
/// node's next unplaced preferred child, else the next unplaced role
/// from the pool. Instructions are derived afterwards by comparing old
/// and new parent/position per role.
fn rebuild(
    old: &MulticastGraph,
    new_degree: usize,
    direction: ScaleDirection,
    mut preferred: FxHashMap<String, VecDeque<String>>,
    mut pool: VecDeque<String>,
) -> Result<ControlMessage, TreeError> {
    let mut new_graph = MulticastGraph::new(old.root(), new_degree)?;
    let mut frontier = VecDeque::from([old.root().to_string()]);
    let mut placed: FxHashSet<String> = FxHashSet::default();
    placed.insert(old.root().to_string());
    let mut next_id = 1u32;

    while new_graph.vertex_count() < old.vertex_count() {
        while frontier
            .front()
            .is_some_and(|role| new_graph.out_degree(role) >= new_degree)
        {
            frontier.pop_front();
        }
        let parent = frontier.front().cloned().ok_or_else(|| {
            TreeError::MalformedGraph("rebuild frontier exhausted before all roles were placed".to_string())
        })?;

        let child = next_unplaced(preferred.get_mut(&parent), &placed)
            .or_else(|| next_unplaced(Some(&mut pool), &placed))
            .ok_or_else(|| {
                TreeError::MalformedGraph(
                    "rebuild ran out of roles before reaching the original vertex count"
                        .to_string(),
                )
            })?;

        let layer = new_graph
            .layer_of(&parent)
            .ok_or_else(|| TreeError::RoleNotFound(parent.clone()))?
            + 1;
        let index = u32::try_from(new_graph.elements_at_layer(layer).len()).unwrap_or(u32::MAX);
        let parallelism = old.vertex(&child).map_or(0, |v| v.parallelism);
        new_graph.add_vertex(
            child.clone(),
            NodePosition {
                id: next_id,
                layer,
                index,
            },
            parallelism,
        )?;
        new_graph.add_edge(&parent, &child)?;
        next_id += 1;
        placed.insert(child.clone());
        frontier.push_back(child);
    }

    let changes = diff_changes(old, &new_graph);
    Ok(ControlMessage::new(new_graph, direction, changes))
}

/// Pops the next role from `queue` that has not been placed yet.
fn next_unplaced(
    queue: Option<&mut VecDeque<String>>,
    placed: &FxHashSet<String>,
) -> Option<String> {
    let queue = queue?;
    while let Some(role) = queue.pop_front() {
        if !placed.contains(&role) {
            return Some(role);
        }
    }
    None
}

/// Derives the minimal instruction map between two trees over the same
/// role set: an entry exactly for every role whose parent or position
/// changed.
fn diff_changes(
    old: &MulticastGraph,
    new: &MulticastGraph,
) -> FxHashMap<String, ControlConfiguration> {
    let mut changes = FxHashMap::default();
    for vertex in new.vertices() {
        let role = &vertex.role;
        if role == new.root() {
            continue;
        }
        let mut config = ControlConfiguration::default();
        let old_parent = old.parent_of(role);
        let new_parent = new.parent_of(role);
        if let (Some(old_parent), Some(new_parent)) = (old_parent, new_parent) {
            config.set_rewire(old_parent.to_string(), new_parent.to_string());
        }
        if old.position_of(role) != Some(vertex.position) {
            config = config.with_meta(vertex.position);
        }
        if !config.is_empty() {
            changes.insert(role.clone(), config);
        }
    }
    changes
}
