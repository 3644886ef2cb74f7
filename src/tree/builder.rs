//! Balanced partial tree construction.
//!
//! [`TreeBuilder`] produces the initial dissemination tree at topology
//! build time. All shapes are built on the same breadth-first attach
//! primitive; per-node replicas are created through a caller-supplied
//! factory, so construction has no knowledge of the engine's task types
//! and fails fast when a replica cannot be created.

use std::collections::VecDeque;

use super::error::TreeError;
use super::graph::{MulticastGraph, NodePosition};

/// Shape of the dissemination tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeShape {
    /// Linear sequence (degree bound 1).
    Chain,
    /// Doubling fan-out: every existing node gains one child per round.
    Binomial,
    /// Every node attaches directly to the root (unbounded fan-out).
    Star,
    /// Balanced partial tree under the caller's degree bound.
    Bounded,
}

/// Replica factory outcome: the role of the created replica, or a reason
/// why creation failed.
pub type FactoryResult = std::result::Result<String, String>;

/// Builds multicast trees rooted at a fixed role.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    root_role: String,
}

impl TreeBuilder {
    /// Creates a builder whose trees are rooted at `root_role`.
    #[must_use]
    pub fn new(root_role: impl Into<String>) -> Self {
        Self {
            root_role: root_role.into(),
        }
    }

    /// Builds a tree of the given shape.
    ///
    /// `destination_count` is the total number of downstream replicas to
    /// spread across the tree, `worker_count` the number of tree positions
    /// to create, and `degree_bound` the fan-out bound (only consulted for
    /// [`TreeShape::Bounded`] and ignored for the fixed-shape variants).
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidParameter`] for zero counts or a zero
    /// bound, and [`TreeError::NodeCreation`] if the factory fails.
    pub fn build_tree<F>(
        &self,
        shape: TreeShape,
        destination_count: u32,
        worker_count: u32,
        degree_bound: usize,
        factory: F,
    ) -> Result<MulticastGraph, TreeError>
    where
        F: FnMut(NodePosition) -> FactoryResult,
    {
        match shape {
            TreeShape::Chain => {
                self.build_balanced_partial_tree(destination_count, worker_count, 1, factory)
            }
            TreeShape::Bounded => self.build_balanced_partial_tree(
                destination_count,
                worker_count,
                degree_bound,
                factory,
            ),
            TreeShape::Binomial => self.build_binomial(destination_count, worker_count, factory),
            TreeShape::Star => self.build_star(destination_count, worker_count, factory),
        }
    }

    /// Builds a balanced partial tree under a fan-out bound.
    ///
    /// Breadth-first: the next frontier node with spare out-degree receives
    /// a new child with the next sequential id, `parent.layer + 1`, and the
    /// next index in that layer, until `worker_count` non-root nodes exist.
    /// Requested parallelism is split near-evenly: with
    /// `div = destination_count / worker_count` and
    /// `rem = destination_count % worker_count`, the first `rem` created
    /// nodes serve `div + 1` replicas and the rest `div`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidParameter`] if any count or the bound is
    /// zero, and [`TreeError::NodeCreation`] if the factory fails (the
    /// whole construction fails; no truncated tree is returned).
    pub fn build_balanced_partial_tree<F>(
        &self,
        destination_count: u32,
        worker_count: u32,
        degree_bound: usize,
        mut factory: F,
    ) -> Result<MulticastGraph, TreeError>
    where
        F: FnMut(NodePosition) -> FactoryResult,
    {
        check_counts(destination_count, worker_count)?;
        if degree_bound == 0 {
            return Err(TreeError::InvalidParameter {
                name: "degree_bound",
                value: 0,
            });
        }

        let mut graph = MulticastGraph::new(self.root_role.clone(), degree_bound)?;
        let split = ParallelismSplit::new(destination_count, worker_count);
        let mut frontier = VecDeque::from([self.root_role.clone()]);

        for seq in 1..=worker_count {
            while frontier
                .front()
                .is_some_and(|role| graph.out_degree(role) >= degree_bound)
            {
                frontier.pop_front();
            }
            let parent = frontier.front().cloned().ok_or_else(|| {
                TreeError::MalformedGraph("construction frontier exhausted".to_string())
            })?;
            let layer = graph
                .layer_of(&parent)
                .ok_or_else(|| TreeError::RoleNotFound(parent.clone()))?
                + 1;
            let role = attach_child(&mut graph, &parent, layer, seq, split.for_node(seq), &mut factory)?;
            frontier.push_back(role);
        }
        Ok(graph)
    }

    /// Builds a binomial-style tree: in each round, every node created so
    /// far (root included) gains one child, and the whole round lands in
    /// the next layer. Each layer's node count therefore equals the prior
    /// frontier size, doubling the tree per round.
    fn build_binomial<F>(
        &self,
        destination_count: u32,
        worker_count: u32,
        mut factory: F,
    ) -> Result<MulticastGraph, TreeError>
    where
        F: FnMut(NodePosition) -> FactoryResult,
    {
        check_counts(destination_count, worker_count)?;
        let mut graph = MulticastGraph::new(self.root_role.clone(), usize::MAX)?;
        let split = ParallelismSplit::new(destination_count, worker_count);
        let mut members = vec![self.root_role.clone()];
        let mut seq = 1u32;
        let mut layer = 1u32;

        while seq <= worker_count {
            let round = members.clone();
            for parent in round {
                if seq > worker_count {
                    break;
                }
                let role = attach_child(
                    &mut graph,
                    &parent,
                    layer,
                    seq,
                    split.for_node(seq),
                    &mut factory,
                )?;
                members.push(role);
                seq += 1;
            }
            layer += 1;
        }
        Ok(graph)
    }

    /// Builds a star: every node attaches directly to the root.
    fn build_star<F>(
        &self,
        destination_count: u32,
        worker_count: u32,
        mut factory: F,
    ) -> Result<MulticastGraph, TreeError>
    where
        F: FnMut(NodePosition) -> FactoryResult,
    {
        check_counts(destination_count, worker_count)?;
        let mut graph = MulticastGraph::new(self.root_role.clone(), usize::MAX)?;
        let split = ParallelismSplit::new(destination_count, worker_count);
        let root = self.root_role.clone();

        for seq in 1..=worker_count {
            attach_child(&mut graph, &root, 1, seq, split.for_node(seq), &mut factory)?;
        }
        Ok(graph)
    }
}

/// Near-even split of the requested replica count across tree positions.
#[derive(Debug, Clone, Copy)]
struct ParallelismSplit {
    div: u32,
    rem: u32,
}

impl ParallelismSplit {
    fn new(destination_count: u32, worker_count: u32) -> Self {
        Self {
            div: destination_count / worker_count,
            rem: destination_count % worker_count,
        }
    }

    /// Parallelism for the `seq`-th created node (1-based creation order).
    fn for_node(self, seq: u32) -> u32 {
        if seq <= self.rem {
            self.div + 1
        } else {
            self.div
        }
    }
}

/// Creates a replica through the factory and attaches it under `parent`
/// at the given layer.
fn attach_child<F>(
    graph: &mut MulticastGraph,
    parent: &str,
    layer: u32,
    seq: u32,
    parallelism: u32,
    factory: &mut F,
) -> Result<String, TreeError>
where
    F: FnMut(NodePosition) -> FactoryResult,
{
    let index = u32::try_from(graph.elements_at_layer(layer).len()).unwrap_or(u32::MAX);
    let position = NodePosition {
        id: seq,
        layer,
        index,
    };
    let role = factory(position).map_err(|reason| TreeError::NodeCreation { position, reason })?;
    graph.add_vertex(role.clone(), position, parallelism)?;
    graph.add_edge(parent, &role)?;
    Ok(role)
}

fn check_counts(destination_count: u32, worker_count: u32) -> Result<(), TreeError> {
    if destination_count == 0 {
        return Err(TreeError::InvalidParameter {
            name: "destination_count",
            value: 0,
        });
    }
    if worker_count == 0 {
        return Err(TreeError::InvalidParameter {
            name: "worker_count",
            value: 0,
        });
    }
    Ok(())
}
