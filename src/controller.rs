//! Engine-facing control facade.
//!
//! [`MulticastController`] ties the pieces together for the surrounding
//! engine: it builds the initial tree at topology submission, keeps the
//! current tree and degree bound, feeds telemetry through the rate
//! controller, and turns scale signals into [`ControlMessage`]s. The
//! engine's control channel owns timing and cluster-wide application; a
//! new decision must only be fed in after the previous message has been
//! fully applied.

use crate::config::MulticastConfig;
use crate::control::ControlMessage;
use crate::rate::{QueueTrend, RateController, ScaleDirection};
use crate::registry::PartitionRegistry;
use crate::tree::{reconfigure, FactoryResult, MulticastGraph, NodePosition, TreeBuilder, TreeShape};
use crate::{Error, Result};

/// Control-plane facade over tree construction, rate control, and
/// reconfiguration.
#[derive(Debug)]
pub struct MulticastController {
    rate: RateController,
    registry: PartitionRegistry,
    trend: QueueTrend,
    graph: Option<MulticastGraph>,
    degree: usize,
}

impl MulticastController {
    /// Creates a controller with no tree yet.
    #[must_use]
    pub fn new(config: MulticastConfig) -> Self {
        let degree = config.max_degree;
        Self {
            rate: RateController::new(config),
            registry: PartitionRegistry::new(),
            trend: QueueTrend::new(),
            graph: None,
            degree,
        }
    }

    /// Returns the tunables.
    #[must_use]
    pub fn config(&self) -> &MulticastConfig {
        self.rate.config()
    }

    /// Returns the partition registry.
    #[must_use]
    pub fn registry(&self) -> &PartitionRegistry {
        &self.registry
    }

    /// Returns the current tree, if one has been built or imported.
    #[must_use]
    pub fn current_graph(&self) -> Option<&MulticastGraph> {
        self.graph.as_ref()
    }

    /// Returns the degree bound of the current tree.
    #[must_use]
    pub fn current_degree(&self) -> usize {
        self.degree
    }

    /// Builds the initial tree, records every role's parallelism in the
    /// registry, and adopts the tree as current.
    ///
    /// # Errors
    ///
    /// Propagates construction failures; the controller state is left
    /// unchanged on error.
    pub fn build_tree<F>(
        &mut self,
        shape: TreeShape,
        root_role: &str,
        destination_count: u32,
        worker_count: u32,
        degree_bound: usize,
        factory: F,
    ) -> Result<&MulticastGraph>
    where
        F: FnMut(NodePosition) -> FactoryResult,
    {
        let builder = TreeBuilder::new(root_role);
        let graph =
            builder.build_tree(shape, destination_count, worker_count, degree_bound, factory)?;
        self.registry.clear();
        for vertex in graph.vertices() {
            self.registry.assign(vertex.role.clone(), vertex.parallelism);
        }
        self.degree = graph.max_degree();
        tracing::info!(
            root = root_role,
            workers = worker_count,
            destinations = destination_count,
            degree = self.degree,
            layers = graph.layer_count(),
            "built multicast tree"
        );
        Ok(self.graph.insert(graph))
    }

    /// Derives the largest safe degree bound from the instantaneous input
    /// rate and the configured queue capacity.
    ///
    /// # Errors
    ///
    /// Returns a rate error for degenerate input; the caller falls back
    /// to the configured default bound.
    pub fn compute_max_out_degree(&self, input_rate: f64) -> Result<usize> {
        Ok(self.rate.compute_max_out_degree(input_rate)?)
    }

    /// Decides scale direction from two queue-length samples.
    #[must_use]
    pub fn decide_scale(&self, prev_queue_len: f64, curr_queue_len: f64) -> ScaleDirection {
        self.rate.decide_scale(prev_queue_len, curr_queue_len)
    }

    /// Recomputes the current tree under a new degree bound and adopts
    /// the result.
    ///
    /// # Errors
    ///
    /// Fails if no tree exists or the bound is invalid; the previous tree
    /// is retained on any failure.
    pub fn reconfigure_to(&mut self, new_degree: usize) -> Result<ControlMessage> {
        let graph = self
            .graph
            .as_ref()
            .ok_or(Error::Tree(crate::tree::TreeError::NoTree))?;
        let message = reconfigure(graph, self.degree, new_degree)?;
        tracing::info!(
            old_degree = self.degree,
            new_degree,
            direction = ?message.direction,
            rewired = message.changes.len(),
            "computed tree reconfiguration"
        );
        self.graph = Some(message.graph.clone());
        self.degree = new_degree;
        self.trend.reset();
        Ok(message)
    }

    /// Feeds one telemetry sample; on a scale signal, derives the new
    /// bound from `input_rate` and reconfigures.
    ///
    /// Returns `None` when the sample produces no signal or the derived
    /// bound equals the current one.
    ///
    /// # Errors
    ///
    /// Propagates degenerate-rate and reconfiguration failures; the
    /// previous tree is retained.
    pub fn on_queue_sample(
        &mut self,
        queue_len: f64,
        input_rate: f64,
    ) -> Result<Option<ControlMessage>> {
        let direction = self.trend.observe(&self.rate, queue_len);
        if direction == ScaleDirection::None {
            return Ok(None);
        }
        let derived = self.rate.compute_max_out_degree(input_rate)?.max(1);
        let consistent = match direction {
            ScaleDirection::Down => derived < self.degree,
            ScaleDirection::Up => derived > self.degree,
            ScaleDirection::None => false,
        };
        if !consistent {
            tracing::debug!(
                ?direction,
                derived,
                current = self.degree,
                "scale signal not confirmed by rate-derived bound"
            );
            return Ok(None);
        }
        tracing::info!(?direction, derived, current = self.degree, "scale triggered");
        self.reconfigure_to(derived).map(Some)
    }

    /// Adopts a tree received over the wire.
    ///
    /// On malformed input the previous tree is retained and the error is
    /// returned after being logged.
    ///
    /// # Errors
    ///
    /// Returns [`crate::tree::TreeError::MalformedGraph`] for invalid
    /// payloads.
    pub fn import_graph(&mut self, json: &str) -> Result<()> {
        match MulticastGraph::from_json(json) {
            Ok(graph) => {
                self.degree = graph.max_degree();
                self.registry.clear();
                for vertex in graph.vertices() {
                    self.registry.assign(vertex.role.clone(), vertex.parallelism);
                }
                self.graph = Some(graph);
                self.trend.reset();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejected malformed graph; keeping previous tree");
                Err(e.into())
            }
        }
    }
}
