//! Dataflow scheduling for the generation stages.
//!
//! The graph is derived purely from each stage's declared inputs and
//! outputs: an edge runs from the producer of a key to each consumer of
//! that key. Validation happens at build time, before any stage executes.

use crate::stage::StageName;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use quizforge_state::StateKey;
use std::collections::HashMap;

/// Structural defects in the stage graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The declarations form a dependency cycle.
    #[error("stage graph contains a cycle")]
    Cycle,

    /// A stage reads a key no scheduled stage produces.
    #[error("stage {stage} reads `{key}` but no stage produces it")]
    UnboundInput { stage: StageName, key: &'static str },

    /// Two stages both claim to write the same key.
    #[error("key `{key}` is produced by both {first} and {second}")]
    DuplicateProducer {
        key: &'static str,
        first: StageName,
        second: StageName,
    },
}

/// Validated dependency graph over a set of stages.
#[derive(Debug)]
pub struct StageGraph {
    graph: DiGraphMap<StageName, ()>,
}

impl StageGraph {
    /// The full generation graph (all six stages).
    pub fn generation() -> Result<Self, GraphError> {
        Self::from_stages(&StageName::GENERATION)
    }

    /// Build and validate a graph over `stages`.
    pub fn from_stages(stages: &[StageName]) -> Result<Self, GraphError> {
        let mut producers: HashMap<StateKey, StageName> = HashMap::new();
        for &stage in stages {
            for &key in stage.outputs() {
                if let Some(&first) = producers.get(&key) {
                    return Err(GraphError::DuplicateProducer {
                        key: key.as_str(),
                        first,
                        second: stage,
                    });
                }
                producers.insert(key, stage);
            }
        }

        let mut graph = DiGraphMap::new();
        for &stage in stages {
            graph.add_node(stage);
        }
        for &stage in stages {
            for &key in stage.inputs() {
                let &producer =
                    producers
                        .get(&key)
                        .ok_or(GraphError::UnboundInput {
                            stage,
                            key: key.as_str(),
                        })?;
                // A stage reading its own output is a cycle of length one.
                if producer == stage {
                    return Err(GraphError::Cycle);
                }
                graph.add_edge(producer, stage, ());
            }
        }

        if toposort(&graph, None).is_err() {
            return Err(GraphError::Cycle);
        }
        Ok(Self { graph })
    }

    /// Stages grouped into waves: every stage in a wave depends only on
    /// stages in earlier waves, so each wave can run concurrently.
    #[must_use]
    pub fn waves(&self) -> Vec<Vec<StageName>> {
        let mut remaining: Vec<StageName> = self.graph.nodes().collect();
        remaining.sort();
        let mut done: Vec<StageName> = Vec::new();
        let mut waves = Vec::new();

        while !remaining.is_empty() {
            let ready: Vec<StageName> = remaining
                .iter()
                .copied()
                .filter(|&stage| {
                    self.graph
                        .neighbors_directed(stage, Direction::Incoming)
                        .all(|dep| done.contains(&dep))
                })
                .collect();
            // Validation guarantees progress on an acyclic graph.
            debug_assert!(!ready.is_empty());
            remaining.retain(|stage| !ready.contains(stage));
            done.extend(ready.iter().copied());
            waves.push(ready);
        }
        waves
    }

    /// Direct dependencies of `stage`.
    #[must_use]
    pub fn dependencies(&self, stage: StageName) -> Vec<StageName> {
        let mut deps: Vec<StageName> = self
            .graph
            .neighbors_directed(stage, Direction::Incoming)
            .collect();
        deps.sort();
        deps
    }
}
