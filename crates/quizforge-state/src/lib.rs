//! Shared run state and artifact store for the quizforge pipeline.
//!
//! - [`RunState`]: write-once key-value mapping scoped to one pipeline run.
//! - [`ArtifactStore`]: durable storage of banks and reports keyed by
//!   `{conversation_id}{suffix}`.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod run_state;
pub mod store;

pub use run_state::{Artifact, RunState, StateError, StateKey};
pub use store::{ArtifactStore, JsonDirStore, MemoryStore, StoreError, StoredArtifact};
