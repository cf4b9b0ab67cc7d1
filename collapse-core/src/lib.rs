//! Core Wave Function Collapse constraint solver.
//!
//! Given a [`World`] of cells, a [`VariableMap`] naming the candidate
//! values, a rule table and a [`ValueSelector`], [`run`] assigns exactly one
//! value to every cell so that all rules hold, or reports that no such
//! assignment exists. The engine is single-threaded, synchronous and
//! deterministic for a fixed seed.
//!
//! Problem vocabulary (maps, masks, adjacency matrices) comes from the
//! `collapse-rules` crate and is re-exported here for convenience.

use thiserror::Error;

pub mod arena;
pub mod constrainer;
pub mod queue;
pub mod rules;
pub mod runner;
pub mod select;
pub mod wave;
pub mod world;

/// Scoped bump allocator for all transient solver memory.
pub use crate::arena::{ArenaFrame, ArenaMark, StackArena};
/// Mutator facade handed to rule functions.
pub use crate::constrainer::Constrainer;
/// FIFO of cells pending propagation, with branch checkpoints.
pub use crate::queue::{PropagationQueue, QueueMark};
/// Rule-table trait and its two implementations.
pub use crate::rules::{AdjacencyRules, CallbackRules, RuleFn, RuleSet};
/// The solver entry point and its configuration.
pub use crate::runner::{
    run, EventHook, InitialRule, WfcConfig, WfcConfigBuilder, DEFAULT_MAX_ITERATIONS,
};
/// Branch-value selection strategies.
pub use crate::select::{LcgSelector, RngSelector, ValueSelector};
/// Per-cell possibility state.
pub use crate::wave::Wave;
/// Contract for the user's cell container.
pub use crate::world::World;

pub use collapse_rules::{
    AdjacencyMatrix, MapError, Mask, ValueList, ValueRange, VariableId, VariableMap, WideMask,
};

/// Ways a solve can fail. All variants mean "unsatisfiable as searched";
/// invariant violations and allocation failure abort instead of returning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WfcError {
    /// A cell ran out of candidate values during propagation.
    #[error("contradiction: cell {0} has no possible values left")]
    Contradiction(usize),
    /// Every candidate assignment was tried without success.
    #[error("search exhausted without finding a solution")]
    Exhausted,
    /// The configured iteration bound was hit.
    #[error("iteration limit of {0} reached")]
    IterationLimit(u64),
}
