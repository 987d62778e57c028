//! The accounting engine: pure functions from catalog/deployment snapshots to
//! derived byte budgets, suggestions, fit status, and waffle cells. Nothing in
//! here mutates state or caches results; every call recomputes from its inputs.

pub mod aggregate;
pub mod bars;
pub mod cost;
pub mod dtype;
pub mod fit;
pub mod suggest;
pub mod waffle;
