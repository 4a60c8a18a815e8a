//! One module per tier, each exposing a locked public API plus (where the
//! tier needs internal recursion, namely the graph tier's traversal) an
//! unlocked `*_locked` variant that assumes the caller already holds the
//! engine's gate.

pub mod fact_ops;
pub mod link_ops;
pub mod session_ops;
pub mod trace_ops;
pub mod vector_ops;
