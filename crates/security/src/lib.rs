//! Request isolation for Curator.
//!
//! A deployment may be pinned to one community. The [`RequestGate`] rejects
//! requests that claim a different community before any retrieval or
//! generation happens.

pub mod gate;

pub use gate::{RequestGate, ScopeMismatch};
