//! World Setup
//!
//! Agent spawning for the initial population and for newcomers.

pub mod agents;

pub use agents::*;
