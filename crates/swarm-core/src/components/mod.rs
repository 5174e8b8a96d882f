//! ECS Components
//!
//! All entity components for agents and resources for the arena.

pub mod agent;
pub mod world;

pub use agent::*;
pub use world::*;
