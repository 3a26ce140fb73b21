//! A scripted `ChainClient` that can simulate one or more chain
//! reorganizations on a fixed schedule, for driving integration tests
//! without a live node.

mod fork;
mod sim;

pub use sim::{ReorgEvent, ReorgSim};
