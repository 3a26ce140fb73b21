//! The `ChainClient` seam: everything the Poller needs from a node, kept
//! narrow enough that a scripted test double can stand in for a live
//! `alloy` provider.

mod alloy_client;
mod client;

pub use alloy_client::AlloyChainClient;
pub use client::{ChainClient, ChainClientError};
