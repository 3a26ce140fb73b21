//! Given a block range and a fetch policy, produces a self-consistent
//! view of what changed on chain — which blocks are newly good, and
//! which previously-seen blocks were reorged out from under the
//! Tracker.

mod collate;
mod entry;
mod fetch;
mod poller;

pub use poller::Poller;
