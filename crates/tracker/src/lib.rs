//! The bounded, block-number-ordered map used both by the Poller (to
//! remember previously-observed canonical blocks) and by the Engine (to
//! remember per-block processing state). Both callers need the same two
//! access patterns — keyed lookup, and "pop everything at or below N" —
//! so the container lives here once rather than twice.

mod ordered_map;
mod tracker;

pub use ordered_map::OrderedMap;
pub use tracker::{Tracker, TrackerError};
