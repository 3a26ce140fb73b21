//! The Emitter/Engine pair: two long-running loops joined by a
//! rendezvous of three channels (`result`, `error`, `sync`). The
//! Emitter drives the Poller and publishes what it finds; the Engine
//! runs a per-block state machine over the results, dispatches to a
//! `ServiceEngine`, and tells the Emitter when it is safe to advance.

mod channels;
mod emitter;
mod engine;
mod metadata_tracker;
mod service;

pub use channels::{rendezvous, EmitterHandle, EngineHandle};
pub use emitter::Emitter;
pub use engine::Engine;
pub use metadata_tracker::{BlockState, MetadataTracker};
pub use service::ServiceEngine;
