//! Concurrency utilities for coordinating pipeline workers.
//!
//! Each entity's landing worker runs as an independent task; the only
//! cross-task coordination this crate needs is a broadcast shutdown signal
//! that lets a pipeline stop all of its workers at a safe batch boundary.

pub mod shutdown;
