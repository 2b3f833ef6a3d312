//! Frame/label lifecycle for human-in-the-loop detection labeling.
//!
//! Videos are uploaded into a storage root, sampled into still frames, optionally
//! pre-labeled by a plugged-in detector, reviewed by a human, and exported as a
//! detection dataset archive. The filesystem is the only source of truth: every
//! listing and status is recomputed from a live directory scan.
//!
//! All operations in this crate are blocking. Async callers should run them on a
//! blocking worker (e.g. `tokio::task::spawn_blocking`).

pub mod command_detector;
pub mod detector;
pub mod error;
pub mod export;
pub mod extractor;
pub mod ffmpeg;
pub mod frame_store;
pub mod label;
pub mod media;
pub mod naming;
pub mod storage;
pub mod taxonomy;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
