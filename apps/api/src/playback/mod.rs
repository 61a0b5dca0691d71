//! Playback synchronisation for separated audio stems and re-voiced segments.
//!
//! `sync` holds the pure planning logic; `driver` runs it on a timer against
//! whatever player implements `PlaybackBackend`.

pub mod driver;
pub mod sync;
