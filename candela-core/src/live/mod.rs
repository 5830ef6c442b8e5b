//! Live position tracking.

pub mod tracker;

pub use tracker::{BarEvent, LiveTracker, TrackingEvent, TrackingEventKind};
