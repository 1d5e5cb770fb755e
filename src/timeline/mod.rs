//! # Timeline Module
//!
//! Turns per-record artifacts into [`Segment`]s and lays them out on a
//! single time axis.
//!
//! Adjacent segments overlap by their transition, so
//! `total = Σ display − Σ transition`. Transitions are capped at half of
//! the shorter neighbour and a crossfade with no room left becomes a cut.

pub mod scheduler;
pub mod segment;

pub use scheduler::{schedule, Timeline, TimelineEntry, Transition};
pub use segment::{Segment, SegmentBuilder};
