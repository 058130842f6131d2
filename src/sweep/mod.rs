//! Sweep enumeration.
//!
//! A sweep is a list of configuration axes. Its cross product yields one
//! `ScenarioDefinition` per combination, named by mapping every axis value
//! to a fixed token (`Unknown<Axis>` when nothing matches).

pub mod axis;
pub mod presets;
pub mod scenario;

pub use axis::{Axis, LabelRule, Labeler};
pub use presets::forwarding_study;
pub use scenario::{ScenarioDefinition, ScenarioSet, Sweep, SweepDefinitionError};
