//! Action-gated onboarding tour engine.
//!
//! A [`TourController`] walks an ordered [`StepCatalog`]. Free steps advance
//! on navigation alone; gated steps hold the tour until an
//! [`ActionDetector`] sees the learner's action in the editor, read through
//! an [`EditorSurface`]. The controller runs on its own task and is driven
//! through a [`TourHandle`]; everything it has to say comes back as
//! [`TourSignal`]s.

pub mod builtin;
pub mod catalog;
pub mod controller;
pub mod detector;
mod error;
mod handle;
pub mod poller;
pub mod progress;
pub mod registry;
pub mod rule;
pub mod surface;
pub mod types;

pub use catalog::{CatalogError, Step, StepCatalog, StepContent};
pub use controller::{
    ProgressSnapshot, TourController, TourTiming, DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY,
};
pub use detector::{ActionDetector, DetectionError, Evidence};
pub use error::TourError;
pub use handle::TourHandle;
pub use progress::ProgressState;
pub use registry::{RunId, TourRegistry};
pub use rule::DetectionRule;
pub use surface::{EditorSurface, InMemorySurface, UiSnapshot};
pub use types::*;
