//! Type definitions shared by the tour engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal position of a step within its catalog
pub type StepId = usize;

/// Opaque locator for a region of the editor UI (e.g. `[data-tour="console"]`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionRef(pub String);

impl RegionRef {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// What a step's tooltip points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "region")]
pub enum TargetRef {
    /// The whole page; always present
    Body,
    /// A specific editor region that may or may not be rendered
    Region(RegionRef),
}

impl TargetRef {
    pub fn region(selector: &str) -> Self {
        TargetRef::Region(RegionRef::new(selector))
    }

    /// The region that must be rendered before the step can be shown
    pub fn required_region(&self) -> Option<&RegionRef> {
        match self {
            TargetRef::Body => None,
            TargetRef::Region(region) => Some(region),
        }
    }
}

/// Tooltip placement hint for the renderer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Top,
    #[default]
    Bottom,
    Left,
    Right,
    Center,
}

/// Navigation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Next,
    Prev,
}

/// Why a run reached `Terminated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Moved past the last step, or the renderer reported completion
    Finished,
    /// Learner skipped or closed the tour
    Skipped,
    /// Host tore the run down
    Cancelled,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EndReason::Finished => "finished",
            EndReason::Skipped => "skipped",
            EndReason::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Lifecycle status as reported by the renderer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererStatus {
    #[default]
    Running,
    Finished,
    Skipped,
}

/// Button the learner pressed in the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererAction {
    Next,
    Prev,
    Close,
}

/// Inbound event from the tour renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererEvent {
    #[serde(default)]
    pub status: RendererStatus,
    pub action: RendererAction,
    /// Step index the renderer was showing when the learner acted
    pub index: usize,
}

impl RendererEvent {
    pub fn next(index: usize) -> Self {
        Self {
            status: RendererStatus::Running,
            action: RendererAction::Next,
            index,
        }
    }

    pub fn prev(index: usize) -> Self {
        Self {
            status: RendererStatus::Running,
            action: RendererAction::Prev,
            index,
        }
    }

    pub fn close(index: usize) -> Self {
        Self {
            status: RendererStatus::Running,
            action: RendererAction::Close,
            index,
        }
    }
}

/// Controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "reason")]
pub enum TourPhase {
    /// No run has been started
    Idle,
    /// Accepting navigation events
    Free,
    /// Gated step unsatisfied; navigation suppressed, poller running
    Waiting,
    /// Gated step just satisfied; automatic advance pending
    Settling,
    /// Run over
    Terminated(EndReason),
}

impl TourPhase {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TourPhase::Free | TourPhase::Waiting | TourPhase::Settling
        )
    }
}

/// A step as handed to the renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedStep {
    pub target: TargetRef,
    pub content: String,
    pub placement: Placement,
}

/// Everything the renderer needs to draw the tour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourView {
    pub steps: Vec<RenderedStep>,
    pub current_index: usize,
    /// Presentation only: the renderer disables "next" while this is set
    pub is_waiting: bool,
}

/// Outbound signal for the host application and renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TourSignal {
    /// Current step or waiting flag changed
    StepChanged(TourView),
    /// A gated step's action was detected
    Satisfied { step: StepId },
    /// The checkpoint step was entered for the first time in this run
    Checkpoint { step: StepId },
    /// The run terminated; no further signals follow
    Ended(EndReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_required_region() {
        assert_eq!(TargetRef::Body.required_region(), None);
        let target = TargetRef::region("[data-tour=\"console\"]");
        assert_eq!(
            target.required_region().map(RegionRef::as_str),
            Some("[data-tour=\"console\"]")
        );
    }

    #[test]
    fn test_phase_is_active() {
        assert!(!TourPhase::Idle.is_active());
        assert!(TourPhase::Free.is_active());
        assert!(TourPhase::Waiting.is_active());
        assert!(TourPhase::Settling.is_active());
        assert!(!TourPhase::Terminated(EndReason::Skipped).is_active());
    }

    #[test]
    fn test_renderer_event_deserializes_without_status() {
        let event: RendererEvent =
            serde_json::from_str(r#"{"action":"next","index":3}"#).unwrap();
        assert_eq!(event, RendererEvent::next(3));
    }

    #[test]
    fn test_end_reason_display() {
        assert_eq!(EndReason::Finished.to_string(), "finished");
        assert_eq!(EndReason::Skipped.to_string(), "skipped");
        assert_eq!(EndReason::Cancelled.to_string(), "cancelled");
    }
}
