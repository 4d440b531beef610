//! Ordered, immutable step catalog

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use super::rule::DetectionRule;
use super::types::{Placement, RenderedStep, StepId, TargetRef};

/// A catalog that cannot drive a tour
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("tour catalog has no steps")]
    Empty,

    #[error("step {0} is gated but has no detection rule")]
    MissingRule(StepId),

    #[error("step {0} has a detection rule that names no evidence")]
    EmptyRule(StepId),

    #[error("steps {0} and {1} are both marked as checkpoint")]
    MultipleCheckpoints(StepId, StepId),
}

/// Text shown for a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContent {
    pub title: String,
    pub body: String,
    /// Appended while the learner is being waited on
    #[serde(default)]
    pub waiting_hint: Option<String>,
}

impl StepContent {
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            waiting_hint: None,
        }
    }

    pub fn with_waiting_hint(mut self, hint: &str) -> Self {
        self.waiting_hint = Some(hint.to_string());
        self
    }

    /// Render as plain text for the given waiting state
    pub fn render(&self, is_waiting: bool) -> String {
        let mut text = format!("{}\n{}", self.title, self.body);
        if is_waiting {
            if let Some(hint) = &self.waiting_hint {
                text.push_str("\n⏳ ");
                text.push_str(hint);
            }
        }
        text
    }
}

/// A single step definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Ordinal position, assigned by the catalog
    pub id: StepId,
    pub target: TargetRef,
    pub placement: Placement,
    pub content: StepContent,
    /// Requires verified learner action before advancing
    pub gated: bool,
    #[serde(default)]
    pub rule: Option<DetectionRule>,
    /// Entering this step fires the host's checkpoint callback once per run
    #[serde(default)]
    pub checkpoint: bool,
}

impl Step {
    /// A free step
    pub fn new(target: TargetRef, placement: Placement, content: StepContent) -> Self {
        Self {
            id: 0,
            target,
            placement,
            content,
            gated: false,
            rule: None,
            checkpoint: false,
        }
    }

    /// Gate the step on a detection rule
    pub fn gated(mut self, rule: DetectionRule) -> Self {
        self.gated = true;
        self.rule = Some(rule);
        self
    }

    pub fn checkpoint(mut self) -> Self {
        self.checkpoint = true;
        self
    }
}

/// Ordered sequence of steps, fixed for the lifetime of a run
#[derive(Debug, Clone)]
pub struct StepCatalog {
    steps: Arc<[Step]>,
}

impl StepCatalog {
    /// Build a catalog; step ids are reassigned to their positions
    pub fn new(steps: Vec<Step>) -> Result<Self, CatalogError> {
        if steps.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut checkpoint: Option<StepId> = None;
        let mut numbered = Vec::with_capacity(steps.len());
        for (id, mut step) in steps.into_iter().enumerate() {
            step.id = id;
            match (&step.rule, step.gated) {
                (None, true) => return Err(CatalogError::MissingRule(id)),
                (Some(rule), _) if !rule.has_evidence() => {
                    return Err(CatalogError::EmptyRule(id))
                }
                _ => {}
            }
            if step.checkpoint {
                if let Some(first) = checkpoint {
                    return Err(CatalogError::MultipleCheckpoints(first, id));
                }
                checkpoint = Some(id);
            }
            numbered.push(step);
        }

        Ok(Self {
            steps: numbered.into(),
        })
    }

    /// Step at `index`. Panics when out of range: the controller clamps
    /// every index it passes here.
    pub fn step_at(&self, index: usize) -> &Step {
        match self.steps.get(index) {
            Some(step) => step,
            None => panic!(
                "step index {index} out of range for catalog of {} steps",
                self.steps.len()
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; an empty catalog cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Id of the checkpoint step, if the catalog has one
    pub fn checkpoint(&self) -> Option<StepId> {
        self.steps.iter().find(|s| s.checkpoint).map(|s| s.id)
    }

    /// Steps as the renderer sees them; only the current step shows its
    /// waiting hint
    pub fn render(&self, current_index: usize, is_waiting: bool) -> Vec<RenderedStep> {
        self.steps
            .iter()
            .map(|step| RenderedStep {
                target: step.target.clone(),
                content: step
                    .content
                    .render(is_waiting && step.id == current_index),
                placement: step.placement,
            })
            .collect()
    }
}
