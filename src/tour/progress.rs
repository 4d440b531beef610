//! Authoritative record of where a tour run is

use std::collections::BTreeSet;

use super::catalog::StepCatalog;
use super::types::{Direction, StepId};

/// Why a navigation request was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Current step is gated and not yet satisfied
    Waiting,
    /// `prev` on the first step
    AtStart,
    /// The run already passed its last step
    Terminal,
}

/// Outcome of [`ProgressState::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved { from: usize, to: usize },
    /// Moved past the last step
    Finished,
    Rejected(Rejection),
}

/// Current index, waiting flag and satisfied set for one run.
///
/// `satisfied` only grows. `is_waiting` is only ever true when the current
/// step is gated and not in `satisfied`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    /// `None` is the terminal sentinel
    current: Option<usize>,
    is_waiting: bool,
    satisfied: BTreeSet<StepId>,
}

impl ProgressState {
    /// Fresh progress positioned on step 0
    pub fn start(catalog: &StepCatalog) -> Self {
        Self {
            current: Some(0),
            is_waiting: catalog.step_at(0).gated,
            satisfied: BTreeSet::new(),
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_none()
    }

    pub fn is_waiting(&self) -> bool {
        self.is_waiting
    }

    pub fn is_satisfied(&self, step: StepId) -> bool {
        self.satisfied.contains(&step)
    }

    /// Satisfied step ids in ascending order
    pub fn satisfied(&self) -> impl Iterator<Item = StepId> + '_ {
        self.satisfied.iter().copied()
    }

    fn waiting_at(&self, catalog: &StepCatalog, index: usize) -> bool {
        let step = catalog.step_at(index);
        step.gated && !self.satisfied.contains(&step.id)
    }

    /// Where `direction` would lead without applying it.
    ///
    /// `Ok(None)` means moving on would finish the run.
    pub fn peek(&self, catalog: &StepCatalog, direction: Direction) -> Result<Option<usize>, Rejection> {
        let index = self.current.ok_or(Rejection::Terminal)?;
        if self.is_waiting {
            return Err(Rejection::Waiting);
        }
        match direction {
            Direction::Next if index >= catalog.last_index() => Ok(None),
            Direction::Next => Ok(Some(index + 1)),
            Direction::Prev if index == 0 => Err(Rejection::AtStart),
            Direction::Prev => Ok(Some(index - 1)),
        }
    }

    /// Apply a navigation request
    pub fn advance(&mut self, catalog: &StepCatalog, direction: Direction) -> Advance {
        let from = match self.current {
            Some(index) => index,
            None => return Advance::Rejected(Rejection::Terminal),
        };
        match self.peek(catalog, direction) {
            Err(rejection) => Advance::Rejected(rejection),
            Ok(None) => {
                self.terminate();
                Advance::Finished
            }
            Ok(Some(to)) => {
                self.current = Some(to);
                self.is_waiting = match direction {
                    Direction::Next => self.waiting_at(catalog, to),
                    // Revisited steps are not re-gated
                    Direction::Prev => false,
                };
                Advance::Moved { from, to }
            }
        }
    }

    /// Record a gated step as satisfied.
    ///
    /// Returns true the first time `step` is recorded. Clears the waiting
    /// flag only when `step` is the current step.
    pub fn mark_satisfied(&mut self, step: StepId) -> bool {
        let inserted = self.satisfied.insert(step);
        if self.current == Some(step) {
            self.is_waiting = false;
        }
        inserted
    }

    /// Move to the terminal sentinel
    pub fn terminate(&mut self) {
        self.current = None;
        self.is_waiting = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tour::catalog::{Step, StepContent};
    use crate::tour::rule::DetectionRule;
    use crate::tour::types::{Placement, TargetRef};

    fn free() -> Step {
        Step::new(TargetRef::Body, Placement::Center, StepContent::new("t", "b"))
    }

    fn gated() -> Step {
        free().gated(DetectionRule::in_region("canvas").keyword("repeat"))
    }

    /// free, gated, free
    fn catalog() -> StepCatalog {
        StepCatalog::new(vec![free(), gated(), free()]).unwrap()
    }

    #[test]
    fn test_start_on_free_step() {
        let progress = ProgressState::start(&catalog());
        assert_eq!(progress.current_index(), Some(0));
        assert!(!progress.is_waiting());
        assert_eq!(progress.satisfied().count(), 0);
    }

    #[test]
    fn test_start_on_gated_step() {
        let catalog = StepCatalog::new(vec![gated(), free()]).unwrap();
        let progress = ProgressState::start(&catalog);
        assert!(progress.is_waiting());
    }

    #[test]
    fn test_next_increments_by_one_and_gates() {
        let catalog = catalog();
        let mut progress = ProgressState::start(&catalog);

        assert_eq!(
            progress.advance(&catalog, Direction::Next),
            Advance::Moved { from: 0, to: 1 }
        );
        assert!(progress.is_waiting());
    }

    #[test]
    fn test_navigation_rejected_while_waiting() {
        let catalog = catalog();
        let mut progress = ProgressState::start(&catalog);
        progress.advance(&catalog, Direction::Next);
        let before = progress.clone();

        assert_eq!(
            progress.advance(&catalog, Direction::Next),
            Advance::Rejected(Rejection::Waiting)
        );
        assert_eq!(
            progress.advance(&catalog, Direction::Prev),
            Advance::Rejected(Rejection::Waiting)
        );
        assert_eq!(progress, before);
    }

    #[test]
    fn test_mark_satisfied_unblocks_current_step() {
        let catalog = catalog();
        let mut progress = ProgressState::start(&catalog);
        progress.advance(&catalog, Direction::Next);

        assert!(progress.mark_satisfied(1));
        assert!(!progress.is_waiting());
        assert!(!progress.mark_satisfied(1));
        assert_eq!(
            progress.advance(&catalog, Direction::Next),
            Advance::Moved { from: 1, to: 2 }
        );
    }

    #[test]
    fn test_mark_satisfied_other_step_keeps_waiting() {
        let catalog = catalog();
        let mut progress = ProgressState::start(&catalog);
        progress.advance(&catalog, Direction::Next);

        progress.mark_satisfied(2);
        assert!(progress.is_waiting());
        assert!(progress.is_satisfied(2));
    }

    #[test]
    fn test_next_on_last_step_finishes() {
        let catalog = catalog();
        let mut progress = ProgressState::start(&catalog);
        progress.advance(&catalog, Direction::Next);
        progress.mark_satisfied(1);
        progress.advance(&catalog, Direction::Next);

        assert_eq!(progress.advance(&catalog, Direction::Next), Advance::Finished);
        assert!(progress.is_terminal());
        assert!(!progress.is_waiting());
        assert_eq!(
            progress.advance(&catalog, Direction::Next),
            Advance::Rejected(Rejection::Terminal)
        );
    }

    #[test]
    fn test_prev_never_below_zero() {
        let catalog = catalog();
        let mut progress = ProgressState::start(&catalog);
        assert_eq!(
            progress.advance(&catalog, Direction::Prev),
            Advance::Rejected(Rejection::AtStart)
        );
        assert_eq!(progress.current_index(), Some(0));
    }

    #[test]
    fn test_revisited_steps_are_not_regated() {
        let catalog = catalog();
        let mut progress = ProgressState::start(&catalog);
        progress.advance(&catalog, Direction::Next);
        progress.mark_satisfied(1);
        progress.advance(&catalog, Direction::Next);

        // Back onto the satisfied gated step
        assert_eq!(
            progress.advance(&catalog, Direction::Prev),
            Advance::Moved { from: 2, to: 1 }
        );
        assert!(!progress.is_waiting());

        // Back to 0 and forward again: still satisfied, so not waiting
        progress.advance(&catalog, Direction::Prev);
        progress.advance(&catalog, Direction::Next);
        assert_eq!(progress.current_index(), Some(1));
        assert!(!progress.is_waiting());
    }

    #[test]
    fn test_satisfied_is_monotonic() {
        let catalog = catalog();
        let mut progress = ProgressState::start(&catalog);
        progress.advance(&catalog, Direction::Next);
        progress.mark_satisfied(1);

        progress.advance(&catalog, Direction::Prev);
        progress.advance(&catalog, Direction::Next);
        progress.advance(&catalog, Direction::Next);
        progress.terminate();
        assert!(progress.is_satisfied(1));
    }

    #[test]
    fn test_peek_does_not_mutate() {
        let catalog = catalog();
        let progress = ProgressState::start(&catalog);
        assert_eq!(progress.peek(&catalog, Direction::Next), Ok(Some(1)));
        assert_eq!(progress.peek(&catalog, Direction::Prev), Err(Rejection::AtStart));
        assert_eq!(progress.current_index(), Some(0));
    }
}
