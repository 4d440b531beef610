//! Tour state machine.
//!
//! The controller is the only owner of [`ProgressState`]. Host requests,
//! renderer events, poll results and the settle timer all arrive through one
//! event loop, so transitions never interleave.
//!
//! ```text
//! Idle --start--> Free | Waiting
//! Free --next--> Free | Waiting | Terminated(Finished)
//! Free --prev--> Free
//! Waiting --detected--> Settling --settle delay / next--> (as Free --next-->)
//! Waiting --navigate--> Waiting            (ignored)
//! any --end(reason)--> Terminated(reason)  (poller stopped first)
//! ```

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use super::catalog::StepCatalog;
use super::detector::ActionDetector;
use super::error::TourError;
use super::handle::{TourEvent, TourHandle};
use super::poller::{PollOutcome, Poller, Probe, ProbeHit};
use super::progress::ProgressState;
use super::registry::{RunId, RunSlot, TourRegistry};
use super::surface::EditorSurface;
use super::types::{
    Direction, EndReason, RegionRef, RendererAction, RendererEvent, RendererStatus, StepId,
    TourPhase, TourSignal, TourView,
};

/// Default cadence for re-reading the editor while waiting
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default pause between detection and the automatic advance
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(800);

/// Poll cadence and settle delay, fixed for the controller's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TourTiming {
    poll_interval: Duration,
    settle_delay: Duration,
}

impl TourTiming {
    pub fn new(poll_interval: Duration, settle_delay: Duration) -> Result<Self, TourError> {
        if poll_interval.is_zero() {
            return Err(TourError::InvalidTiming("poll interval"));
        }
        if settle_delay.is_zero() {
            return Err(TourError::InvalidTiming("settle delay"));
        }
        Ok(Self {
            poll_interval,
            settle_delay,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }
}

impl Default for TourTiming {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Read-only view of controller state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub run_id: Option<RunId>,
    pub phase: TourPhase,
    pub current_index: Option<usize>,
    pub is_waiting: bool,
    pub satisfied: Vec<StepId>,
    /// Forward move held until its target is rendered
    pub parked: Option<usize>,
    pub poller_active: bool,
}

/// Lifecycle container for one run
#[derive(Debug)]
struct TourRun {
    slot: RunSlot,
    progress: ProgressState,
    poller: Option<Poller>,
    settle_deadline: Option<Instant>,
    parked: Option<usize>,
    checkpoint_fired: bool,
}

/// Drives a [`StepCatalog`] against the editor
pub struct TourController {
    catalog: StepCatalog,
    surface: Arc<dyn EditorSurface>,
    detector: Arc<ActionDetector>,
    timing: TourTiming,
    registry: Arc<TourRegistry>,
    signals: mpsc::UnboundedSender<TourSignal>,
    poll_tx: mpsc::UnboundedSender<PollOutcome>,
    poll_rx: mpsc::UnboundedReceiver<PollOutcome>,
    generation: u64,
    run: Option<TourRun>,
    ended: Option<EndReason>,
    /// Id and satisfied steps of the last terminated run
    last_run: Option<(RunId, Vec<StepId>)>,
}

impl TourController {
    /// Create a controller using default timing and the global registry
    pub fn new(
        catalog: StepCatalog,
        surface: Arc<dyn EditorSurface>,
        signals: mpsc::UnboundedSender<TourSignal>,
    ) -> Self {
        let detector = Arc::new(ActionDetector::for_catalog(&catalog));
        let (poll_tx, poll_rx) = mpsc::unbounded_channel();
        Self {
            catalog,
            surface,
            detector,
            timing: TourTiming::default(),
            registry: TourRegistry::global(),
            signals,
            poll_tx,
            poll_rx,
            generation: 0,
            run: None,
            ended: None,
            last_run: None,
        }
    }

    pub fn with_timing(mut self, timing: TourTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Use a dedicated single-flight registry instead of the global one
    pub fn with_registry(mut self, registry: Arc<TourRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Move the controller onto its own task and return a handle to it.
    ///
    /// The task lives until every handle is dropped; an active run is
    /// cancelled at that point.
    pub fn spawn(self) -> TourHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.event_loop(rx));
        TourHandle::new(tx)
    }

    async fn event_loop(mut self, mut events: mpsc::UnboundedReceiver<TourEvent>) {
        loop {
            let settle_deadline = self.run.as_ref().and_then(|run| run.settle_deadline);

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        debug!("All tour handles dropped, stopping controller");
                        self.end(EndReason::Cancelled).await;
                        break;
                    }
                },
                Some(outcome) = self.poll_rx.recv() => self.handle_poll(outcome).await,
                () = async {
                    match settle_deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending::<()>().await,
                    }
                } => self.settle_elapsed().await,
            }
        }
    }

    async fn handle_event(&mut self, event: TourEvent) {
        match event {
            TourEvent::Start(reply) => {
                let _ = reply.send(self.start());
            }
            TourEvent::Navigate(direction) => self.navigate(direction).await,
            TourEvent::Renderer(event) => self.reconcile(event).await,
            TourEvent::Refresh => self.refresh().await,
            TourEvent::End(reason, reply) => {
                self.end(reason).await;
                let _ = reply.send(());
            }
            TourEvent::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    pub fn phase(&self) -> TourPhase {
        match &self.run {
            Some(run) if run.settle_deadline.is_some() => TourPhase::Settling,
            Some(run) if run.progress.is_waiting() => TourPhase::Waiting,
            Some(_) => TourPhase::Free,
            None => self.ended.map_or(TourPhase::Idle, TourPhase::Terminated),
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        match &self.run {
            Some(run) => ProgressSnapshot {
                run_id: Some(run.slot.run_id()),
                phase: self.phase(),
                current_index: run.progress.current_index(),
                is_waiting: run.progress.is_waiting(),
                satisfied: run.progress.satisfied().collect(),
                parked: run.parked,
                poller_active: run.poller.is_some(),
            },
            None => ProgressSnapshot {
                run_id: self.last_run.as_ref().map(|(run_id, _)| *run_id),
                phase: self.phase(),
                current_index: None,
                is_waiting: false,
                satisfied: self
                    .last_run
                    .as_ref()
                    .map(|(_, satisfied)| satisfied.clone())
                    .unwrap_or_default(),
                parked: None,
                poller_active: false,
            },
        }
    }

    fn emit(&self, signal: TourSignal) {
        // Host may have stopped listening; the run carries on regardless
        let _ = self.signals.send(signal);
    }

    fn emit_view(&self) {
        let run = match &self.run {
            Some(run) => run,
            None => return,
        };
        if let Some(index) = run.progress.current_index() {
            let is_waiting = run.progress.is_waiting();
            self.emit(TourSignal::StepChanged(TourView {
                steps: self.catalog.render(index, is_waiting),
                current_index: index,
                is_waiting,
            }));
        }
    }

    fn start(&mut self) -> Result<(), TourError> {
        let slot = self.registry.acquire()?;
        info!(
            run_id = slot.run_id(),
            steps = self.catalog.len(),
            "Tour started"
        );

        self.ended = None;
        self.last_run = None;
        self.run = Some(TourRun {
            slot,
            progress: ProgressState::start(&self.catalog),
            poller: None,
            settle_deadline: None,
            parked: None,
            checkpoint_fired: false,
        });
        self.enter_current_step();
        Ok(())
    }

    /// Announce the current step, fire the checkpoint and start waiting
    fn enter_current_step(&mut self) {
        let (index, is_waiting, first_checkpoint) = {
            let run = match self.run.as_mut() {
                Some(run) => run,
                None => return,
            };
            let index = match run.progress.current_index() {
                Some(index) => index,
                None => return,
            };
            let step = self.catalog.step_at(index);
            let first_checkpoint = step.checkpoint && !run.checkpoint_fired;
            if first_checkpoint {
                run.checkpoint_fired = true;
            }
            (index, run.progress.is_waiting(), first_checkpoint)
        };

        debug!(index, is_waiting, "Entered step");
        self.emit_view();

        let step = self.catalog.step_at(index);
        let step_id = step.id;
        let rule = step.rule.clone();
        if first_checkpoint {
            info!(step = step_id, "Checkpoint step reached");
            self.emit(TourSignal::Checkpoint { step: step_id });
        }

        if is_waiting {
            if let Some(rule) = rule {
                info!(step = step_id, rule = %rule, "Waiting for learner action");
                self.start_poller(Probe::Rule {
                    step: step_id,
                    rule,
                });
            }
        }
    }

    fn start_poller(&mut self, probe: Probe) {
        self.generation += 1;
        let poller = Poller::spawn(
            probe,
            self.generation,
            self.timing.poll_interval,
            Arc::clone(&self.surface),
            Arc::clone(&self.detector),
            self.poll_tx.clone(),
        );
        if let Some(run) = self.run.as_mut() {
            run.poller = Some(poller);
        }
    }

    async fn stop_poller(&mut self) {
        let poller = self.run.as_mut().and_then(|run| run.poller.take());
        if let Some(poller) = poller {
            poller.stop().await;
        }
    }

    async fn navigate(&mut self, direction: Direction) {
        match self.phase() {
            TourPhase::Idle | TourPhase::Terminated(_) => {
                debug!(?direction, "Navigation ignored, no active tour");
                return;
            }
            TourPhase::Waiting => {
                debug!(?direction, "Navigation suppressed while waiting for learner action");
                return;
            }
            TourPhase::Settling => {
                if direction == Direction::Next {
                    debug!("Next during settle delay, advancing now");
                    self.settle_elapsed().await;
                } else {
                    debug!(?direction, "Navigation ignored during settle delay");
                }
                return;
            }
            TourPhase::Free => {}
        }

        if self.run.as_ref().and_then(|run| run.parked).is_some() {
            match direction {
                Direction::Next => {
                    debug!("Forward move already pending on its target");
                    return;
                }
                Direction::Prev => {
                    if let Some(run) = self.run.as_mut() {
                        run.parked = None;
                    }
                    self.stop_poller().await;
                }
            }
        }

        self.step(direction).await;
    }

    /// Apply a move from the free state
    async fn step(&mut self, direction: Direction) {
        let peek = match &self.run {
            Some(run) => run.progress.peek(&self.catalog, direction),
            None => return,
        };

        match peek {
            Err(rejection) => debug!(?direction, ?rejection, "Navigation rejected"),
            Ok(None) => self.end(EndReason::Finished).await,
            Ok(Some(to)) => {
                if direction == Direction::Next {
                    let missing = self
                        .catalog
                        .step_at(to)
                        .target
                        .required_region()
                        .filter(|region| !self.surface.is_rendered(region))
                        .cloned();
                    if let Some(region) = missing {
                        self.park(to, region);
                        return;
                    }
                }
                if let Some(run) = self.run.as_mut() {
                    run.progress.advance(&self.catalog, direction);
                }
                self.enter_current_step();
            }
        }
    }

    /// Hold a forward move until the target region is rendered
    fn park(&mut self, index: usize, region: RegionRef) {
        debug!(index, region = %region, "Target not rendered, holding position");
        if let Some(run) = self.run.as_mut() {
            run.parked = Some(index);
        }
        self.start_poller(Probe::Target { index, region });
    }

    async fn handle_poll(&mut self, outcome: PollOutcome) {
        let current = self
            .run
            .as_ref()
            .and_then(|run| run.poller.as_ref())
            .map(Poller::generation);
        if current != Some(outcome.generation) {
            debug!(generation = outcome.generation, "Discarding stale poll outcome");
            return;
        }
        self.stop_poller().await;
        self.apply_hit(outcome.hit).await;
    }

    async fn apply_hit(&mut self, hit: ProbeHit) {
        match hit {
            ProbeHit::Satisfied(step) => self.satisfy(step),
            ProbeHit::Rendered(index) => {
                let parked = self.run.as_mut().and_then(|run| run.parked.take());
                if parked == Some(index) {
                    debug!(index, "Target rendered, resuming move");
                    self.step(Direction::Next).await;
                }
            }
        }
    }

    fn satisfy(&mut self, step: StepId) {
        let settle_delay = self.timing.settle_delay;
        let run = match self.run.as_mut() {
            Some(run) => run,
            None => return,
        };
        if run.progress.current_index() != Some(step) || !run.progress.is_waiting() {
            debug!(step, "Detection for a step that is no longer waiting");
            return;
        }

        run.progress.mark_satisfied(step);
        run.settle_deadline = Some(Instant::now() + settle_delay);
        info!(step, settle_ms = settle_delay.as_millis() as u64, "Learner action detected");

        self.emit(TourSignal::Satisfied { step });
        self.emit_view();
    }

    async fn settle_elapsed(&mut self) {
        let settled = self
            .run
            .as_mut()
            .and_then(|run| run.settle_deadline.take())
            .is_some();
        if settled {
            self.step(Direction::Next).await;
        }
    }

    /// Re-run the pending probe immediately
    async fn refresh(&mut self) {
        let probe = match &self.run {
            Some(run) if run.settle_deadline.is_none() => {
                if let Some(index) = run.parked {
                    self.catalog
                        .step_at(index)
                        .target
                        .required_region()
                        .map(|region| Probe::Target {
                            index,
                            region: region.clone(),
                        })
                } else if run.progress.is_waiting() {
                    run.progress.current_index().and_then(|index| {
                        let step = self.catalog.step_at(index);
                        step.rule.clone().map(|rule| Probe::Rule {
                            step: step.id,
                            rule,
                        })
                    })
                } else {
                    None
                }
            }
            _ => None,
        };

        if let Some(probe) = probe {
            if let Some(hit) = probe.check(self.surface.as_ref(), &self.detector) {
                debug!(?hit, "Refresh satisfied pending probe");
                self.stop_poller().await;
                self.apply_hit(hit).await;
            }
        }
    }

    /// Reconcile an event from the renderer with controller state
    async fn reconcile(&mut self, event: RendererEvent) {
        let direction = match (event.status, event.action) {
            (RendererStatus::Finished, _) => {
                self.end(EndReason::Finished).await;
                return;
            }
            (RendererStatus::Skipped, _) | (_, RendererAction::Close) => {
                self.end(EndReason::Skipped).await;
                return;
            }
            (RendererStatus::Running, RendererAction::Next) => Direction::Next,
            (RendererStatus::Running, RendererAction::Prev) => Direction::Prev,
        };

        let current = self
            .run
            .as_ref()
            .and_then(|run| run.progress.current_index());
        if current != Some(event.index) {
            debug!(
                event_index = event.index,
                current_index = ?current,
                "Ignoring stale renderer event"
            );
            return;
        }
        self.navigate(direction).await;
    }

    async fn end(&mut self, reason: EndReason) {
        self.stop_poller().await;
        match self.run.take() {
            Some(run) => {
                info!(run_id = run.slot.run_id(), %reason, "Tour ended");
                self.last_run = Some((run.slot.run_id(), run.progress.satisfied().collect()));
                // Dropping the run releases the registry slot
                drop(run);
                self.ended = Some(reason);
                self.emit(TourSignal::Ended(reason));
            }
            None => {
                debug!(%reason, "End requested with no active tour");
                if self.ended.is_none() {
                    self.ended = Some(reason);
                }
            }
        }
    }
}
