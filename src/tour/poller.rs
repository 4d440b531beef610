//! Scoped polling loop for gated waits.
//!
//! A [`Poller`] re-reads the editor on a fixed cadence until its probe
//! succeeds, reports once, and exits. The controller owns at most one at a
//! time and always stops it before leaving the state that started it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::detector::ActionDetector;
use super::rule::DetectionRule;
use super::surface::EditorSurface;
use super::types::{RegionRef, StepId};

/// What a poller is waiting for
#[derive(Debug, Clone)]
pub enum Probe {
    /// A gated step's detection rule to be satisfied
    Rule { step: StepId, rule: DetectionRule },
    /// A step's target region to be rendered
    Target { index: usize, region: RegionRef },
}

impl Probe {
    /// Run the probe once against the current editor state
    pub fn check(&self, surface: &dyn EditorSurface, detector: &ActionDetector) -> Option<ProbeHit> {
        match self {
            Probe::Rule { step, rule } => detector
                .evaluate_surface(rule, surface)
                .then_some(ProbeHit::Satisfied(*step)),
            Probe::Target { index, region } => surface
                .is_rendered(region)
                .then_some(ProbeHit::Rendered(*index)),
        }
    }
}

/// A successful probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeHit {
    Satisfied(StepId),
    Rendered(usize),
}

/// Message from a poller back to its controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Identifies the poller that produced this; stale generations are dropped
    pub generation: u64,
    pub hit: ProbeHit,
}

/// Handle to a running poll loop
#[derive(Debug)]
pub struct Poller {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start polling; the first check happens one `interval` from now
    pub fn spawn(
        probe: Probe,
        generation: u64,
        interval: Duration,
        surface: Arc<dyn EditorSurface>,
        detector: Arc<ActionDetector>,
        outcomes: mpsc::UnboundedSender<PollOutcome>,
    ) -> Self {
        tracing::debug!(generation, probe = ?probe, "Poller started");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let Some(hit) = probe.check(surface.as_ref(), &detector) {
                    let _ = outcomes.send(PollOutcome { generation, hit });
                    break;
                }
            }
        });

        Self {
            generation,
            handle: Some(handle),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop the loop and wait until it can no longer run
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            // Cancelled or already finished; either way it is gone
            let _ = handle.await;
        }
        tracing::debug!(generation = self.generation, "Poller stopped");
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tour::surface::InMemorySurface;

    const CANVAS: &str = "canvas";

    fn spawn_rule_poller(
        surface: &InMemorySurface,
        interval: Duration,
    ) -> (Poller, mpsc::UnboundedReceiver<PollOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let probe = Probe::Rule {
            step: 1,
            rule: DetectionRule::in_region(CANVAS).concept("repetir"),
        };
        let poller = Poller::spawn(
            probe,
            7,
            interval,
            Arc::new(surface.clone()),
            Arc::new(ActionDetector::new()),
            tx,
        );
        (poller, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_once_when_satisfied() {
        let surface = InMemorySurface::new();
        let (poller, mut rx) = spawn_rule_poller(&surface, Duration::from_millis(500));
        assert_eq!(poller.generation(), 7);

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(rx.try_recv().is_err());

        surface.set_region_text(CANVAS, "repeat 5 times");
        let outcome = rx.recv().await.unwrap();
        assert_eq!(
            outcome,
            PollOutcome {
                generation: 7,
                hit: ProbeHit::Satisfied(1)
            }
        );

        // The loop exited after reporting
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_queries() {
        let surface = InMemorySurface::new();
        let (poller, mut rx) = spawn_rule_poller(&surface, Duration::from_millis(500));

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert!(surface.query_count() > 0);

        poller.stop().await;
        let after_stop = surface.query_count();
        surface.set_region_text(CANVAS, "repetir");
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(surface.query_count(), after_stop);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_loop() {
        let surface = InMemorySurface::new();
        let (poller, mut rx) = spawn_rule_poller(&surface, Duration::from_millis(500));
        drop(poller);

        surface.set_region_text(CANVAS, "repetir");
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_target_probe() {
        let surface = InMemorySurface::new();
        let detector = ActionDetector::new();
        let probe = Probe::Target {
            index: 3,
            region: RegionRef::new("console"),
        };

        assert_eq!(probe.check(&surface, &detector), None);
        surface.set_region_text("console", "");
        assert_eq!(probe.check(&surface, &detector), Some(ProbeHit::Rendered(3)));
    }
}
