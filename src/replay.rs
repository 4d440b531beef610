//! Scripted editor sessions played against a live controller.
//!
//! A script is a TOML file with an optional `catalog` and a list of
//! `[[event]]` tables. Each event waits `after_ms` after the previous one,
//! then applies its action to an in-memory editor or to the tour itself:
//!
//! ```toml
//! catalog = "interactive"
//!
//! [[event]]
//! after_ms = 0
//! type = "set_region"
//! region = "h1"
//! text = "PIK Visual"
//!
//! [[event]]
//! after_ms = 100
//! type = "navigate"
//! action = "next"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::example;
use crate::tour::builtin::CatalogKind;
use crate::tour::{
    InMemorySurface, ProgressSnapshot, RegionRef, RendererAction, RendererEvent, RendererStatus,
    StepCatalog, TourController, TourError, TourHandle, TourRegistry, TourSignal, TourTiming,
};

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("failed to read replay script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid replay script: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Tour(#[from] TourError),
}

/// One scripted action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayAction {
    /// Render a region with the given text
    SetRegion { region: String, text: String },
    /// Unmount a region
    RemoveRegion { region: String },
    /// Replace the generated program text
    SetCode { text: String },
    /// Renderer button press; `index` defaults to the last announced step
    Navigate {
        action: RendererAction,
        #[serde(default)]
        status: Option<RendererStatus>,
        #[serde(default)]
        index: Option<usize>,
    },
    Skip,
    Finish,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayEvent {
    /// Delay after the previous event
    #[serde(default)]
    pub after_ms: u64,
    #[serde(flatten)]
    pub action: ReplayAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayScript {
    /// Built-in tour to play; the configured one when absent
    #[serde(default)]
    pub catalog: Option<CatalogKind>,
    #[serde(default, rename = "event")]
    pub events: Vec<ReplayEvent>,
}

impl ReplayScript {
    pub fn parse(text: &str) -> Result<Self, ReplayError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let text = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }
}

/// What a replay produced
#[derive(Debug, Clone)]
pub struct ReplayReport {
    /// Every signal in emission order
    pub signals: Vec<TourSignal>,
    /// Controller state after the last scripted event
    pub progress: ProgressSnapshot,
    /// Whether the checkpoint seeded the example program
    pub seeded: bool,
}

/// Host side of a replay: tracks the announced step and seeds the example
struct Observer<F> {
    surface: InMemorySurface,
    current: usize,
    seeded: bool,
    signals: Vec<TourSignal>,
    on_signal: F,
}

impl<F: FnMut(&TourSignal)> Observer<F> {
    fn observe(&mut self, signal: TourSignal, tour: &TourHandle) -> Result<(), ReplayError> {
        (self.on_signal)(&signal);
        match &signal {
            TourSignal::StepChanged(view) => self.current = view.current_index,
            TourSignal::Checkpoint { .. } => {
                example::seed(&self.surface);
                self.seeded = true;
                tour.refresh()?;
            }
            TourSignal::Satisfied { .. } | TourSignal::Ended(_) => {}
        }
        self.signals.push(signal);
        Ok(())
    }

    fn drain(
        &mut self,
        signals: &mut mpsc::UnboundedReceiver<TourSignal>,
        tour: &TourHandle,
    ) -> Result<(), ReplayError> {
        while let Ok(signal) = signals.try_recv() {
            self.observe(signal, tour)?;
        }
        Ok(())
    }
}

/// Plays scripts against a fresh controller and in-memory editor
pub struct ReplayRunner {
    catalog: StepCatalog,
    timing: TourTiming,
    registry: Arc<TourRegistry>,
}

impl ReplayRunner {
    pub fn new(catalog: StepCatalog) -> Self {
        Self {
            catalog,
            timing: TourTiming::default(),
            registry: TourRegistry::global(),
        }
    }

    pub fn with_timing(mut self, timing: TourTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_registry(mut self, registry: Arc<TourRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Run `script`, calling `on_signal` for every signal as it arrives
    pub async fn run<F>(
        &self,
        script: &ReplayScript,
        on_signal: F,
    ) -> Result<ReplayReport, ReplayError>
    where
        F: FnMut(&TourSignal),
    {
        let surface = InMemorySurface::new();
        let (tx, mut signals) = mpsc::unbounded_channel();
        let tour = TourController::new(self.catalog.clone(), Arc::new(surface.clone()), tx)
            .with_timing(self.timing)
            .with_registry(Arc::clone(&self.registry))
            .spawn();

        let mut observer = Observer {
            surface: surface.clone(),
            current: 0,
            seeded: false,
            signals: Vec::new(),
            on_signal,
        };

        info!(events = script.events.len(), "Starting replay");
        tour.start().await?;

        for (n, event) in script.events.iter().enumerate() {
            let deadline = Instant::now() + Duration::from_millis(event.after_ms);
            loop {
                tokio::select! {
                    Some(signal) = signals.recv() => observer.observe(signal, &tour)?,
                    () = tokio::time::sleep_until(deadline) => break,
                }
            }
            observer.drain(&mut signals, &tour)?;

            debug!(event = n, action = ?event.action, "Replaying event");
            apply(&tour, &surface, &event.action, observer.current).await?;
        }

        // The round trip guarantees every earlier signal is already queued
        let progress = tour.progress().await?;
        observer.drain(&mut signals, &tour)?;

        if progress.phase.is_active() {
            tour.cancel().await?;
            observer.drain(&mut signals, &tour)?;
        }

        info!(phase = ?progress.phase, "Replay complete");
        Ok(ReplayReport {
            signals: observer.signals,
            progress,
            seeded: observer.seeded,
        })
    }
}

async fn apply(
    tour: &TourHandle,
    surface: &InMemorySurface,
    action: &ReplayAction,
    current: usize,
) -> Result<(), ReplayError> {
    match action {
        ReplayAction::SetRegion { region, text } => surface.set_region_text(region.as_str(), text),
        ReplayAction::RemoveRegion { region } => surface.remove_region(&RegionRef::new(region.as_str())),
        ReplayAction::SetCode { text } => surface.set_generated_code(text),
        ReplayAction::Navigate {
            action,
            status,
            index,
        } => tour.renderer_event(RendererEvent {
            status: status.unwrap_or_default(),
            action: *action,
            index: index.unwrap_or(current),
        })?,
        ReplayAction::Skip => tour.skip().await?,
        ReplayAction::Finish => tour.finish().await?,
        ReplayAction::Refresh => tour.refresh()?,
    }
    Ok(())
}

/// One-line description of a signal for terminal output
pub fn describe(signal: &TourSignal) -> String {
    match signal {
        TourSignal::StepChanged(view) => {
            let title = view
                .steps
                .get(view.current_index)
                .and_then(|step| step.content.lines().next())
                .unwrap_or_default();
            let waiting = if view.is_waiting { " [waiting]" } else { "" };
            format!(
                "step {}/{}{}: {}",
                view.current_index + 1,
                view.steps.len(),
                waiting,
                title
            )
        }
        TourSignal::Satisfied { step } => format!("step {} satisfied", step + 1),
        TourSignal::Checkpoint { step } => format!("checkpoint at step {}", step + 1),
        TourSignal::Ended(reason) => format!("tour {reason}"),
    }
}
