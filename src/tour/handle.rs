//! Cloneable handle for driving a spawned [`TourController`](super::TourController)

use tokio::sync::{mpsc, oneshot};

use super::controller::ProgressSnapshot;
use super::error::TourError;
use super::types::{Direction, EndReason, RendererEvent};

/// Requests funneled into the controller's event loop
#[derive(Debug)]
pub(crate) enum TourEvent {
    Start(oneshot::Sender<Result<(), TourError>>),
    Navigate(Direction),
    Renderer(RendererEvent),
    Refresh,
    End(EndReason, oneshot::Sender<()>),
    Snapshot(oneshot::Sender<ProgressSnapshot>),
}

/// Host and renderer side of a running controller.
///
/// Requests are applied in the order they are sent. Fire-and-forget calls
/// (`navigate`, `renderer_event`, `refresh`) are observed by any later
/// awaited call such as [`TourHandle::progress`].
#[derive(Debug, Clone)]
pub struct TourHandle {
    events: mpsc::UnboundedSender<TourEvent>,
}

impl TourHandle {
    pub(crate) fn new(events: mpsc::UnboundedSender<TourEvent>) -> Self {
        Self { events }
    }

    fn send(&self, event: TourEvent) -> Result<(), TourError> {
        self.events
            .send(event)
            .map_err(|_| TourError::ControllerGone)
    }

    /// Begin a run at step 0
    pub async fn start(&self) -> Result<(), TourError> {
        let (tx, rx) = oneshot::channel();
        self.send(TourEvent::Start(tx))?;
        rx.await.map_err(|_| TourError::ControllerGone)?
    }

    /// Request a move; ignored while the current step is waiting
    pub fn navigate(&self, direction: Direction) -> Result<(), TourError> {
        self.send(TourEvent::Navigate(direction))
    }

    pub fn next(&self) -> Result<(), TourError> {
        self.navigate(Direction::Next)
    }

    pub fn prev(&self) -> Result<(), TourError> {
        self.navigate(Direction::Prev)
    }

    /// Forward a raw event from the tour renderer
    pub fn renderer_event(&self, event: RendererEvent) -> Result<(), TourError> {
        self.send(TourEvent::Renderer(event))
    }

    /// Tell the controller the editor changed; pending checks run now
    pub fn refresh(&self) -> Result<(), TourError> {
        self.send(TourEvent::Refresh)
    }

    /// Terminate the run. Returns once any poller has fully stopped.
    pub async fn end(&self, reason: EndReason) -> Result<(), TourError> {
        let (tx, rx) = oneshot::channel();
        self.send(TourEvent::End(reason, tx))?;
        rx.await.map_err(|_| TourError::ControllerGone)
    }

    pub async fn finish(&self) -> Result<(), TourError> {
        self.end(EndReason::Finished).await
    }

    pub async fn skip(&self) -> Result<(), TourError> {
        self.end(EndReason::Skipped).await
    }

    pub async fn cancel(&self) -> Result<(), TourError> {
        self.end(EndReason::Cancelled).await
    }

    /// Current progress as seen by the controller
    pub async fn progress(&self) -> Result<ProgressSnapshot, TourError> {
        let (tx, rx) = oneshot::channel();
        self.send(TourEvent::Snapshot(tx))?;
        rx.await.map_err(|_| TourError::ControllerGone)
    }
}
