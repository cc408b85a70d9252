//! System overlay window
//!
//! The window surface is owned by one dedicated thread ("overlay-ui"). Every
//! add/remove goes through that thread; async callers wait for the outcome
//! with a bounded timeout, and a timeout counts as failure. The UI thread runs
//! on wall-clock time, so the wait is a blocking receive on the blocking pool.

use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::OverlayError;

/// Default wait for a window operation
pub const DEFAULT_OVERLAY_TIMEOUT: Duration = Duration::from_millis(700);

/// Window types, in the order they are attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowKind {
    ApplicationOverlay,
    ApplicationPanel,
    AttachedDialog,
    Phone,
    SystemAlert,
}

impl WindowKind {
    pub const PREFERENCE: [WindowKind; 5] = [
        WindowKind::ApplicationOverlay,
        WindowKind::ApplicationPanel,
        WindowKind::AttachedDialog,
        WindowKind::Phone,
        WindowKind::SystemAlert,
    ];
}

/// How the blackout window looks and behaves
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    /// 0.0 transparent .. 1.0 solid black
    pub opacity: f32,
    /// A focusable window takes audio focus away from media underneath
    pub focusable: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            focusable: true,
        }
    }
}

impl OverlayStyle {
    /// Background colour as ARGB, always black
    pub fn argb(&self) -> u32 {
        let alpha = (255.0 * self.opacity.clamp(0.0, 1.0)) as u32;
        alpha << 24
    }
}

/// Window-manager access. Only ever called from the overlay thread.
pub trait OverlaySurface: Send + 'static {
    /// Whether the app may draw over other apps
    fn has_permission(&self) -> bool;

    /// Add the blackout window with the given type
    fn attach(&mut self, kind: WindowKind, style: &OverlayStyle) -> Result<(), OverlayError>;

    /// Remove the blackout window
    fn detach(&mut self) -> Result<(), OverlayError>;

    fn is_attached(&self) -> bool;
}

type Reply = mpsc::SyncSender<bool>;

enum Command {
    HasPermission(Reply),
    Show(OverlayStyle, Reply),
    Hide(Reply),
    IsShowing(Reply),
}

/// Handle to the overlay thread. Cheap to clone; the thread exits and
/// removes any window once every handle is dropped.
#[derive(Debug, Clone)]
pub struct OverlayHandle {
    tx: mpsc::Sender<Command>,
}

impl OverlayHandle {
    /// Move `surface` onto its own thread
    pub fn spawn<S: OverlaySurface>(surface: S) -> Result<Self, OverlayError> {
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("overlay-ui".into())
            .spawn(move || run_surface(surface, rx))
            .map_err(|e| OverlayError::Thread(e.to_string()))?;
        Ok(Self { tx })
    }

    /// Whether drawing over other apps is allowed; `false` on timeout
    pub async fn has_permission(&self, timeout: Duration) -> bool {
        self.request(Command::HasPermission, timeout).await.unwrap_or(false)
    }

    /// Show the overlay; `true` only if a window is confirmed up
    pub async fn show(&self, style: OverlayStyle, timeout: Duration) -> bool {
        match self.request(|reply| Command::Show(style, reply), timeout).await {
            Some(shown) => shown,
            None => {
                // A late attach must not outlive the failure we report
                let (reply, _) = mpsc::sync_channel(1);
                let _ = self.tx.send(Command::Hide(reply));
                false
            }
        }
    }

    /// Hide the overlay; `true` if no window remains
    pub async fn hide(&self, timeout: Duration) -> bool {
        self.request(Command::Hide, timeout).await.unwrap_or(false)
    }

    pub async fn is_showing(&self, timeout: Duration) -> bool {
        self.request(Command::IsShowing, timeout).await.unwrap_or(false)
    }

    async fn request(
        &self,
        command: impl FnOnce(Reply) -> Command,
        timeout: Duration,
    ) -> Option<bool> {
        let (reply, rx) = mpsc::sync_channel(1);
        if self.tx.send(command(reply)).is_err() {
            error!("Overlay thread is gone");
            return None;
        }

        match tokio::task::spawn_blocking(move || rx.recv_timeout(timeout)).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(mpsc::RecvTimeoutError::Timeout)) => {
                warn!("Overlay operation timed out after {}ms", timeout.as_millis());
                None
            }
            Ok(Err(mpsc::RecvTimeoutError::Disconnected)) => {
                error!("Overlay operation dropped without a result");
                None
            }
            Err(e) => {
                error!("Overlay wait failed: {}", e);
                None
            }
        }
    }
}

fn run_surface<S: OverlaySurface>(mut surface: S, rx: mpsc::Receiver<Command>) {
    debug!("Overlay thread started");

    while let Ok(command) = rx.recv() {
        match command {
            Command::HasPermission(reply) => {
                let _ = reply.send(surface.has_permission());
            }
            Command::Show(style, reply) => {
                let _ = reply.send(show_on_surface(&mut surface, &style));
            }
            Command::Hide(reply) => {
                let _ = reply.send(hide_on_surface(&mut surface));
            }
            Command::IsShowing(reply) => {
                let _ = reply.send(surface.is_attached());
            }
        }
    }

    if surface.is_attached() {
        hide_on_surface(&mut surface);
    }
    debug!("Overlay thread stopped");
}

fn show_on_surface<S: OverlaySurface>(surface: &mut S, style: &OverlayStyle) -> bool {
    if surface.is_attached() {
        debug!("Overlay is already showing");
        return true;
    }
    if !surface.has_permission() {
        debug!("No permission to draw overlays");
        return false;
    }

    let mut tried = Vec::new();
    for kind in WindowKind::PREFERENCE {
        match surface.attach(kind, style) {
            Ok(()) => {
                info!("Overlay shown with {:?} (opacity={})", kind, style.opacity);
                return true;
            }
            Err(e) => {
                tried.push(format!("{:?} -> {}", kind, e));
                // Clear any partially added view before the next attempt
                if surface.is_attached() {
                    let _ = surface.detach();
                }
            }
        }
    }

    error!("Failed to add overlay; tried: {}", tried.join("; "));
    false
}

fn hide_on_surface<S: OverlaySurface>(surface: &mut S) -> bool {
    if !surface.is_attached() {
        return true;
    }
    match surface.detach() {
        Ok(()) => {
            info!("Overlay hidden");
            true
        }
        Err(e) => {
            error!("Removing overlay failed: {}", e);
            false
        }
    }
}
