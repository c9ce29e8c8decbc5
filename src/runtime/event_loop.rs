//! Single-task event loop
//!
//! Every command, lifecycle signal and timer tick is handled on one tokio
//! task that owns the `OverlayContext`. Callers talk to it through a
//! cloneable `RuntimeHandle`.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::context::OverlayContext;
use crate::core::error::{OverlayError, Result};
use crate::display::DisplayEvent;
use crate::gateway::{respond, Caller, Command};
use crate::window::LifecycleEvent;

enum Request {
    Invoke {
        caller: Caller,
        command: Command,
        reply: oneshot::Sender<Result<Value>>,
    },
    Notify {
        caller: Caller,
        command: Command,
    },
    Display(DisplayEvent),
    ToggleClickThroughAll,
    Shutdown {
        reply: oneshot::Sender<usize>,
    },
}

/// The event loop actor
pub struct Runtime {
    context: OverlayContext,
    requests: mpsc::UnboundedReceiver<Request>,
    lifecycle: mpsc::UnboundedReceiver<LifecycleEvent>,
    cancel: CancellationToken,
    topmost_interval: Duration,
    watchdog_interval: Duration,
}

/// Cloneable sender side of the event loop
#[derive(Clone)]
pub struct RuntimeHandle {
    requests: mpsc::UnboundedSender<Request>,
    cancel: CancellationToken,
}

impl Runtime {
    pub fn new(
        context: OverlayContext,
        lifecycle: mpsc::UnboundedReceiver<LifecycleEvent>,
    ) -> (Self, RuntimeHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let topmost_interval = context.config().topmost_interval();
        let watchdog_interval = context.config().watchdog_interval();

        let runtime = Self {
            context,
            requests: rx,
            lifecycle,
            cancel: cancel.clone(),
            topmost_interval,
            watchdog_interval,
        };
        (
            runtime,
            RuntimeHandle {
                requests: tx,
                cancel,
            },
        )
    }

    pub fn context(&self) -> &OverlayContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut OverlayContext {
        &mut self.context
    }

    /// Process requests until shutdown; returns the context for inspection
    pub async fn run(mut self) -> OverlayContext {
        let mut topmost = interval_at(Instant::now() + self.topmost_interval, self.topmost_interval);
        topmost.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watchdog =
            interval_at(Instant::now() + self.watchdog_interval, self.watchdog_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Overlay runtime started (topmost every {:?}, watchdog every {:?})",
            self.topmost_interval,
            self.watchdog_interval
        );

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    tracing::info!("Overlay runtime cancelled");
                    self.context.shutdown();
                    break;
                }
                // Lifecycle first so a close lands before any later command
                Some(event) = self.lifecycle.recv() => {
                    self.context.handle_lifecycle(event);
                }
                _ = topmost.tick() => {
                    self.context.reassert_topmost();
                }
                _ = watchdog.tick() => {
                    self.context.run_memory_watchdog();
                }
                request = self.requests.recv() => {
                    let Some(request) = request else {
                        tracing::info!("All runtime handles dropped");
                        self.context.shutdown();
                        break;
                    };
                    if let Some(reply) = self.handle(request) {
                        self.cancel.cancel();
                        let _ = reply.send(self.context.shutdown());
                        break;
                    }
                }
            }
        }

        // Timers and receivers drop here; later requests see ShuttingDown
        tracing::info!("Overlay runtime stopped");
        self.context
    }

    /// Handle one request; returns the reply channel when it asks to shut down
    fn handle(&mut self, request: Request) -> Option<oneshot::Sender<usize>> {
        match request {
            Request::Invoke {
                caller,
                command,
                reply,
            } => {
                let result = self.context.execute(&caller, command);
                let _ = reply.send(result);
            }
            Request::Notify { caller, command } => {
                if let Err(e) = self.context.execute(&caller, command) {
                    tracing::debug!("Notification from {:?} failed: {}", caller.label, e);
                }
            }
            Request::Display(event) => self.context.handle_display_event(event),
            Request::ToggleClickThroughAll => {
                self.context.toggle_click_through_all();
            }
            Request::Shutdown { reply } => return Some(reply),
        }
        None
    }
}

impl RuntimeHandle {
    /// Token cancelled when the runtime stops; background tasks should watch it
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn submit(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| OverlayError::ShuttingDown)
    }

    /// Run a decoded command and wait for its result
    pub async fn request(&self, caller: Caller, command: Command) -> Result<Value> {
        let (reply, rx) = oneshot::channel();
        self.submit(Request::Invoke {
            caller,
            command,
            reply,
        })?;
        rx.await.map_err(|_| OverlayError::ShuttingDown)?
    }

    /// Gateway entry for request/response channels; always yields a JSON body
    pub async fn invoke(&self, caller: Caller, channel: &str, payload: Value) -> Value {
        let command = match Command::decode(channel, payload) {
            Ok(command) => command,
            Err(e) => return respond(Err(e)),
        };
        respond(self.request(caller, command).await)
    }

    /// Gateway entry for fire-and-forget channels
    pub fn notify(&self, caller: Caller, channel: &str, payload: Value) -> Result<()> {
        let command = Command::decode(channel, payload)?;
        self.submit(Request::Notify { caller, command })
    }

    pub fn ingest(&self, sample: Value) -> Result<()> {
        self.submit(Request::Notify {
            caller: Caller::host(),
            command: Command::TelemetryIngest { sample },
        })
    }

    pub fn set_connectivity(&self, connected: bool) -> Result<()> {
        self.submit(Request::Notify {
            caller: Caller::host(),
            command: Command::TelemetrySetConnectivity { connected },
        })
    }

    /// Forward a hot-plug event; false once the runtime is gone
    pub fn display_event(&self, event: DisplayEvent) -> bool {
        self.submit(Request::Display(event)).is_ok()
    }

    pub fn toggle_click_through_all(&self) -> Result<()> {
        self.submit(Request::ToggleClickThroughAll)
    }

    /// Close every window, stop timers and background tasks; returns windows closed
    pub async fn shutdown(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.submit(Request::Shutdown { reply })?;
        rx.await.map_err(|_| OverlayError::ShuttingDown)
    }

    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }
}
