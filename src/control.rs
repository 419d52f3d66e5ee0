//! Control surface used by the application to run the overlay host.
//!
//! The host runs on a dedicated thread; it is the only place window-manager
//! calls are made. `start` and `stop` return futures so callers never block
//! their own event loop while the host promotes itself or tears down.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use futures::StreamExt;
use futures::channel::{mpsc, oneshot};
use futures::future::{self, BoxFuture, FutureExt, Shared};

use crate::config::OverlayConfig;
use crate::drivers::HostDrivers;
use crate::gesture::TouchEvent;
use crate::overlay::sheet::SheetHit;
use crate::service::BackgroundServiceHost;
use crate::store::ServiceStore;

/// Input for the host, already resolved to overlay semantics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    BubbleTouch(TouchEvent),
    SheetHit(SheetHit),
    DismissSheet,
    /// The display was reconfigured; views may have been dropped.
    DisplayChanged,
    OpenPicker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Stop,
    OpenPicker,
}

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "stop" => Ok(Self::Stop),
            "open-picker" => Ok(Self::OpenPicker),
            other => Err(format!("unknown command: {other:?}")),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stop => "stop",
            Self::OpenPicker => "open-picker",
        })
    }
}

enum ControlMessage {
    Event(HostEvent),
    Stop(oneshot::Sender<bool>),
}

/// Builds the drivers on the host thread.
pub type DriverFactory = Arc<dyn Fn() -> HostDrivers + Send + Sync>;

/// Cloneable sender for host events.
#[derive(Clone)]
pub struct HostSender {
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl HostSender {
    /// Returns false once the host is gone.
    pub fn send(&self, event: HostEvent) -> bool {
        self.tx.unbounded_send(ControlMessage::Event(event)).is_ok()
    }
}

struct Runtime {
    tx: mpsc::UnboundedSender<ControlMessage>,
    /// Promotion result, shared by every `start` issued while it is pending.
    started: Shared<BoxFuture<'static, bool>>,
    _thread: JoinHandle<()>,
}

impl Runtime {
    fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

pub struct OverlayControl {
    factory: DriverFactory,
    store: ServiceStore,
    config: OverlayConfig,
    runtime: Option<Runtime>,
}

impl OverlayControl {
    pub fn new(factory: DriverFactory, store: ServiceStore, config: OverlayConfig) -> Self {
        Self {
            factory,
            store,
            config,
            runtime: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.runtime.as_ref().is_some_and(Runtime::is_alive)
    }

    pub fn sender(&self) -> Option<HostSender> {
        self.runtime
            .as_ref()
            .filter(|rt| rt.is_alive())
            .map(|rt| HostSender { tx: rt.tx.clone() })
    }

    /// Starts the host. Resolves to `true` once it runs in the foreground,
    /// `false` if it could not be promoted. Calls made while a promotion is
    /// pending resolve to that promotion's result.
    pub fn start(&mut self) -> BoxFuture<'static, bool> {
        if let Some(rt) = self.runtime.as_ref().filter(|rt| rt.is_alive()) {
            return rt.started.clone().boxed();
        }
        let (tx, rx) = mpsc::unbounded();
        let (reply_tx, reply_rx) = oneshot::channel();
        let factory = Arc::clone(&self.factory);
        let store = self.store.clone();
        let config = self.config.clone();
        let spawned = thread::Builder::new()
            .name("overlay-host".into())
            .spawn(move || host_main(factory, store, config, rx, reply_tx));
        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                tracing::error!("could not spawn overlay host: {err}");
                return future::ready(false).boxed();
            }
        };

        let store = self.store.clone();
        let started = async move {
            let started = reply_rx.await.unwrap_or(false);
            if started && let Err(err) = store.set_enabled(true) {
                tracing::warn!("could not persist enablement flag: {err}");
            }
            started
        }
        .boxed()
        .shared();
        self.runtime = Some(Runtime {
            tx,
            started: started.clone(),
            _thread: thread,
        });
        started.boxed()
    }

    /// Stops the host if it runs and clears the enablement flag.
    pub fn stop(&mut self) -> BoxFuture<'static, bool> {
        let store = self.store.clone();
        let ack = self.runtime.take().filter(Runtime::is_alive).and_then(|rt| {
            let (ack_tx, ack_rx) = oneshot::channel();
            rt.tx
                .unbounded_send(ControlMessage::Stop(ack_tx))
                .ok()
                .map(|()| ack_rx)
        });
        async move {
            if let Some(ack) = ack {
                // A dropped sender means the host already exited.
                let _ = ack.await;
            }
            match store.set_enabled(false) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!("could not clear enablement flag: {err}");
                    false
                }
            }
        }
        .boxed()
    }
}

impl Drop for OverlayControl {
    fn drop(&mut self) {
        if let Some(rt) = self.runtime.take() {
            // Closing the channel ends the host loop, which stops the host.
            rt.tx.close_channel();
        }
    }
}

fn host_main(
    factory: DriverFactory,
    store: ServiceStore,
    config: OverlayConfig,
    mut rx: mpsc::UnboundedReceiver<ControlMessage>,
    reply: oneshot::Sender<bool>,
) {
    let mut host = BackgroundServiceHost::new(factory(), store, config);
    if host.start().is_err() {
        // close before replying so `is_running` is already false for the caller
        rx.close();
        drop(rx);
        let _ = reply.send(false);
        return;
    }
    let _ = reply.send(true);

    futures::executor::block_on(async {
        while let Some(message) = rx.next().await {
            match message {
                ControlMessage::Event(event) => host.handle(event),
                ControlMessage::Stop(ack) => {
                    rx.close();
                    host.stop();
                    let _ = ack.send(true);
                    return;
                }
            }
        }
        host.stop();
    });
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use futures::executor::block_on;

    use super::*;
    use crate::drivers::memory::MemoryDrivers;
    use crate::window::ScreenSize;

    fn control(mem: &MemoryDrivers, dir: &tempfile::TempDir) -> (ServiceStore, OverlayControl) {
        let store = ServiceStore::open(dir.path().join("svc.json"));
        let drivers = mem.clone();
        let factory: DriverFactory = Arc::new(move || drivers.host_drivers());
        let config = OverlayConfig {
            density: 1.0,
            picker_uri: None,
            ..OverlayConfig::default()
        };
        (store.clone(), OverlayControl::new(factory, store, config))
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn start_sets_flag_and_stop_clears_it() {
        let dir = tempfile::tempdir().unwrap();
        let mem = MemoryDrivers::new(34, ScreenSize::new(400, 800));
        let (store, mut control) = control(&mem, &dir);

        assert!(block_on(control.start()));
        assert!(store.enabled());
        assert!(control.is_running());
        assert_eq!(mem.windows.bubble_count(), 1);
        assert!(block_on(control.start()));
        assert_eq!(mem.windows.bubble_count(), 1);

        assert!(block_on(control.stop()));
        assert!(!store.enabled());
        assert!(!control.is_running());
        assert!(mem.windows.is_empty());
        assert!(block_on(control.stop()));
    }

    #[test]
    fn failed_promotion_resolves_false() {
        let dir = tempfile::tempdir().unwrap();
        let mem = MemoryDrivers::new(34, ScreenSize::new(400, 800));
        mem.notifications.refuse(Some("denied"));
        let (store, mut control) = control(&mem, &dir);

        assert!(!block_on(control.start()));
        assert!(!store.enabled());
        assert!(!control.is_running());
        assert!(control.sender().is_none());

        mem.notifications.refuse(None);
        assert!(block_on(control.start()));
    }

    #[test]
    fn start_during_pending_promotion_shares_its_result() {
        let dir = tempfile::tempdir().unwrap();
        let mem = MemoryDrivers::new(34, ScreenSize::new(400, 800));
        mem.notifications.refuse(Some("denied"));
        mem.notifications.delay(Duration::from_millis(200));
        let (store, mut control) = control(&mem, &dir);

        let first = control.start();
        let second = control.start();
        assert!(!block_on(first));
        assert!(!block_on(second));
        assert!(!control.is_running());
        assert!(!store.enabled());
    }

    #[test]
    fn start_during_pending_promotion_runs_one_host() {
        let dir = tempfile::tempdir().unwrap();
        let mem = MemoryDrivers::new(34, ScreenSize::new(400, 800));
        mem.notifications.delay(Duration::from_millis(100));
        let (store, mut control) = control(&mem, &dir);

        let first = control.start();
        let second = control.start();
        assert!(block_on(second));
        assert!(block_on(first));
        assert!(store.enabled());
        assert_eq!(mem.windows.bubble_count(), 1);
        assert_eq!(mem.notifications.active().len(), 1);
    }

    #[test]
    fn events_reach_the_host_thread() {
        let dir = tempfile::tempdir().unwrap();
        let mem = MemoryDrivers::new(34, ScreenSize::new(400, 800));
        let (_store, mut control) = control(&mem, &dir);
        assert!(block_on(control.start()));

        let sender = control.sender().unwrap();
        assert!(sender.send(HostEvent::OpenPicker));
        assert!(wait_for(|| mem.windows.sheet().is_some()));
        assert!(sender.send(HostEvent::DismissSheet));
        assert!(wait_for(|| mem.windows.sheet().is_none()));

        block_on(control.stop());
        assert!(!sender.send(HostEvent::OpenPicker));
    }

    #[test]
    fn dropping_control_stops_host() {
        let dir = tempfile::tempdir().unwrap();
        let mem = MemoryDrivers::new(34, ScreenSize::new(400, 800));
        let (_store, mut control) = control(&mem, &dir);
        assert!(block_on(control.start()));
        drop(control);
        assert!(wait_for(|| mem.windows.is_empty()));
        assert!(wait_for(|| mem.notifications.active().is_empty()));
    }
}
