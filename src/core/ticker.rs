// src/core/ticker.rs — The single ticking authority
//
// Exactly one ticking task may exist in the process, no matter how many
// presentation surfaces display cooking state. Several mounted surfaces
// each driving their own interval once made timers run 2-3x fast; this
// module is the fix. Surfaces call `ensure_running` freely; only the
// first call while no ticker lives spawns one.
//
// The task sleeps between ticks only while there is ticking work (a
// session plus a non-empty timer map); otherwise it parks on the store's
// change feed and wakes when work appears.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::core::store::SessionStore;

pub struct TickingAuthority {
    store: Arc<SessionStore>,
    tick_interval: Duration,
    inner: Mutex<Option<TickerTask>>,
}

struct TickerTask {
    handle: JoinHandle<()>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TickingAuthority {
    pub fn new(store: Arc<SessionStore>, tick_interval: Duration) -> Self {
        Self {
            store,
            tick_interval,
            inner: Mutex::new(None),
        }
    }

    /// Spawn the ticking task if none is alive. Safe to call from every
    /// surface on mount; repeated calls are no-ops while a ticker lives.
    pub fn ensure_running(&self) {
        let mut inner = self.inner.lock().expect("ticker state poisoned");
        if let Some(task) = inner.as_ref() {
            if !task.handle.is_finished() {
                return;
            }
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let store = self.store.clone();
        let interval = self.tick_interval;
        tracing::debug!("Ticking authority started");
        let handle = tokio::spawn(run_ticker(store, interval, shutdown_rx));
        *inner = Some(TickerTask {
            handle,
            shutdown_tx,
        });
    }

    /// Tear the ticking task down (session end, app unmount, navigation).
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock().expect("ticker state poisoned");
        if let Some(task) = inner.take() {
            let _ = task.shutdown_tx.send(());
            task.handle.abort();
            tracing::debug!("Ticking authority stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        let inner = self.inner.lock().expect("ticker state poisoned");
        inner
            .as_ref()
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for TickingAuthority {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(task) = inner.take() {
                let _ = task.shutdown_tx.send(());
                task.handle.abort();
            }
        }
    }
}

async fn run_ticker(
    store: Arc<SessionStore>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut changes = store.subscribe();

    loop {
        // Park until there is something to tick.
        while !store.has_ticking_work() {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        // Store dropped; nothing left to drive.
                        return;
                    }
                }
                _ = shutdown_rx.recv() => return,
            }
        }

        // Active phase: one decrement per second for every running timer.
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if !store.has_ticking_work() {
                        break;
                    }
                    store.tick_timers();
                }
                _ = shutdown_rx.recv() => return,
            }
        }
    }
}
