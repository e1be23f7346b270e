// src/core/notify.rs — Notification effects for timer transitions
//
// A pure observer: consumes the store's transition feed and drives an
// alert sink. Produces no state the rest of the core reads. Each alert
// fires at most once per timer instance — surfaces re-rendering or
// re-subscribing must never replay a chime — so the layer keeps its own
// "already notified" sets, cleared only when a timer is reset or leaves
// the active set.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::core::timer::{TimerKey, TimerTransition};
use crate::infra::config::NotificationsConfig;

/// Where alerts land: audio, vibration, and toast live behind this seam
/// so the core stays testable without a device.
pub trait AlertSink: Send + Sync {
    /// A running timer crossed into the urgent window. `audible` is
    /// already gated on config, global mute, and the timer's own flag.
    fn urgent_alert(&self, key: TimerKey, remaining_secs: u32, audible: bool);

    /// A timer reached zero.
    fn completion_alert(&self, key: TimerKey, audible: bool);
}

pub struct NotificationEffects {
    sink: Arc<dyn AlertSink>,
    config: NotificationsConfig,
    global_mute: bool,
    urgent_fired: HashSet<TimerKey>,
    completion_fired: HashSet<TimerKey>,
}

impl NotificationEffects {
    pub fn new(sink: Arc<dyn AlertSink>, config: NotificationsConfig) -> Self {
        Self {
            sink,
            config,
            global_mute: false,
            urgent_fired: HashSet::new(),
            completion_fired: HashSet::new(),
        }
    }

    /// Silence audio everywhere; visual alerts still fire.
    pub fn set_global_mute(&mut self, muted: bool) {
        self.global_mute = muted;
    }

    pub fn is_globally_muted(&self) -> bool {
        self.global_mute
    }

    fn audible(&self, timer_muted: bool) -> bool {
        self.config.sound && !self.global_mute && !timer_muted
    }

    /// Apply one transition. Duplicate urgency/completion events for the
    /// same timer instance are swallowed here regardless of how the feed
    /// delivered them.
    pub fn handle(&mut self, transition: &TimerTransition) {
        match *transition {
            TimerTransition::Urgent {
                key,
                remaining_secs,
                muted,
            } => {
                if self.urgent_fired.insert(key) && self.config.enabled {
                    tracing::debug!(%key, remaining_secs, "Urgent alert");
                    self.sink.urgent_alert(key, remaining_secs, self.audible(muted));
                }
            }
            TimerTransition::Completed { key, muted } => {
                if self.completion_fired.insert(key) && self.config.enabled {
                    tracing::debug!(%key, "Completion alert");
                    self.sink.completion_alert(key, self.audible(muted));
                }
            }
            TimerTransition::Reset { key } | TimerTransition::Destroyed { key } => {
                self.urgent_fired.remove(&key);
                self.completion_fired.remove(&key);
            }
        }
    }

    /// Drive the effects from a store transition feed until it closes.
    pub fn spawn(mut self, mut rx: broadcast::Receiver<TimerTransition>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(transition) => self.handle(&transition),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Notification feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
