// src/core/recovery.rs — Local/remote session reconciliation
//
// Device storage can hold a session fragment (ids only) across reloads
// and devices while the authoritative status, step, and timers live
// server-side. This coordinator is the single place the two meet: it runs
// once per authentication/visibility transition and either restores a
// real session or discards the stale fragment, so a "Continue Cooking"
// offer can never point at a session that finished somewhere else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::core::store::SessionStore;
use crate::infra::errors::SessionError;

/// What kind of surface the user is on; decides the handoff form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceClass {
    Desktop,
    Mobile,
}

/// The signal sent to presentation: show cooking UI in this form. An
/// explicit handoff, not a direct UI mutation — presentation stays
/// swappable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceHandoff {
    /// Desktop: the docked cooking panel.
    Docked,
    /// Everything else: the compact bar.
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// This transition was already reconciled; nothing done.
    AlreadySynced,
    /// The store held a complete session; trusted as-is.
    TrustedLocal,
    /// A server-side session was restored and presentation signaled.
    Restored(SurfaceHandoff),
    /// Nothing server-side; any stale fragment was discarded.
    NoSession,
}

pub struct RecoveryCoordinator {
    store: Arc<SessionStore>,
    synced: AtomicBool,
    handoff_tx: watch::Sender<Option<SurfaceHandoff>>,
}

impl RecoveryCoordinator {
    pub fn new(store: Arc<SessionStore>) -> Self {
        let (handoff_tx, _) = watch::channel(None);
        Self {
            store,
            synced: AtomicBool::new(false),
            handoff_tx,
        }
    }

    /// Presentation subscribes here and renders the docked panel or the
    /// compact bar when a handoff arrives.
    pub fn subscribe_handoff(&self) -> watch::Receiver<Option<SurfaceHandoff>> {
        self.handoff_tx.subscribe()
    }

    /// Run the reconciliation once per activation (login, tab made
    /// visible again). Subsequent calls are no-ops until logout resets
    /// the guard.
    pub async fn sync_on_activation(
        &self,
        surface: SurfaceClass,
    ) -> Result<RecoveryOutcome, SessionError> {
        if self
            .synced
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(RecoveryOutcome::AlreadySynced);
        }

        // A complete session is already authoritative-enough: trust it.
        let held = self.store.current().session;
        if held.as_ref().is_some_and(|s| !s.is_partial()) {
            return Ok(RecoveryOutcome::TrustedLocal);
        }

        match self.store.resume_existing_session().await {
            Ok(true) => {
                let handoff = match surface {
                    SurfaceClass::Desktop => SurfaceHandoff::Docked,
                    SurfaceClass::Mobile => SurfaceHandoff::Compact,
                };
                let _ = self.handoff_tx.send_replace(Some(handoff));
                Ok(RecoveryOutcome::Restored(handoff))
            }
            Ok(false) => Ok(RecoveryOutcome::NoSession),
            Err(e) => {
                // A network failure is not an answer: let the next
                // activation retry instead of staying wrongly "synced".
                self.synced.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Forget the sync guard (logout). The next activation reconciles
    /// again for whoever signs in.
    pub fn reset_on_logout(&self) {
        self.synced.store(false, Ordering::SeqCst);
        let _ = self.handoff_tx.send_replace(None);
        self.store.clear_local();
    }
}
