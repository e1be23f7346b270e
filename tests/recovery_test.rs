// tests/recovery_test.rs — Integration: ninja-session recovery against an
// in-memory backend and real device storage

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;

use chefkix_session::core::recovery::{
    RecoveryCoordinator, RecoveryOutcome, SurfaceClass, SurfaceHandoff,
};
use chefkix_session::core::store::SessionStore;
use chefkix_session::core::ticker::TickingAuthority;
use chefkix_session::core::timer::TimerKey;
use chefkix_session::core::types::{CookingSession, SessionSnapshot, SessionStatus};
use chefkix_session::infra::config::TimersConfig;
use chefkix_session::infra::storage::SnapshotStore;

use common::{five_second_recipe, step, untimed_recipe, InMemoryGateway};

struct Harness {
    gateway: Arc<InMemoryGateway>,
    snapshots: SnapshotStore,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(gateway: InMemoryGateway) -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        Self {
            gateway: Arc::new(gateway),
            snapshots: SnapshotStore::with_dir(dir.path()),
            _dir: dir,
        }
    }

    /// Simulate an earlier run of the app leaving a fragment behind.
    fn leave_fragment(&self, session_id: &str, recipe_id: &str) {
        self.snapshots
            .save(&SessionSnapshot {
                session_id: session_id.into(),
                recipe_id: recipe_id.into(),
            })
            .unwrap();
    }

    /// Boot the app: the store restores whatever fragment exists.
    fn boot(&self) -> Arc<SessionStore> {
        Arc::new(SessionStore::new(
            self.gateway.clone(),
            self.snapshots.clone(),
            &TimersConfig::default(),
        ))
    }
}

fn server_session(recipe_id: &str, current_step: u32) -> CookingSession {
    CookingSession {
        session_id: "sess-77".into(),
        recipe_id: recipe_id.into(),
        current_step,
        completed_steps: (1..current_step).collect::<BTreeSet<u32>>(),
        status: Some(SessionStatus::InProgress),
        pending_xp: 0,
        completed_at: None,
        post_deadline: None,
        step_started_at: Some(Utc::now()),
        recipe: five_second_recipe(),
    }
}

#[tokio::test]
async fn test_stale_fragment_is_discarded() {
    // Session 'x' finished on another device; only the fragment remains.
    let harness = Harness::new(InMemoryGateway::new(vec![("y", untimed_recipe())]));
    harness.leave_fragment("x", "y");

    let store = harness.boot();
    assert!(store.current().session.as_ref().unwrap().is_partial());

    let coordinator = RecoveryCoordinator::new(store.clone());
    let outcome = coordinator
        .sync_on_activation(SurfaceClass::Desktop)
        .await
        .unwrap();

    assert_eq!(outcome, RecoveryOutcome::NoSession);
    assert!(store.current().session.is_none());
    // The fragment is gone from disk too: the next boot starts clean.
    assert!(harness.snapshots.load().is_none());
}

#[tokio::test]
async fn test_fragment_restores_running_session() {
    let harness = Harness::new(InMemoryGateway::new(vec![("r2", five_second_recipe())]));
    harness.leave_fragment("sess-77", "r2");
    harness.gateway.seed_session(server_session("r2", 1));

    let store = harness.boot();
    let coordinator = RecoveryCoordinator::new(store.clone());
    let mut handoffs = coordinator.subscribe_handoff();

    let outcome = coordinator
        .sync_on_activation(SurfaceClass::Mobile)
        .await
        .unwrap();
    assert_eq!(outcome, RecoveryOutcome::Restored(SurfaceHandoff::Compact));
    assert_eq!(*handoffs.borrow_and_update(), Some(SurfaceHandoff::Compact));

    let view = store.current();
    let session = view.session.unwrap();
    assert!(!session.is_partial());
    assert_eq!(session.session_id, "sess-77");
    assert!(view.timers[&TimerKey::new(1, 0)].running);
}

#[tokio::test]
async fn test_hydration_reconciles_hidden_elapsed_time() {
    // The tab was hidden for four of the step's ten minutes.
    let mut remote = server_session("r3", 1);
    remote.recipe.steps = vec![step(1, "Simmer the ragu", Some(600))];
    remote.recipe.total_steps = 1;
    remote.step_started_at = Some(Utc::now() - chrono::Duration::seconds(240));

    let harness = Harness::new(InMemoryGateway::new(vec![]));
    harness.gateway.seed_session(remote);

    let store = harness.boot();
    store.resume_existing_session().await.unwrap();

    let remaining = store.current().timers[&TimerKey::new(1, 0)].remaining_secs;
    // Not the locally-frozen 600: the hidden time was charged.
    assert!(
        (355..=360).contains(&remaining),
        "expected ~360s left, got {remaining}"
    );
}

#[tokio::test]
async fn test_hydration_marks_overrun_timer_elapsed() {
    // The countdown ran out entirely while the tab was hidden.
    let mut remote = server_session("r3", 1);
    remote.recipe.steps = vec![step(1, "Proof the dough", Some(60))];
    remote.recipe.total_steps = 1;
    remote.step_started_at = Some(Utc::now() - chrono::Duration::seconds(300));

    let harness = Harness::new(InMemoryGateway::new(vec![]));
    harness.gateway.seed_session(remote);

    let store = harness.boot();
    store.resume_existing_session().await.unwrap();

    let view = store.current();
    let t = &view.timers[&TimerKey::new(1, 0)];
    assert_eq!(t.remaining_secs, 0);
    assert!(t.elapsed);
    assert!(!t.running);
    // The terminal timer stays in the map for display until the step is left.
    assert!(store.has_ticking_work());
}

#[tokio::test]
async fn test_paused_remote_session_hydrates_frozen() {
    let mut remote = server_session("r2", 1);
    remote.status = Some(SessionStatus::Paused);

    let harness = Harness::new(InMemoryGateway::new(vec![]));
    harness.gateway.seed_session(remote);

    let store = harness.boot();
    store.resume_existing_session().await.unwrap();

    let key = TimerKey::new(1, 0);
    assert!(!store.current().timers[&key].running);

    // Resuming thaws exactly the timers the pause froze.
    store.resume_session().await.unwrap();
    assert!(store.current().timers[&key].running);
}

#[tokio::test]
async fn test_recovered_session_ticks_under_the_authority() {
    let harness = Harness::new(InMemoryGateway::new(vec![("r2", five_second_recipe())]));
    harness.leave_fragment("sess-77", "r2");
    harness.gateway.seed_session(server_session("r2", 1));

    let store = harness.boot();
    let authority = TickingAuthority::new(store.clone(), Duration::from_millis(10));
    authority.ensure_running();

    let coordinator = RecoveryCoordinator::new(store.clone());
    coordinator
        .sync_on_activation(SurfaceClass::Desktop)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(35)).await;
    authority.shutdown();

    let remaining = store.current().timers[&TimerKey::new(1, 0)].remaining_secs;
    assert!(remaining < 5, "recovered timer should be ticking");
}

#[tokio::test]
async fn test_boot_without_fragment_is_clean() {
    let harness = Harness::new(InMemoryGateway::new(vec![]));
    let store = harness.boot();
    assert!(store.current().session.is_none());

    let coordinator = RecoveryCoordinator::new(store.clone());
    let outcome = coordinator
        .sync_on_activation(SurfaceClass::Desktop)
        .await
        .unwrap();
    assert_eq!(outcome, RecoveryOutcome::NoSession);
}
