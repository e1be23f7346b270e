// src/core/timer.rs — Pure countdown engine for step timers
//
// No I/O and no wall clock: `tick` maps one timer map to the next and
// reports the transitions that happened, so the engine can be tested by
// feeding a map and asserting the output. The ticking authority owns the
// clock; the session store owns the map.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::types::RecipeStep;

/// Identifies one countdown: a step may run several concurrent timers
/// (sub-tasks within the step), distinguished by slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerKey {
    pub step: u32,
    pub slot: u32,
}

impl TimerKey {
    pub fn new(step: u32, slot: u32) -> Self {
        Self { step, slot }
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step{}#{}", self.step, self.slot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTimer {
    pub label: String,
    pub total_secs: u32,
    pub remaining_secs: u32,
    pub running: bool,
    pub muted: bool,
    /// Terminal state: reached zero. Excluded from decrements until reset.
    pub elapsed: bool,
}

impl StepTimer {
    pub fn new(label: impl Into<String>, total_secs: u32) -> Self {
        Self {
            label: label.into(),
            total_secs,
            remaining_secs: total_secs,
            running: true,
            muted: false,
            elapsed: false,
        }
    }

    /// Re-arm a timer at its full duration, paused.
    pub fn reset(&mut self) {
        self.remaining_secs = self.total_secs;
        self.elapsed = false;
        self.running = false;
    }
}

pub type TimerMap = BTreeMap<TimerKey, StepTimer>;

/// State changes observed by the notification layer. The urgency and
/// completion variants carry the timer's mute flag so the observer needs
/// no read-back into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerTransition {
    /// A running timer crossed into the urgent window this tick.
    Urgent {
        key: TimerKey,
        remaining_secs: u32,
        muted: bool,
    },
    /// A running timer reached zero this tick.
    Completed { key: TimerKey, muted: bool },
    /// The timer was explicitly re-armed.
    Reset { key: TimerKey },
    /// The timer left the active set (step change or session end).
    Destroyed { key: TimerKey },
}

#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub timers: TimerMap,
    pub transitions: Vec<TimerTransition>,
}

/// Advance every running timer by one second.
///
/// Paused timers are untouched; elapsed timers stay at zero; remaining
/// seconds never go negative. Reaching zero flips the timer to its
/// terminal elapsed state and stops it, exactly once.
pub fn tick(timers: TimerMap, urgent_threshold_secs: u32) -> TickOutcome {
    let mut transitions = Vec::new();
    let mut next = TimerMap::new();

    for (key, mut timer) in timers {
        if timer.running && !timer.elapsed {
            let before = timer.remaining_secs;
            timer.remaining_secs = timer.remaining_secs.saturating_sub(1);

            if timer.remaining_secs == 0 {
                timer.elapsed = true;
                timer.running = false;
                transitions.push(TimerTransition::Completed {
                    key,
                    muted: timer.muted,
                });
            } else if before > urgent_threshold_secs
                && timer.remaining_secs <= urgent_threshold_secs
            {
                transitions.push(TimerTransition::Urgent {
                    key,
                    remaining_secs: timer.remaining_secs,
                    muted: timer.muted,
                });
            }
        }
        next.insert(key, timer);
    }

    TickOutcome {
        timers: next,
        transitions,
    }
}

/// Build the timers a step declares. Steps without a duration (or with a
/// zero duration) seed nothing.
pub fn seed_for_step(step: &RecipeStep) -> TimerMap {
    let mut timers = TimerMap::new();
    if let Some(secs) = step.duration_secs {
        if secs > 0 {
            timers.insert(
                TimerKey::new(step.number, 0),
                StepTimer::new(step.instruction.clone(), secs),
            );
        }
    }
    timers
}

/// Remaining seconds of a countdown whose start the server recorded.
///
/// Used when rehydrating a session: the ticking authority only runs while
/// the tab is active, so a locally-frozen remaining value lies after a
/// long tab-hide. Saturates at zero.
pub fn remaining_after(total_secs: u32, started_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let elapsed = now.signed_duration_since(started_at).num_seconds().max(0);
    (total_secs as i64).saturating_sub(elapsed).max(0) as u32
}
