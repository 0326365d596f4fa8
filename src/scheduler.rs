use crate::document::{Document, MutationRecord};
use crate::features::Exclusion;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(750);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// A cycle is owed; it runs once `deadline` passes without new changes.
    PendingScan { deadline: Instant },
}

/// Debounces document changes into scan cycles.
///
/// Each relevant notification (re)arms a single deadline `delay` in the
/// future; a burst therefore yields one cycle, `delay` after its last
/// change. `in_flight` is the re-entrancy guard: it is raised when a cycle
/// begins and only lowered by [`ChangeScheduler::finish_cycle`].
#[derive(Debug, Clone)]
pub struct ChangeScheduler {
    state: SchedulerState,
    delay: Duration,
    in_flight: bool,
    rearm_after_cycle: Option<Instant>,
    detached: bool,
    exclusion: Exclusion,
}

impl ChangeScheduler {
    pub fn new(delay: Duration, exclusion: Exclusion) -> Self {
        Self {
            state: SchedulerState::Idle,
            delay,
            in_flight: false,
            rearm_after_cycle: None,
            detached: false,
            exclusion,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SchedulerState::PendingScan { deadline } if !self.in_flight && !self.detached => {
                Some(deadline)
            }
            _ => None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Structural or text changes outside the engine's own UI trigger a
    /// scan; attribute-only changes never do.
    pub fn is_trigger(&self, doc: &Document, record: &MutationRecord) -> bool {
        if record.is_attribute_only() {
            return false;
        }
        !self.exclusion.in_ui_surface(doc, record.target())
    }

    /// Feed a batch of mutation records. Returns true if the batch armed or
    /// re-armed the timer.
    pub fn notify(&mut self, doc: &Document, records: &[MutationRecord], now: Instant) -> bool {
        if records.iter().any(|r| self.is_trigger(doc, r)) {
            self.on_mutation(now);
            true
        } else {
            if !records.is_empty() {
                log::debug!("Ignoring {} non-triggering mutation records", records.len());
            }
            false
        }
    }

    pub fn on_mutation(&mut self, now: Instant) {
        if self.detached {
            return;
        }
        let deadline = now + self.delay;
        if self.in_flight {
            self.rearm_after_cycle = Some(deadline);
            return;
        }
        match self.state {
            SchedulerState::Idle => log::debug!("Change observed, scan pending"),
            SchedulerState::PendingScan { .. } => log::debug!("Change observed, debounce reset"),
        }
        self.state = SchedulerState::PendingScan { deadline };
    }

    /// Raise the guard for the startup cycle.
    pub fn begin_initial(&mut self) -> bool {
        if self.in_flight || self.detached {
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Raise the guard if a pending cycle is due at `now`.
    pub fn begin_cycle(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.in_flight = true;
                true
            }
            _ => false,
        }
    }

    pub fn finish_cycle(&mut self) {
        self.in_flight = false;
        self.state = match self.rearm_after_cycle.take() {
            Some(deadline) => SchedulerState::PendingScan { deadline },
            None => SchedulerState::Idle,
        };
    }

    /// Stop observing; no further cycles will be scheduled.
    pub fn detach(&mut self) {
        self.detached = true;
        self.state = SchedulerState::Idle;
        self.rearm_after_cycle = None;
    }
}
