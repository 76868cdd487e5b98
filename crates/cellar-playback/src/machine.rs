//! # Playback Machine
//!
//! Timer-driven finite state machine replaying the `execution_step` sequence.
//!
//! The machine is single threaded and never sleeps. Operations take effect
//! synchronously; delayed transitions are stored as one `PendingTimer` that
//! fires when the host advances the logical clock (`advance_to` / `advance_by`).
//! After every change `reconcile` decides which timer the current state needs,
//! so arming a new timer and cancelling the old one is a single assignment.

use execution_graph::{GraphNode, VisualStatus};
use std::collections::VecDeque;
use std::time::Duration;

use crate::config::PlaybackConfig;
use crate::error::PlaybackError;
use crate::state::{
    ExecutionState, PlaybackEvent, PlaybackSnapshot, PlaybackState, StepEntry, StepVisualState,
};
use crate::timer::{LogicalClock, PendingTimer, TimerKind};

/// Undrained events kept before the oldest are discarded.
pub const EVENT_BACKLOG: usize = 1024;

pub struct PlaybackMachine {
    config: PlaybackConfig,
    steps: Vec<StepEntry>,
    state: PlaybackState,
    timer: Option<PendingTimer>,
    clock: LogicalClock,
    auto_start: bool,
    /// Set once auto-start has been armed for the current batch of steps.
    auto_start_latched: bool,
    events: VecDeque<PlaybackEvent>,
}

impl PlaybackMachine {
    /// Creates a machine over the step nodes found in `nodes`.
    ///
    /// With `auto_start` configured and a non-empty sequence, the auto-start
    /// timer is armed immediately.
    pub fn new(config: PlaybackConfig, nodes: &[GraphNode]) -> Self {
        let mut machine = Self {
            auto_start: config.auto_start,
            config,
            steps: StepEntry::sequence_from_nodes(nodes),
            state: PlaybackState::default(),
            timer: None,
            clock: LogicalClock::default(),
            auto_start_latched: false,
            events: VecDeque::new(),
        };
        machine.reconcile();
        machine
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn execution_state(&self) -> ExecutionState {
        self.state.execution_state
    }

    pub fn current_step_index(&self) -> Option<usize> {
        self.state.current_step_index
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[StepEntry] {
        &self.steps
    }

    pub fn pending_timer(&self) -> Option<&PendingTimer> {
        self.timer.as_ref()
    }

    /// Logical time of the next scheduled transition, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timer.map(|t| t.deadline)
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            execution_state: self.state.execution_state,
            current_step_index: self.state.current_step_index,
            is_playing: self.state.is_playing,
            completed_steps: self.state.completed_steps.iter().copied().collect(),
            total_steps: self.steps.len(),
        }
    }

    /// Drains transition events recorded since the last call. At most
    /// `EVENT_BACKLOG` are kept; older ones are dropped.
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        self.events.drain(..).collect()
    }

    // ---------------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------------

    pub fn start_execution(&mut self) {
        if let Err(e) = self.try_start_execution() {
            tracing::debug!(error = %e, "start_execution ignored");
        }
    }

    /// Starts playback from `IDLE` at step 0.
    pub fn try_start_execution(&mut self) -> Result<(), PlaybackError> {
        if self.state.execution_state != ExecutionState::Idle {
            return Err(PlaybackError::NotIdle(self.state.execution_state));
        }
        if self.steps.is_empty() {
            return Err(PlaybackError::NothingToPlay);
        }

        tracing::info!(total_steps = self.steps.len(), "Execution playback started");
        self.state.current_step_index = Some(0);
        self.state.is_playing = true;
        self.transition(ExecutionState::ExecutionStarted);
        self.reconcile();
        Ok(())
    }

    /// Like `try_play`, except that after the finish it only raises the
    /// playing flag. Nothing is left to schedule there.
    pub fn play(&mut self) {
        match self.try_play() {
            Ok(()) => {}
            Err(PlaybackError::AlreadyFinished) => self.set_playing(true),
            Err(e) => tracing::debug!(error = %e, "play ignored"),
        }
    }

    /// Starts, resumes, or skips the inter-step pause depending on the state.
    pub fn try_play(&mut self) -> Result<(), PlaybackError> {
        match self.state.execution_state {
            ExecutionState::Idle => self.try_start_execution(),
            ExecutionState::ExecutionFinished => Err(PlaybackError::AlreadyFinished),
            ExecutionState::StepCompleted => {
                self.set_playing(true);
                self.advance_past_completed();
                self.reconcile();
                Ok(())
            }
            ExecutionState::ExecutionStarted | ExecutionState::StepRunning => {
                self.set_playing(true);
                self.reconcile();
                Ok(())
            }
        }
    }

    /// Stops auto-advance without moving the playback position.
    pub fn pause(&mut self) {
        self.cancel_timer();
        self.set_playing(false);
    }

    pub fn go_to_step(&mut self, index: usize) {
        if let Err(e) = self.try_go_to_step(index) {
            tracing::debug!(error = %e, "go_to_step ignored");
        }
    }

    /// Jumps to `index` paused, with every earlier step marked completed.
    pub fn try_go_to_step(&mut self, index: usize) -> Result<(), PlaybackError> {
        let total = self.steps.len();
        if index >= total {
            return Err(PlaybackError::StepOutOfRange { index, total });
        }

        self.cancel_timer();
        self.set_playing(false);
        self.state.current_step_index = Some(index);
        self.state.completed_steps = (0..index).collect();
        self.transition(ExecutionState::StepRunning);
        self.reconcile();
        Ok(())
    }

    pub fn next_step(&mut self) {
        if let Err(e) = self.try_next_step() {
            tracing::debug!(error = %e, "next_step ignored");
        }
    }

    pub fn try_next_step(&mut self) -> Result<(), PlaybackError> {
        let target = self.state.current_step_index.map_or(0, |i| i + 1);
        if target >= self.steps.len() {
            return Err(PlaybackError::AtBoundary("end"));
        }
        self.pause();
        self.try_go_to_step(target)
    }

    pub fn previous_step(&mut self) {
        if let Err(e) = self.try_previous_step() {
            tracing::debug!(error = %e, "previous_step ignored");
        }
    }

    pub fn try_previous_step(&mut self) -> Result<(), PlaybackError> {
        let target = match self.state.current_step_index {
            Some(i) if i > 0 => i - 1,
            _ => return Err(PlaybackError::AtBoundary("start")),
        };
        self.pause();
        self.try_go_to_step(target)
    }

    /// Cancels any timer and returns to `IDLE` with nothing completed.
    pub fn reset(&mut self) {
        self.cancel_timer();
        let from = self.state.execution_state;
        self.state = PlaybackState::default();
        self.record(PlaybackEvent::Reset);
        if from != ExecutionState::Idle {
            self.record(PlaybackEvent::StateChanged {
                from,
                to: ExecutionState::Idle,
                step_index: None,
            });
        }
        tracing::info!("Execution playback reset");
    }

    /// Turns auto-start on or off. Turning it off resets the machine.
    pub fn set_auto_start(&mut self, enabled: bool) {
        if self.auto_start == enabled {
            return;
        }
        self.auto_start = enabled;
        self.auto_start_latched = false;
        if enabled {
            self.reconcile();
        } else {
            self.reset();
        }
    }

    /// Replaces the step list after a backend refresh.
    ///
    /// Unchanged content is a no-op. A different step count restarts the
    /// session from `IDLE`; same-count status changes continue in place.
    pub fn set_steps(&mut self, nodes: &[GraphNode]) {
        let next = StepEntry::sequence_from_nodes(nodes);
        if next == self.steps {
            return;
        }

        let was_empty = self.steps.is_empty();
        let auto_start_pending = self
            .timer
            .is_some_and(|t| t.kind == TimerKind::AutoStart);
        if next.len() != self.steps.len() {
            tracing::info!(
                previous = self.steps.len(),
                next = next.len(),
                "Step count changed, resetting playback"
            );
            self.steps = next;
            self.reset();
            // A cancelled auto-start never ran, so it is owed to the new list.
            if was_empty || self.steps.is_empty() || auto_start_pending {
                self.auto_start_latched = false;
            }
        } else {
            tracing::debug!("Step statuses refreshed");
            self.steps = next;
        }
        self.reconcile();
    }

    // ---------------------------------------------------------------------
    // Read model
    // ---------------------------------------------------------------------

    /// Derived state of step `index`.
    pub fn step_state(&self, index: usize) -> StepVisualState {
        if index >= self.steps.len() {
            return StepVisualState::Hidden;
        }
        let Some(current) = self.state.current_step_index else {
            return StepVisualState::Pending;
        };

        if self.state.execution_state == ExecutionState::ExecutionFinished {
            return if index <= current {
                StepVisualState::Completed
            } else {
                StepVisualState::Pending
            };
        }

        if index < current {
            StepVisualState::Completed
        } else if index == current {
            match self.state.execution_state {
                ExecutionState::StepRunning => StepVisualState::Running,
                ExecutionState::StepCompleted => StepVisualState::Completed,
                _ => StepVisualState::Pending,
            }
        } else {
            StepVisualState::Pending
        }
    }

    /// Node-facing status of step `index`, combining the playback state with
    /// the step's backend status.
    pub fn visual_status(&self, index: usize) -> VisualStatus {
        match self.step_state(index) {
            StepVisualState::Hidden => VisualStatus::Hidden,
            StepVisualState::Pending => VisualStatus::Pending,
            StepVisualState::Running => VisualStatus::InProgress,
            StepVisualState::Completed => {
                if self.steps[index].is_failed() {
                    VisualStatus::Failed
                } else {
                    VisualStatus::Success
                }
            }
        }
    }

    /// Index of the step backed by `node_id`.
    pub fn step_index_of(&self, node_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.node_id == node_id)
    }

    // ---------------------------------------------------------------------
    // Clock
    // ---------------------------------------------------------------------

    /// Advances the logical clock, firing every timer that comes due on the way.
    pub fn advance_to(&mut self, now: Duration) {
        while let Some(timer) = self.timer.filter(|t| t.deadline <= now) {
            self.timer = None;
            self.clock.advance_to(timer.deadline);
            self.fire(timer);
        }
        self.clock.advance_to(now);
    }

    pub fn advance_by(&mut self, delta: Duration) {
        let target = self.clock.now().saturating_add(delta);
        self.advance_to(target);
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn fire(&mut self, timer: PendingTimer) {
        match timer.kind {
            TimerKind::AutoStart => {
                if self.auto_start && self.state.execution_state == ExecutionState::Idle {
                    tracing::debug!("Auto-start fired");
                    self.start_execution();
                }
            }
            kind => {
                // Live re-check: anything that paused or moved the cursor since
                // the timer was armed makes it stale.
                if !self.state.is_playing || self.state.current_step_index != timer.step_index {
                    tracing::debug!(?kind, step = ?timer.step_index, "Stale timer ignored");
                } else {
                    self.fire_step_timer(kind);
                }
            }
        }
        self.reconcile();
    }

    fn fire_step_timer(&mut self, kind: TimerKind) {
        let state = self.state.execution_state;
        match (kind, state) {
            (TimerKind::EnterStep, ExecutionState::ExecutionStarted) => {
                self.transition(ExecutionState::StepRunning);
            }
            (TimerKind::CompleteStep, ExecutionState::StepRunning) => {
                if let Some(index) = self.state.current_step_index {
                    self.complete_step(index);
                    self.transition(ExecutionState::StepCompleted);
                }
            }
            (TimerKind::AdvanceStep, ExecutionState::StepCompleted) => {
                self.advance_past_completed();
            }
            _ => {
                tracing::debug!(?kind, ?state, "Timer does not apply to current state");
            }
        }
    }

    /// Leaves `STEP_COMPLETED`: next step, or finish after the last one.
    fn advance_past_completed(&mut self) {
        let Some(index) = self.state.current_step_index else {
            return;
        };
        if index + 1 >= self.steps.len() {
            self.set_playing(false);
            self.transition(ExecutionState::ExecutionFinished);
            tracing::info!(last_step = index, "Execution playback finished");
        } else {
            self.state.current_step_index = Some(index + 1);
            self.transition(ExecutionState::StepRunning);
        }
    }

    fn complete_step(&mut self, index: usize) {
        self.state.completed_steps.insert(index);
        let failed = self.steps.get(index).is_some_and(StepEntry::is_failed);
        self.record(PlaybackEvent::StepCompleted { index, failed });
    }

    /// A failed step completes immediately and ends the replay.
    fn halt_on_failure(&mut self, index: usize) {
        let failure_reason = self.steps[index].failure_reason.clone();
        self.complete_step(index);
        self.set_playing(false);
        self.transition(ExecutionState::ExecutionFinished);
        tracing::info!(step = index, reason = ?failure_reason, "Playback halted on failed step");
        self.record(PlaybackEvent::Halted {
            index,
            failure_reason,
        });
    }

    /// Arms the timer the current state needs, or clears it if none.
    fn reconcile(&mut self) {
        let index = self.state.current_step_index;
        let playing = self.state.is_playing;
        let current = self.state.execution_state;

        let desired = match current {
            ExecutionState::Idle => self.auto_start_timer(),
            ExecutionState::ExecutionStarted if playing => Some(TimerKind::EnterStep),
            ExecutionState::StepRunning if playing => match index {
                Some(i) if self.steps.get(i).is_some_and(StepEntry::is_failed) => {
                    self.halt_on_failure(i);
                    None
                }
                Some(_) => Some(TimerKind::CompleteStep),
                None => None,
            },
            ExecutionState::StepCompleted if playing => Some(TimerKind::AdvanceStep),
            _ => None,
        };

        match desired {
            Some(kind) => {
                let step = if kind == TimerKind::AutoStart { None } else { index };
                self.arm(kind, step);
            }
            None => self.cancel_timer(),
        }
    }

    fn auto_start_timer(&mut self) -> Option<TimerKind> {
        if self
            .timer
            .is_some_and(|t| t.matches(TimerKind::AutoStart, None))
        {
            return Some(TimerKind::AutoStart);
        }
        if self.auto_start && !self.steps.is_empty() && !self.auto_start_latched {
            self.auto_start_latched = true;
            return Some(TimerKind::AutoStart);
        }
        None
    }

    fn delay_for(&self, kind: TimerKind) -> Duration {
        match kind {
            TimerKind::AutoStart => self.config.auto_start_delay(),
            TimerKind::EnterStep => Duration::from_millis(self.config.start_delay_ms),
            TimerKind::CompleteStep => Duration::from_millis(self.config.step_hold_ms),
            TimerKind::AdvanceStep => Duration::from_millis(self.config.advance_delay_ms),
        }
    }

    /// Arms `kind` for `step_index`, superseding any other pending timer.
    /// Re-arming the same transition for the same step keeps the original deadline.
    fn arm(&mut self, kind: TimerKind, step_index: Option<usize>) {
        if self.timer.is_some_and(|t| t.matches(kind, step_index)) {
            return;
        }
        let deadline = self.clock.now().saturating_add(self.delay_for(kind));
        tracing::debug!(?kind, step = ?step_index, ?deadline, "Timer armed");
        self.timer = Some(PendingTimer {
            kind,
            step_index,
            deadline,
        });
    }

    fn record(&mut self, event: PlaybackEvent) {
        if self.events.len() >= EVENT_BACKLOG {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            tracing::debug!(kind = ?timer.kind, step = ?timer.step_index, "Timer cancelled");
        }
    }

    fn set_playing(&mut self, playing: bool) {
        if self.state.is_playing == playing {
            return;
        }
        self.state.is_playing = playing;
        self.record(if playing {
            PlaybackEvent::Resumed
        } else {
            PlaybackEvent::Paused
        });
    }

    fn transition(&mut self, to: ExecutionState) {
        let from = self.state.execution_state;
        if from == to {
            return;
        }
        self.state.execution_state = to;
        tracing::debug!(?from, ?to, step = ?self.state.current_step_index, "Playback transition");
        self.record(PlaybackEvent::StateChanged {
            from,
            to,
            step_index: self.state.current_step_index,
        });
    }
}

impl std::fmt::Debug for PlaybackMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackMachine")
            .field("state", &self.state)
            .field("timer", &self.timer)
            .field("now", &self.clock.now())
            .field("total_steps", &self.steps.len())
            .finish()
    }
}
