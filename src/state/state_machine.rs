use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

use crate::state::game_kind::GameKind;

/// Room-level lifecycle phases owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Pre-game; controllers roam the lobby.
    Lobby,
    /// A game was started and its engine owns derived state.
    Playing {
        /// Game that was started.
        game: GameKind,
        /// Whether the engine has reported its result.
        progress: GameProgress,
    },
}

/// Progress of the game while the room is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameProgress {
    /// The engine is counting down or playing.
    Running,
    /// The engine reported its result; the display shows it until the host returns to the lobby.
    Finished,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Host starts the selected game.
    StartGame(GameKind),
    /// The active engine signalled its termination.
    GameEnded,
    /// Host returns to the lobby; also a hard abort mid-game.
    BackToLobby,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: RoomPhase,
    /// The event that cannot be applied from this phase.
    pub event: RoomEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: RoomPhase,
        /// Current phase.
        actual: RoomPhase,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned transition that has been validated but not yet written to the room.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: RoomPhase,
    /// Phase the state machine will transition to.
    pub to: RoomPhase,
    /// Event that triggered this transition.
    pub event: RoomEvent,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: RoomPhase,
    /// Number of applied transitions.
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<RoomPhase>,
}

/// Room lifecycle: `lobby -> playing(running) -> playing(finished) -> lobby`,
/// with `playing -> lobby` as the abort edge.
#[derive(Debug, Clone)]
pub struct RoomStateMachine {
    phase: RoomPhase,
    version: usize,
    pending: Option<Plan>,
}

impl Default for RoomStateMachine {
    fn default() -> Self {
        Self {
            phase: RoomPhase::Lobby,
            version: 0,
            pending: None,
        }
    }
}

impl RoomStateMachine {
    /// Create a new state machine initialised in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a machine at `phase`, e.g. after the host reconnects.
    pub fn at(phase: RoomPhase) -> Self {
        Self {
            phase,
            ..Self::default()
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Validate that `event` applies to the current phase and reserve the transition.
    pub fn plan(&mut self, event: RoomEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition once its store write succeeded.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<RoomPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        self.phase = plan.to;
        self.version += 1;

        Ok(self.phase)
    }

    /// Drop a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(&self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (RoomPhase::Lobby, RoomEvent::StartGame(game)) => RoomPhase::Playing {
                game,
                progress: GameProgress::Running,
            },
            (
                RoomPhase::Playing {
                    game,
                    progress: GameProgress::Running,
                },
                RoomEvent::GameEnded,
            ) => RoomPhase::Playing {
                game,
                progress: GameProgress::Finished,
            },
            (_, RoomEvent::BackToLobby) => RoomPhase::Lobby,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
