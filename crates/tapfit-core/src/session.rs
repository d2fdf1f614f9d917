//! Rep Session State Machine
//!
//! Pure state-transition logic for a tracked workout: given a command
//! from the consumer or an event from the transport, produce the next
//! state and the side effects the runtime must execute. The machine
//! performs no I/O and owns no timers; the runtime drives it through a
//! single serialized dispatch path.

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::errors::SessionError;
use crate::protocol::PuckNotification;

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// Live workout state, one per device-connection lifetime.
///
/// `set_index` is 1-based. `reps` starts at 0 and is monotonically
/// non-decreasing while in `InSet`, clamped to the configured target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionState {
    /// No session in progress
    Idle,
    /// Connect issued, awaiting the transport's response
    Connecting,
    /// Device paired, workout not yet begun
    AwaitStart,
    /// Counting reps in a set
    InSet { set_index: u8, reps: u8 },
    /// Resting between sets; `set_index` is the set just completed
    Rest { set_index: u8, seconds: u32 },
    /// All sets completed; terminal until a new session is created
    Done,
}

impl SessionState {
    /// State name for logging
    pub fn state_name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Connecting => "Connecting",
            SessionState::AwaitStart => "AwaitStart",
            SessionState::InSet { .. } => "InSet",
            SessionState::Rest { .. } => "Rest",
            SessionState::Done => "Done",
        }
    }

    /// Whether a workout is in progress (reps being counted or resting)
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::InSet { .. } | SessionState::Rest { .. }
        )
    }

    /// Whether the transport link should be up in this state
    pub fn wants_link(&self) -> bool {
        matches!(
            self,
            SessionState::AwaitStart | SessionState::InSet { .. } | SessionState::Rest { .. }
        )
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

// ----------------------------------------------------------------------------
// Events and Effects
// ----------------------------------------------------------------------------

/// Everything that can drive the machine: consumer commands and
/// transport events funnel through the same dispatch path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Consumer command: pair with the wearable
    Handshake,
    /// Consumer command: begin set 1
    Start,
    /// Consumer command: cut the rest countdown short
    SkipRest,
    /// Consumer command: abort the session
    End,
    /// Transport connected successfully
    Connected,
    /// Transport connect failed or timed out
    ConnectFailed(SessionError),
    /// Decoded notification from the peripheral
    Notification(PuckNotification),
    /// One second of rest elapsed
    RestTick,
    /// The reconnection supervisor exhausted its retry budget
    ReconnectExhausted,
}

/// Side effects the runtime executes after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// Issue a transport connect for the Puck service
    Connect,
    /// Write the reset command to the peripheral
    WriteReset,
    /// Tear down the transport link
    Disconnect,
    /// Persist a completed set
    RecordSet { set_index: u8, reps: u8 },
}

/// Result of a state transition
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// New session state
    pub new_state: SessionState,
    /// Effects to execute as a result of the transition
    pub effects: Vec<SessionEffect>,
    /// Consumer-visible failure produced by this transition, if any
    pub error: Option<SessionError>,
}

impl StateTransition {
    fn to(new_state: SessionState) -> Self {
        Self {
            new_state,
            effects: Vec::new(),
            error: None,
        }
    }

    fn with_effects(new_state: SessionState, effects: Vec<SessionEffect>) -> Self {
        Self {
            new_state,
            effects,
            error: None,
        }
    }

    fn failed(new_state: SessionState, effects: Vec<SessionEffect>, error: SessionError) -> Self {
        Self {
            new_state,
            effects,
            error: Some(error),
        }
    }
}

// ----------------------------------------------------------------------------
// Transitions
// ----------------------------------------------------------------------------

impl SessionState {
    /// Process an event and transition to the next state (consumes self).
    ///
    /// Commands are idempotent: an event that does not apply to the
    /// current state leaves it unchanged with no effects. `Done` is
    /// terminal; the runtime replaces the whole session to restart.
    pub fn transition(self, config: &SessionConfig, event: SessionEvent) -> StateTransition {
        match (self, event) {
            // Pairing
            (SessionState::Idle, SessionEvent::Handshake) => StateTransition::with_effects(
                SessionState::Connecting,
                vec![SessionEffect::Connect],
            ),
            (SessionState::Connecting, SessionEvent::Connected) => {
                StateTransition::to(SessionState::AwaitStart)
            }
            (SessionState::Connecting, SessionEvent::ConnectFailed(error)) => {
                StateTransition::failed(SessionState::Idle, Vec::new(), error)
            }

            // Starting set 1 resets the peripheral's rep counter
            (SessionState::AwaitStart, SessionEvent::Start) => StateTransition::with_effects(
                SessionState::InSet {
                    set_index: 1,
                    reps: 0,
                },
                vec![SessionEffect::WriteReset],
            ),

            // Rep counting
            (SessionState::InSet { set_index, reps }, SessionEvent::Notification(note)) => {
                let target = config.target_reps;
                let reps = match note {
                    PuckNotification::Rep => reps.saturating_add(1).min(target),
                    // Absolute reports never lower the count
                    PuckNotification::RepCount(n) => reps.max(n.min(target)),
                };
                Self::apply_rep_progress(config, set_index, reps)
            }

            // Rest countdown, one tick per second
            (SessionState::Rest { set_index, seconds }, SessionEvent::RestTick) if seconds > 0 => {
                let seconds = seconds - 1;
                if seconds == 0 {
                    StateTransition::to(SessionState::InSet {
                        set_index: set_index + 1,
                        reps: 0,
                    })
                } else {
                    StateTransition::to(SessionState::Rest { set_index, seconds })
                }
            }
            (SessionState::Rest { set_index, .. }, SessionEvent::SkipRest) => {
                StateTransition::to(SessionState::InSet {
                    set_index: set_index + 1,
                    reps: 0,
                })
            }

            // Aborting from any pre-terminal state tears the link down
            (
                SessionState::Connecting
                | SessionState::AwaitStart
                | SessionState::InSet { .. }
                | SessionState::Rest { .. },
                SessionEvent::End,
            ) => {
                StateTransition::with_effects(SessionState::Idle, vec![SessionEffect::Disconnect])
            }

            // The one disconnect-class failure that reaches the consumer
            (
                SessionState::AwaitStart | SessionState::InSet { .. } | SessionState::Rest { .. },
                SessionEvent::ReconnectExhausted,
            ) => StateTransition::failed(
                SessionState::Idle,
                vec![SessionEffect::Disconnect],
                SessionError::ReconnectExhausted,
            ),

            // Everything else is a no-op: repeated commands, late
            // notifications, ticks outside Rest, events after Done.
            (state, _) => StateTransition::to(state),
        }
    }

    /// Advance `InSet` after a rep update: stay in the set, move to rest,
    /// or finish the session when the final set hits the target.
    fn apply_rep_progress(config: &SessionConfig, set_index: u8, reps: u8) -> StateTransition {
        if reps < config.target_reps {
            return StateTransition::to(SessionState::InSet { set_index, reps });
        }

        let record = SessionEffect::RecordSet { set_index, reps };
        if set_index < config.total_sets {
            StateTransition::with_effects(
                SessionState::Rest {
                    set_index,
                    seconds: config.rest_seconds,
                },
                vec![record],
            )
        } else {
            StateTransition::with_effects(
                SessionState::Done,
                vec![record, SessionEffect::Disconnect],
            )
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> SessionConfig {
        SessionConfig::default()
    }

    fn in_set(set_index: u8, reps: u8) -> SessionState {
        SessionState::InSet { set_index, reps }
    }

    #[test]
    fn test_handshake_issues_connect() {
        let t = SessionState::Idle.transition(&config(), SessionEvent::Handshake);
        assert_eq!(t.new_state, SessionState::Connecting);
        assert_eq!(t.effects, vec![SessionEffect::Connect]);
    }

    #[test]
    fn test_connect_failure_returns_to_idle_with_error() {
        let t = SessionState::Connecting.transition(
            &config(),
            SessionEvent::ConnectFailed(SessionError::ConnectTimeout),
        );
        assert_eq!(t.new_state, SessionState::Idle);
        assert!(t.effects.is_empty());
        assert_eq!(t.error, Some(SessionError::ConnectTimeout));
    }

    #[test]
    fn test_start_resets_peripheral() {
        let t = SessionState::AwaitStart.transition(&config(), SessionEvent::Start);
        assert_eq!(t.new_state, in_set(1, 0));
        assert_eq!(t.effects, vec![SessionEffect::WriteReset]);
    }

    #[test]
    fn test_rep_increments() {
        let t = in_set(1, 3).transition(
            &config(),
            SessionEvent::Notification(PuckNotification::Rep),
        );
        assert_eq!(t.new_state, in_set(1, 4));
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_count_report_never_decreases() {
        let t = in_set(1, 6).transition(
            &config(),
            SessionEvent::Notification(PuckNotification::RepCount(4)),
        );
        assert_eq!(t.new_state, in_set(1, 6));

        let t = in_set(1, 6).transition(
            &config(),
            SessionEvent::Notification(PuckNotification::RepCount(8)),
        );
        assert_eq!(t.new_state, in_set(1, 8));
    }

    #[test]
    fn test_count_report_clamped_to_target() {
        let t = in_set(2, 5).transition(
            &config(),
            SessionEvent::Notification(PuckNotification::RepCount(200)),
        );
        assert_eq!(
            t.new_state,
            SessionState::Rest {
                set_index: 2,
                seconds: 90
            }
        );
        assert_eq!(
            t.effects,
            vec![SessionEffect::RecordSet {
                set_index: 2,
                reps: 10
            }]
        );
    }

    #[test]
    fn test_target_reached_starts_rest() {
        let t = in_set(1, 9).transition(
            &config(),
            SessionEvent::Notification(PuckNotification::Rep),
        );
        assert_eq!(
            t.new_state,
            SessionState::Rest {
                set_index: 1,
                seconds: 90
            }
        );
        assert_eq!(
            t.effects,
            vec![SessionEffect::RecordSet {
                set_index: 1,
                reps: 10
            }]
        );
    }

    #[test]
    fn test_final_set_completes_session() {
        let t = in_set(4, 9).transition(
            &config(),
            SessionEvent::Notification(PuckNotification::Rep),
        );
        assert_eq!(t.new_state, SessionState::Done);
        assert_eq!(
            t.effects,
            vec![
                SessionEffect::RecordSet {
                    set_index: 4,
                    reps: 10
                },
                SessionEffect::Disconnect,
            ]
        );
    }

    #[test]
    fn test_rest_counts_down_and_advances() {
        let mut state = SessionState::Rest {
            set_index: 1,
            seconds: 3,
        };
        for expected in [2u32, 1] {
            let t = state.transition(&config(), SessionEvent::RestTick);
            assert_eq!(
                t.new_state,
                SessionState::Rest {
                    set_index: 1,
                    seconds: expected
                }
            );
            state = t.new_state;
        }
        // Final tick reaches zero and auto-advances
        let t = state.transition(&config(), SessionEvent::RestTick);
        assert_eq!(t.new_state, in_set(2, 0));
    }

    #[test]
    fn test_skip_rest() {
        let t = SessionState::Rest {
            set_index: 2,
            seconds: 45,
        }
        .transition(&config(), SessionEvent::SkipRest);
        assert_eq!(t.new_state, in_set(3, 0));
    }

    #[test]
    fn test_end_aborts_from_any_active_state() {
        for state in [
            SessionState::Connecting,
            SessionState::AwaitStart,
            in_set(2, 4),
            SessionState::Rest {
                set_index: 2,
                seconds: 45,
            },
        ] {
            let t = state.transition(&config(), SessionEvent::End);
            assert_eq!(t.new_state, SessionState::Idle);
            assert_eq!(t.effects, vec![SessionEffect::Disconnect]);
        }
    }

    #[test]
    fn test_end_is_idempotent() {
        let t = SessionState::Idle.transition(&config(), SessionEvent::End);
        assert_eq!(t.new_state, SessionState::Idle);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_reconnect_exhausted_abandons_session() {
        let t = in_set(3, 7).transition(&config(), SessionEvent::ReconnectExhausted);
        assert_eq!(t.new_state, SessionState::Idle);
        assert_eq!(t.effects, vec![SessionEffect::Disconnect]);
        assert_eq!(t.error, Some(SessionError::ReconnectExhausted));
    }

    #[test]
    fn test_done_is_terminal() {
        for event in [
            SessionEvent::Handshake,
            SessionEvent::Start,
            SessionEvent::End,
            SessionEvent::Notification(PuckNotification::Rep),
            SessionEvent::RestTick,
        ] {
            let t = SessionState::Done.transition(&config(), event);
            assert_eq!(t.new_state, SessionState::Done);
            assert!(t.effects.is_empty());
        }
    }

    #[test]
    fn test_late_notifications_ignored_outside_set() {
        for state in [
            SessionState::Idle,
            SessionState::AwaitStart,
            SessionState::Rest {
                set_index: 1,
                seconds: 30,
            },
        ] {
            let before = state.clone();
            let t = state.transition(
                &config(),
                SessionEvent::Notification(PuckNotification::Rep),
            );
            assert_eq!(t.new_state, before);
            assert!(t.effects.is_empty());
        }
    }

    #[test]
    fn test_full_session_scenario() {
        let config = config();
        let mut state = SessionState::Idle;

        state = state.transition(&config, SessionEvent::Handshake).new_state;
        state = state.transition(&config, SessionEvent::Connected).new_state;
        assert_eq!(state, SessionState::AwaitStart);
        state = state.transition(&config, SessionEvent::Start).new_state;
        assert_eq!(state, in_set(1, 0));

        for set in 1..=4u8 {
            for _ in 0..10 {
                state = state
                    .transition(&config, SessionEvent::Notification(PuckNotification::Rep))
                    .new_state;
            }
            if set < 4 {
                assert_eq!(
                    state,
                    SessionState::Rest {
                        set_index: set,
                        seconds: 90
                    }
                );
                for _ in 0..90 {
                    state = state.transition(&config, SessionEvent::RestTick).new_state;
                }
                assert_eq!(state, in_set(set + 1, 0));
            }
        }
        assert_eq!(state, SessionState::Done);
    }

    proptest! {
        /// For any sequence of rep notifications, the count is
        /// non-decreasing and never exceeds the target.
        #[test]
        fn prop_reps_monotone_and_clamped(notes in prop::collection::vec(
            prop_oneof![
                Just(PuckNotification::Rep),
                any::<u8>().prop_map(PuckNotification::RepCount),
            ],
            0..64,
        )) {
            let config = SessionConfig::default();
            let mut state = in_set(1, 0);
            let mut last_reps = 0u8;

            for note in notes {
                let t = state.clone().transition(&config, SessionEvent::Notification(note));
                match t.new_state {
                    SessionState::InSet { set_index: 1, reps } => {
                        prop_assert!(reps >= last_reps);
                        prop_assert!(reps <= config.target_reps);
                        last_reps = reps;
                        state = t.new_state;
                    }
                    SessionState::Rest { set_index: 1, .. } => {
                        // Target reached exactly once, then counting stops
                        prop_assert_eq!(
                            t.effects,
                            vec![SessionEffect::RecordSet { set_index: 1, reps: 10 }]
                        );
                        return Ok(());
                    }
                    other => prop_assert!(false, "unexpected state {:?}", other),
                }
            }
        }
    }
}
