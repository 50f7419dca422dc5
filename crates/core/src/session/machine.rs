//! Per-site refresh state machine
//!
//! Transitions are pure: `(state, event) -> (state, effect)`. The coordinator
//! applies them under its session lock and then carries out the effect, so
//! the single-flight rule is a property of this table rather than of any
//! flag juggling at call sites.

use chrono::{DateTime, Utc};
use siteauth_domain::RefreshState;

/// Input to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshEvent {
    /// A trigger asked whether the site needs renewing
    Consider { due: bool, online: bool, now: DateTime<Utc> },
    /// New token persisted and swapped in
    Succeeded,
    /// New token could not be persisted; old token stays authoritative
    PersistFailed,
    /// Refresh could not reach the server or timed out
    NetworkUnavailable,
    /// Server rejected the credential or answered with garbage
    Rejected { cooldown_until: DateTime<Utc> },
    /// The refreshed token was thrown away because the session logged out
    Discarded,
    /// A credential was installed (bootstrap or login). `cooldown_until` is
    /// set when it is the refresh token that was rejected recently.
    Reinstalled { cooldown_until: Option<DateTime<Utc>> },
}

/// Why a `Consider` request did not start a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Remaining lifetime is above the threshold, or the token never expires
    NotDue,
    /// Connectivity is known to be down
    Offline,
    /// A refresh for this site is already outstanding
    InFlight,
    /// Credential was rejected recently
    CoolingDown,
    /// No session is installed for the site
    NoSession,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotDue => "not_due",
            Self::Offline => "offline",
            Self::InFlight => "in_flight",
            Self::CoolingDown => "cooling_down",
            Self::NoSession => "no_session",
        }
    }
}

/// Side effect the coordinator must perform after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    BeginRefresh,
    ForceLogout,
    Skip(SkipReason),
}

/// Result of applying one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: RefreshState,
    pub effect: Effect,
}

impl Transition {
    const fn stay(state: RefreshState, effect: Effect) -> Self {
        Self { next: state, effect }
    }
}

/// Compute the next state and effect for `event` in `state`.
#[must_use]
pub fn transition(state: RefreshState, event: RefreshEvent) -> Transition {
    match (state, event) {
        // An outstanding refresh keeps the single-flight slot across reinstalls.
        (RefreshState::Refreshing { .. }, RefreshEvent::Reinstalled { .. }) => {
            Transition::stay(state, Effect::None)
        }
        (_, RefreshEvent::Reinstalled { cooldown_until: Some(until) }) => {
            Transition::stay(RefreshState::Cooldown { until }, Effect::None)
        }
        (_, RefreshEvent::Reinstalled { cooldown_until: None }) => {
            Transition::stay(RefreshState::Idle, Effect::None)
        }

        (RefreshState::Refreshing { .. }, RefreshEvent::Consider { .. }) => {
            Transition::stay(state, Effect::Skip(SkipReason::InFlight))
        }
        (RefreshState::Cooldown { until }, RefreshEvent::Consider { now, .. }) if now < until => {
            Transition::stay(state, Effect::Skip(SkipReason::CoolingDown))
        }
        (
            RefreshState::Idle | RefreshState::Cooldown { .. },
            RefreshEvent::Consider { due, online, now },
        ) => {
            if !due {
                Transition::stay(RefreshState::Idle, Effect::Skip(SkipReason::NotDue))
            } else if !online {
                Transition::stay(RefreshState::Idle, Effect::Skip(SkipReason::Offline))
            } else {
                Transition::stay(RefreshState::Refreshing { started_at: now }, Effect::BeginRefresh)
            }
        }

        (
            RefreshState::Refreshing { .. },
            RefreshEvent::Succeeded
            | RefreshEvent::PersistFailed
            | RefreshEvent::NetworkUnavailable
            | RefreshEvent::Discarded,
        ) => Transition::stay(RefreshState::Idle, Effect::None),
        (RefreshState::Refreshing { .. }, RefreshEvent::Rejected { cooldown_until }) => {
            Transition::stay(RefreshState::Cooldown { until: cooldown_until }, Effect::ForceLogout)
        }

        // Completion events only mean something while a refresh is in flight.
        (_, _) => Transition::stay(state, Effect::None),
    }
}
