use std::fmt;

use serde::Serialize;

use crate::transport::IceConnectionState;

/// Lifecycle of the single active session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Handle created, no negotiation started
    Unconnected,
    /// Offer/answer exchange in progress
    Negotiating,
    /// Transport connected, capture running
    Connected,
    /// Torn down; a new session may be created
    Closed,
}

impl SessionState {
    /// Session state implied by a transport report, if it changes anything.
    ///
    /// Only Connected and the terminal ICE states move the session; the rest
    /// are observational.
    pub fn from_ice(state: IceConnectionState) -> Option<Self> {
        match state {
            IceConnectionState::Connected => Some(SessionState::Connected),
            s if s.is_terminal() => Some(SessionState::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unconnected => "unconnected",
            SessionState::Negotiating => "negotiating",
            SessionState::Connected => "connected",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
