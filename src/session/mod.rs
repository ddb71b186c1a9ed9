//! Capture-session lifecycle: at most one selection or capture is live at a time.

use thiserror::Error;

use crate::selector::SelectionMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Selecting(SelectionMode),
    Capturing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    BeginSelection(SelectionMode),
    SelectionResolved,
    SelectionCancelled,
    BeginInteractiveCapture,
    CaptureFinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTransition {
    pub from: SessionState,
    pub event: SessionEvent,
    pub to: SessionState,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session transition: from {from:?} using event {event:?}")]
    InvalidTransition {
        from: SessionState,
        event: SessionEvent,
    },
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Default)]
pub struct CaptureSession {
    state: SessionState,
    history: Vec<SessionTransition>,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    pub fn history(&self) -> &[SessionTransition] {
        &self.history
    }

    pub fn next_state(&self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent::*;
        match (self.state, event) {
            (SessionState::Idle, BeginSelection(mode)) => Some(SessionState::Selecting(mode)),
            (SessionState::Idle, BeginInteractiveCapture) => Some(SessionState::Capturing),
            (SessionState::Selecting(_), SelectionResolved) => Some(SessionState::Capturing),
            (SessionState::Selecting(_), SelectionCancelled) => Some(SessionState::Idle),
            (SessionState::Capturing, CaptureFinished) => Some(SessionState::Idle),
            _ => None,
        }
    }

    pub fn transition(&mut self, event: SessionEvent) -> SessionResult<SessionState> {
        tracing::debug!(from = ?self.state, ?event, "request session transition");
        let to = self.next_state(event).ok_or_else(|| {
            let from = self.state;
            tracing::warn!(?from, ?event, "invalid session transition requested");
            SessionError::InvalidTransition { from, event }
        })?;

        self.history.push(SessionTransition {
            from: self.state,
            event,
            to,
        });
        self.state = to;
        Ok(to)
    }
}

impl std::fmt::Display for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionState::{:?}", self.state)
    }
}
