//! Per-session conversation state
//!
//! The session is either [`SessionStatus::Empty`] (nothing indexed, questions
//! are refused) or [`SessionStatus::Indexed`]. History is append-only until
//! [`SessionState::reset`].

use crate::types::{ChatTurn, Upload};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Empty,
    Indexed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Indexed => "indexed",
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    status: SessionStatus,
    history: Vec<ChatTurn>,
    uploads: Vec<Upload>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Indexed
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// The last `window` turns, oldest first
    pub fn recent_history(&self, window: usize) -> &[ChatTurn] {
        let start = self.history.len().saturating_sub(window);
        &self.history[start..]
    }

    pub fn uploads(&self) -> &[Upload] {
        &self.uploads
    }

    /// Replace the pending uploads
    pub fn set_uploads(&mut self, uploads: Vec<Upload>) {
        self.uploads = uploads;
    }

    pub fn push_turn(&mut self, turn: ChatTurn) {
        self.history.push(turn);
    }

    pub fn mark_indexed(&mut self) {
        self.status = SessionStatus::Indexed;
    }

    pub fn mark_empty(&mut self) {
        self.status = SessionStatus::Empty;
    }

    /// Back to a fresh session
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let state = SessionState::new();
        assert_eq!(state.status(), SessionStatus::Empty);
        assert!(!state.is_ready());
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_recent_history_window() {
        let mut state = SessionState::new();
        for i in 0..5 {
            state.push_turn(ChatTurn::new(format!("q{}", i), format!("a{}", i)));
        }
        let recent = state.recent_history(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].question, "q2");
        assert_eq!(recent[2].question, "q4");
        assert!(state.recent_history(0).is_empty());
        assert_eq!(state.recent_history(10).len(), 5);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = SessionState::new();
        state.set_uploads(vec![Upload::new("a.pdf", vec![1, 2, 3])]);
        state.push_turn(ChatTurn::new("q", "a"));
        state.mark_indexed();

        state.reset();
        assert_eq!(state.status(), SessionStatus::Empty);
        assert!(state.history().is_empty());
        assert!(state.uploads().is_empty());
    }
}
