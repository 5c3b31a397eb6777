//! Session identity and token lifecycle.

use serde::{Deserialize, Serialize};

use crate::method::Method;

/// Per-verification-session identity state.
///
/// Created when the orchestrator starts, mutated only by the trust evaluator
/// and method controllers, and cleared when the orchestrator finalizes.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Stable external identity reference ("acid").
    pub subject_id: String,
    /// Server-issued session identifier; absent until the trust check returns one.
    pub session_id: Option<String>,
    /// Opaque bearer credential; absent until a method succeeds or the trust
    /// check grants it.
    pub auth_token: Option<String>,
    /// Enrollment/update flow rather than login flow.
    pub update_mode: bool,
}

impl Session {
    pub fn new(subject_id: impl Into<String>, update_mode: bool) -> Self {
        Self {
            subject_id: subject_id.into(),
            update_mode,
            ..Self::default()
        }
    }

    /// Adopt a bearer token. `None` leaves the current token untouched.
    pub fn set_auth_token(&mut self, token: Option<String>) {
        if let Some(token) = token {
            self.auth_token = Some(token);
        }
    }

    /// Adopt a server-issued session id. `None` leaves the current id untouched.
    pub fn set_session_id(&mut self, session_id: Option<String>) {
        if let Some(id) = session_id {
            self.session_id = Some(id);
        }
    }

    /// Drop all session state. The subject id is kept for log correlation.
    pub fn clear(&mut self) {
        self.session_id = None;
        self.auth_token = None;
    }
}

/// Result of one method controller invocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptResult {
    Pending,
    Success,
    Failure,
    Exhausted,
}

/// Transient record of a single controller invocation.
#[derive(Debug, Clone)]
pub struct VerificationAttempt {
    pub method: Method,
    pub attempt_number: u32,
    pub result: AttemptResult,
    pub error_detail: Option<String>,
}

impl VerificationAttempt {
    pub fn started(method: Method, attempt_number: u32) -> Self {
        Self {
            method,
            attempt_number,
            result: AttemptResult::Pending,
            error_detail: None,
        }
    }

    pub fn succeed(&mut self) {
        self.result = AttemptResult::Success;
    }

    pub fn fail(&mut self, detail: impl Into<String>) {
        self.result = AttemptResult::Failure;
        self.error_detail = Some(detail.into());
    }

    pub fn exhaust(&mut self, detail: impl Into<String>) {
        self.result = AttemptResult::Exhausted;
        self.error_detail = Some(detail.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_adoption_ignores_none() {
        let mut session = Session::new("acid-1", false);
        session.set_auth_token(Some("tok".into()));
        session.set_auth_token(None);
        assert_eq!(session.auth_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_clear_keeps_subject() {
        let mut session = Session::new("acid-1", false);
        session.set_session_id(Some("aid-9".into()));
        session.set_auth_token(Some("tok".into()));
        session.clear();
        assert_eq!(session.subject_id, "acid-1");
        assert!(session.session_id.is_none());
        assert!(session.auth_token.is_none());
    }

    #[test]
    fn test_attempt_transitions() {
        let mut attempt = VerificationAttempt::started(Method::Face, 2);
        assert_eq!(attempt.result, AttemptResult::Pending);
        attempt.fail("count=0");
        assert_eq!(attempt.result, AttemptResult::Failure);
        assert_eq!(attempt.error_detail.as_deref(), Some("count=0"));
        attempt.exhaust("count=0 on final try");
        assert_eq!(attempt.result, AttemptResult::Exhausted);
    }
}
