//! Confirmation gate for destructive actions.
//!
//! The engine never prompts. A destructive intent becomes a pending
//! [`ConfirmationRequest`] handed to the presentation layer, which answers
//! with the request's token. Only one request is pending at a time; a new
//! one supersedes the old. A request only resolves for the user who made it.

use crate::{ExerciseId, UserId};
use std::fmt;

/// Action waiting for the user's go-ahead
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingAction {
    DeleteExercise { id: ExerciseId, name: String },
    ClearSession,
    DeleteTemplate { name: String },
}

impl PendingAction {
    /// Question to put to the user
    pub fn prompt(&self) -> String {
        match self {
            PendingAction::DeleteExercise { name, .. } => {
                format!("Delete '{}' and all of its sets?", name)
            }
            PendingAction::ClearSession => "Clear every exercise from this session?".to_string(),
            PendingAction::DeleteTemplate { name } => format!("Delete template '{}'?", name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConfirmationToken(u64);

impl fmt::Display for ConfirmationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub token: ConfirmationToken,
    pub action: PendingAction,
    /// Active user when the request was made
    pub requested_by: Option<UserId>,
}

#[derive(Debug, Default)]
pub struct ConfirmationGate {
    pending: Option<ConfirmationRequest>,
    issued: u64,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&ConfirmationRequest> {
        self.pending.as_ref()
    }

    /// Park `action` until it is confirmed or cancelled
    pub fn request(
        &mut self,
        action: PendingAction,
        requested_by: Option<UserId>,
    ) -> ConfirmationRequest {
        if let Some(previous) = self.pending.take() {
            tracing::debug!("Confirmation {} superseded", previous.token);
        }
        self.issued += 1;
        let request = ConfirmationRequest {
            token: ConfirmationToken(self.issued),
            action,
            requested_by,
        };
        self.pending = Some(request.clone());
        request
    }

    /// Release the pending action if `token` matches it and `active_user`
    /// is the user who requested it. A request from another user is dropped.
    pub fn confirm(
        &mut self,
        token: ConfirmationToken,
        active_user: Option<&UserId>,
    ) -> crate::Result<PendingAction> {
        let request = self.take(token)?;
        if request.requested_by.as_ref() != active_user {
            tracing::warn!("Confirmation {} dropped, active user changed", token);
            return Err(crate::Error::ConfirmationMismatch);
        }
        Ok(request.action)
    }

    /// Drop the pending action if `token` matches it
    pub fn cancel(&mut self, token: ConfirmationToken) -> crate::Result<()> {
        self.take(token).map(|_| ())
    }

    /// Drop whatever is pending
    pub fn clear(&mut self) {
        self.pending = None;
    }

    fn take(&mut self, token: ConfirmationToken) -> crate::Result<ConfirmationRequest> {
        match self.pending.take() {
            Some(request) if request.token == token => Ok(request),
            other => {
                self.pending = other;
                Err(crate::Error::ConfirmationMismatch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_confirm_releases_action() {
        let mut gate = ConfirmationGate::new();
        let req = gate.request(PendingAction::ClearSession, None);

        assert_eq!(gate.confirm(req.token, None).unwrap(), PendingAction::ClearSession);
        assert!(gate.pending().is_none());
        assert!(matches!(
            gate.confirm(req.token, None),
            Err(Error::ConfirmationMismatch)
        ));
    }

    #[test]
    fn test_new_request_supersedes() {
        let mut gate = ConfirmationGate::new();
        let first = gate.request(PendingAction::ClearSession, None);
        let second = gate.request(
            PendingAction::DeleteTemplate {
                name: "Legs".into(),
            },
            None,
        );

        assert!(matches!(
            gate.confirm(first.token, None),
            Err(Error::ConfirmationMismatch)
        ));
        assert_eq!(gate.pending(), Some(&second));
        gate.cancel(second.token).unwrap();
        assert!(gate.pending().is_none());
    }

    #[test]
    fn test_request_from_other_user_is_dropped() {
        let mut gate = ConfirmationGate::new();
        let ann = UserId::new("ann@example.com");
        let bob = UserId::new("bob@example.com");
        let req = gate.request(
            PendingAction::DeleteTemplate {
                name: "Legs".into(),
            },
            Some(ann.clone()),
        );

        assert!(matches!(
            gate.confirm(req.token, Some(&bob)),
            Err(Error::ConfirmationMismatch)
        ));
        assert!(gate.pending().is_none());
        assert!(gate.confirm(req.token, Some(&ann)).is_err());
    }

    #[test]
    fn test_prompt_names_target() {
        let action = PendingAction::DeleteTemplate {
            name: "Push Day".into(),
        };
        assert!(action.prompt().contains("Push Day"));
    }
}
