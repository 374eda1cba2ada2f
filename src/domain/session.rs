use super::amount::Amount;
use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two interchangeable payment integrations offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Processor-controlled UI in an iframe or popup, completion via messages.
    #[serde(alias = "hosted")]
    HostedWindow,
    /// SDK form element mounted in the page, completion via a confirm call.
    #[serde(alias = "embedded")]
    EmbeddedForm,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::HostedWindow => "hosted_window",
            Provider::EmbeddedForm => "embedded_form",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted_window" | "hosted" => Ok(Provider::HostedWindow),
            "embedded_form" | "embedded" => Ok(Provider::EmbeddedForm),
            other => Err(format!("unknown payment provider '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PaymentStatus {
    Uninitialized,
    Initializing,
    AwaitingUserAction,
    Validating,
    Succeeded,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Succeeded | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }

    /// Forward transitions only. Going back to `Uninitialized` is a retry and
    /// goes through `PaymentSession::reset`.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match (self, next) {
            (Uninitialized, Initializing)
            | (Initializing, AwaitingUserAction)
            | (AwaitingUserAction, Validating)
            | (AwaitingUserAction, Cancelled)
            | (Validating, Succeeded) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Identifies one payment attempt within an orchestrator. Later attempts have
/// larger ids; the id fences readiness updates and late completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Backend-issued identifier of a payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider secret needed to validate a hosted payment server-side.
///
/// No `Display`, and `Debug` is redacted. Only the validation request reads
/// the raw value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecondaryToken(String);

impl SecondaryToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecondaryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecondaryToken(<redacted>)")
    }
}

/// Bearer token of the signed-in customer.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Returns `None` for empty or blank tokens, which count as signed out.
    pub fn parse(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// One session request is made per key and mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub amount: Amount,
    pub provider: Provider,
}

/// State of one checkout payment attempt.
#[derive(Debug, Clone)]
pub struct PaymentSession {
    pub attempt: AttemptId,
    pub amount: Amount,
    pub provider: Provider,
    pub session_token: Option<SessionToken>,
    pub secondary_token: Option<SecondaryToken>,
    status: PaymentStatus,
    failure: Option<PaymentError>,
}

impl PaymentSession {
    pub fn new(attempt: AttemptId, key: SessionKey) -> Self {
        Self {
            attempt,
            amount: key.amount,
            provider: key.provider,
            session_token: None,
            secondary_token: None,
            status: PaymentStatus::Uninitialized,
            failure: None,
        }
    }

    pub fn key(&self) -> SessionKey {
        SessionKey {
            amount: self.amount,
            provider: self.provider,
        }
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    /// The error that moved this session to `Failed`, if any.
    pub fn failure(&self) -> Option<&PaymentError> {
        self.failure.as_ref()
    }

    pub fn advance(&mut self, next: PaymentStatus) -> Result<(), PaymentError> {
        if self.status.can_transition_to(next) {
            self.status = next;
            Ok(())
        } else {
            Err(PaymentError::InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }

    /// Moves to `Failed` and remembers why. A terminal session is left alone.
    pub fn fail(&mut self, error: PaymentError) {
        if !self.status.is_terminal() {
            self.status = PaymentStatus::Failed;
            self.failure = Some(error);
        }
    }

    /// Explicit user retry.
    pub fn reset(&mut self) {
        self.session_token = None;
        self.secondary_token = None;
        self.status = PaymentStatus::Uninitialized;
        self.failure = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn session() -> PaymentSession {
        PaymentSession::new(
            AttemptId(1),
            SessionKey {
                amount: Amount::new(dec!(10.00)).unwrap(),
                provider: Provider::HostedWindow,
            },
        )
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut s = session();
        s.advance(PaymentStatus::Initializing).unwrap();
        s.advance(PaymentStatus::AwaitingUserAction).unwrap();
        s.advance(PaymentStatus::Validating).unwrap();
        s.advance(PaymentStatus::Succeeded).unwrap();
        assert!(s.status().is_terminal());
    }

    #[test]
    fn test_transitions_are_monotonic() {
        let mut s = session();
        s.advance(PaymentStatus::Initializing).unwrap();
        let err = s.advance(PaymentStatus::Uninitialized).unwrap_err();
        assert_eq!(
            err,
            PaymentError::InvalidTransition {
                from: PaymentStatus::Initializing,
                to: PaymentStatus::Uninitialized,
            }
        );
        assert!(s.advance(PaymentStatus::Succeeded).is_err());
    }

    #[test]
    fn test_cancel_only_while_awaiting_user() {
        assert!(PaymentStatus::AwaitingUserAction.can_transition_to(PaymentStatus::Cancelled));
        assert!(!PaymentStatus::Validating.can_transition_to(PaymentStatus::Cancelled));
    }

    #[test]
    fn test_fail_is_sticky_once_terminal() {
        let mut s = session();
        s.advance(PaymentStatus::Initializing).unwrap();
        s.advance(PaymentStatus::AwaitingUserAction).unwrap();
        s.advance(PaymentStatus::Cancelled).unwrap();
        s.fail(PaymentError::Timeout);
        assert_eq!(s.status(), PaymentStatus::Cancelled);
        assert!(s.failure().is_none());
    }

    #[test]
    fn test_reset_clears_tokens() {
        let mut s = session();
        s.session_token = Some(SessionToken::new("chk_1"));
        s.secondary_token = Some(SecondaryToken::new("sec"));
        s.fail(PaymentError::PopupBlocked);
        s.reset();
        assert_eq!(s.status(), PaymentStatus::Uninitialized);
        assert!(s.session_token.is_none());
        assert!(s.secondary_token.is_none());
        assert!(s.failure().is_none());
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let secret = SecondaryToken::new("super-secret");
        assert!(!format!("{secret:?}").contains("super-secret"));
        let auth = AuthToken::parse("bearer-value").unwrap();
        assert!(!format!("{auth:?}").contains("bearer-value"));
    }

    #[test]
    fn test_blank_auth_token_is_absent() {
        assert!(AuthToken::parse("").is_none());
        assert!(AuthToken::parse("   ").is_none());
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("hosted_window".parse(), Ok(Provider::HostedWindow));
        assert_eq!("Embedded".parse(), Ok(Provider::EmbeddedForm));
        assert!("paypal".parse::<Provider>().is_err());
    }
}
