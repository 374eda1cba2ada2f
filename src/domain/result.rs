use crate::error::PaymentError;
use serde::Serialize;

/// Provider-agnostic outcome of one payment attempt, handed to the checkout
/// page. Exactly one of `transaction_id` / `error_message` is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl PaymentResult {
    pub fn succeeded(transaction_id: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id.into()),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_id: None,
            error_message: Some(message.into()),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

impl From<PaymentError> for PaymentResult {
    fn from(err: PaymentError) -> Self {
        PaymentResult::failed(err.to_string())
    }
}

impl From<Result<String, PaymentError>> for PaymentResult {
    fn from(outcome: Result<String, PaymentError>) -> Self {
        match outcome {
            Ok(transaction_id) => PaymentResult::succeeded(transaction_id),
            Err(err) => err.into(),
        }
    }
}
