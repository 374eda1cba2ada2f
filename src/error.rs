use crate::domain::session::PaymentStatus;
use thiserror::Error;

pub const GENERIC_SESSION_FAILURE: &str = "Failed to initialize payment. Please try again.";
pub const GENERIC_VALIDATION_FAILURE: &str = "Payment validation failed. Please try again.";
pub const GENERIC_DECLINE: &str = "Payment was declined. Please try another card.";
pub const PROVIDER_LOAD_GUIDANCE: &str = "Payment window could not load. Please disable ad blockers or check your network connection, then refresh the page.";

/// Failures of a single payment attempt.
///
/// The `Display` text of every variant is safe to show to the customer; it is
/// what ends up in `PaymentResult::error_message`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    #[error("Please log in to continue with payment.")]
    NotAuthenticated,
    #[error("Payment amount must be greater than zero.")]
    InvalidAmount,
    #[error("{0}")]
    SessionCreationFailed(String),
    #[error("{0}")]
    ProviderLoadFailed(String),
    #[error("Popup blocked. Please allow popups for this site and try again.")]
    PopupBlocked,
    #[error("Payment failed: invalid response from payment provider.")]
    InvalidProviderResponse,
    #[error("{0}")]
    ValidationFailed(String),
    #[error("Payment was cancelled.")]
    Cancelled,
    #[error("{0}")]
    Declined(String),
    #[error("Payment not initialized. Please wait for the payment form to load.")]
    NotReady,
    #[error("Payment not initialized. Please refresh the page and try again.")]
    SessionIncomplete,
    #[error("A payment is already being processed.")]
    ConfirmInProgress,
    #[error("This payment attempt has already finished. Please start a new payment.")]
    AttemptFinished,
    #[error("This payment method is currently unavailable.")]
    ProviderDisabled,
    #[error("Payments are temporarily suspended. Please try again later.")]
    PaymentsSuspended,
    #[error("Payment timed out. Please try again.")]
    Timeout,
    #[error("Payment session was closed.")]
    Closed,
    #[error("Invalid payment status transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

/// Failures talking to the payments backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend rejected request ({status}): {}", .message.as_deref().unwrap_or("no detail"))]
    Rejected { status: u16, message: Option<String> },
    #[error("malformed backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// The backend-supplied detail, when the backend gave one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            BackendError::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Failures of the checkout page around the payment core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckoutError {
    #[error("{0}")]
    Payment(String),
    #[error(transparent)]
    Rejected(#[from] PaymentError),
    #[error("Order submission failed: {0}")]
    OrderSubmission(#[from] BackendError),
    #[error("Could not load payment options: {0}")]
    Options(BackendError),
    #[error("Cart is empty")]
    EmptyCart,
}

/// Errors surfaced by the command line front-end.
#[derive(Error, Debug)]
pub enum Error {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Invalid scenario: {0}")]
    Scenario(String),
}

pub type Result<T, E = PaymentError> = std::result::Result<T, E>;
