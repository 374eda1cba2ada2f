use super::orchestrator::PaymentOrchestrator;
use crate::domain::ports::{OrderItem, OrderReceipt, OrderSubmission, PaymentConfig, SharedBackend};
use crate::domain::session::{AttemptId, AuthToken, Provider};
use crate::error::{CheckoutError, PaymentError};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;

/// The checkout page's side of the payment core.
///
/// Picks a provider the backend allows, mounts it, and turns a successful
/// payment into an order. Payment failures are surfaced with the orchestrator's
/// message unchanged.
pub struct CheckoutController {
    backend: SharedBackend,
    orchestrator: Arc<PaymentOrchestrator>,
    auth: Option<AuthToken>,
    options: OnceCell<PaymentConfig>,
    placing: AtomicBool,
}

impl CheckoutController {
    pub fn new(
        backend: SharedBackend,
        orchestrator: Arc<PaymentOrchestrator>,
        auth: Option<AuthToken>,
    ) -> Self {
        Self {
            backend,
            orchestrator,
            auth,
            options: OnceCell::new(),
            placing: AtomicBool::new(false),
        }
    }

    pub fn orchestrator(&self) -> &PaymentOrchestrator {
        &self.orchestrator
    }

    /// Fetched once per controller.
    pub async fn load_payment_options(&self) -> Result<PaymentConfig, CheckoutError> {
        self.options
            .get_or_try_init(|| async {
                let config = self
                    .backend
                    .payment_config()
                    .await
                    .map_err(CheckoutError::Options)?;
                tracing::debug!(?config, "payment options loaded");
                Ok::<_, CheckoutError>(config)
            })
            .await
            .copied()
    }

    pub async fn select_provider(
        &self,
        provider: Provider,
        amount: Decimal,
    ) -> Result<AttemptId, CheckoutError> {
        let options = self.load_payment_options().await?;
        if options.payments_suspended {
            return Err(PaymentError::PaymentsSuspended.into());
        }
        if !options.allows(provider) {
            return Err(PaymentError::ProviderDisabled.into());
        }

        Ok(self
            .orchestrator
            .mount(amount, provider, self.auth.clone())
            .await?)
    }

    pub fn can_place_order(&self) -> bool {
        self.orchestrator.is_ready() && !self.placing.load(Ordering::Acquire)
    }

    /// Confirms the payment and submits the order it pays for.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn place_order(&self, items: Vec<OrderItem>) -> Result<OrderReceipt, CheckoutError> {
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let auth = self.auth.as_ref().ok_or(PaymentError::NotAuthenticated)?;
        let provider = self
            .orchestrator
            .current_provider()
            .ok_or(PaymentError::NotReady)?;

        if self.placing.swap(true, Ordering::AcqRel) {
            return Err(PaymentError::ConfirmInProgress.into());
        }
        let _placing = PlacingGuard(&self.placing);

        let result = self.orchestrator.confirm_payment().await;
        if !result.success() {
            let message = result
                .error_message()
                .unwrap_or_default()
                .to_string();
            return Err(CheckoutError::Payment(message));
        }

        let order = OrderSubmission {
            items,
            payment_method: provider,
            transaction_id: result.transaction_id().map(str::to_string),
        };
        let receipt = self.backend.submit_order(auth, &order).await?;
        tracing::info!(order = %receipt.order_id, "order placed");
        Ok(receipt)
    }

    pub async fn retry_payment(&self) -> Result<AttemptId, CheckoutError> {
        Ok(self.orchestrator.retry(self.auth.clone()).await?)
    }
}

struct PlacingGuard<'a>(&'a AtomicBool);

impl Drop for PlacingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
