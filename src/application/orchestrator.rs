use super::embedded::{EmbeddedFormAdapter, parse_intent_id};
use super::hosted::HostedWindowAdapter;
use super::initializer::{InitOutcome, SessionInitializer};
use super::loader::{LoaderState, ScriptLoader};
use super::readiness::{Readiness, ReadinessTracker};
use super::validator::SessionValidator;
use crate::config::OrchestratorConfig;
use crate::domain::amount::Amount;
use crate::domain::ports::{
    SharedBackend, SharedEmbeddedSdk, SharedMessageBus, SharedScriptHost, SharedSurface,
};
use crate::domain::result::PaymentResult;
use crate::domain::session::{
    AttemptId, AuthToken, PaymentSession, PaymentStatus, Provider, SessionKey,
};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Browser-side collaborators of the orchestrator.
#[derive(Clone)]
pub struct ProviderRuntime {
    pub script_host: SharedScriptHost,
    pub surface: SharedSurface,
    pub bus: SharedMessageBus,
    pub embedded_sdk: SharedEmbeddedSdk,
}

/// One payment attempt: a session plus the handles that fence it.
struct Attempt {
    id: AttemptId,
    key: SessionKey,
    session: Mutex<PaymentSession>,
    cancel: CancellationToken,
    confirming: AtomicBool,
    form_released: AtomicBool,
}

impl Attempt {
    fn new(session: PaymentSession) -> Self {
        Self {
            id: session.attempt,
            key: session.key(),
            session: Mutex::new(session),
            cancel: CancellationToken::new(),
            confirming: AtomicBool::new(false),
            form_released: AtomicBool::new(false),
        }
    }

    fn with_session<R>(&self, apply: impl FnOnce(&mut PaymentSession) -> R) -> R {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut session)
    }

    fn snapshot(&self) -> PaymentSession {
        self.with_session(|s| s.clone())
    }
}

/// Turns a cart total into a provider-agnostic `PaymentResult`.
///
/// Only the most recent attempt is live. Mounting with a different amount or
/// provider, retrying, or unmounting retires the previous attempt: its
/// cancellation token fires, its readiness updates are fenced off, and any
/// completion still in flight for it is discarded without touching state.
pub struct PaymentOrchestrator {
    initializer: SessionInitializer,
    loader: ScriptLoader,
    hosted: HostedWindowAdapter,
    embedded: EmbeddedFormAdapter,
    validator: SessionValidator,
    readiness: ReadinessTracker,
    completion_timeout: Duration,
    next_attempt: AtomicU64,
    current: Mutex<Option<Arc<Attempt>>>,
}

impl PaymentOrchestrator {
    pub fn new(
        backend: SharedBackend,
        runtime: ProviderRuntime,
        config: &OrchestratorConfig,
    ) -> std::result::Result<Self, url::ParseError> {
        Ok(Self {
            initializer: SessionInitializer::new(backend.clone(), config.request_timeout()),
            loader: ScriptLoader::new(runtime.script_host, &config.hosted),
            hosted: HostedWindowAdapter::new(runtime.surface, runtime.bus, &config.hosted)?,
            embedded: EmbeddedFormAdapter::new(runtime.embedded_sdk, config.mount_timeout()),
            validator: SessionValidator::new(backend, config.request_timeout()),
            readiness: ReadinessTracker::new(),
            completion_timeout: config.completion_timeout(),
            next_attempt: AtomicU64::new(1),
            current: Mutex::new(None),
        })
    }

    pub fn readiness(&self) -> watch::Receiver<Readiness> {
        self.readiness.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.current().ready
    }

    pub fn status(&self) -> Option<PaymentStatus> {
        self.current_attempt().map(|a| a.snapshot().status())
    }

    pub fn current_attempt_id(&self) -> Option<AttemptId> {
        self.current_attempt().map(|a| a.id)
    }

    pub fn current_provider(&self) -> Option<Provider> {
        self.current_attempt().map(|a| a.key.provider)
    }

    pub fn loader_state(&self) -> LoaderState {
        self.loader.state()
    }

    /// Sets up the payment UI for `amount` and `provider`.
    ///
    /// Mounting again with the same amount and provider is a no-op that
    /// returns the live attempt; no second session is requested.
    #[tracing::instrument(skip(self, auth))]
    pub async fn mount(
        &self,
        amount: Decimal,
        provider: Provider,
        auth: Option<AuthToken>,
    ) -> Result<AttemptId> {
        let key = SessionKey {
            amount: Amount::new(amount)?,
            provider,
        };

        let attempt = {
            let mut current = self.lock_current();
            if let Some(active) = current.as_ref()
                && active.key == key
            {
                return Ok(active.id);
            }
            let session = PaymentSession::new(self.next_id(), key);
            self.install(&mut current, session)
        };

        self.prepare_attempt(attempt, auth).await
    }

    /// Explicit user retry: a fresh session for the current amount and provider.
    #[tracing::instrument(skip(self, auth))]
    pub async fn retry(&self, auth: Option<AuthToken>) -> Result<AttemptId> {
        let attempt = {
            let mut current = self.lock_current();
            let Some(previous) = current.as_ref() else {
                return Err(PaymentError::NotReady);
            };
            let mut session = previous.snapshot();
            session.reset();
            session.attempt = self.next_id();
            self.install(&mut current, session)
        };

        self.prepare_attempt(attempt, auth).await
    }

    /// Tears the payment UI down. Anything still in flight becomes a no-op.
    pub fn unmount(&self) {
        if let Some(previous) = self.lock_current().take() {
            self.retire(&previous);
        }
    }

    /// Runs the provider's completion protocol for the live attempt.
    ///
    /// Never fails: every outcome, including misuse, is a `PaymentResult`.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(&self) -> PaymentResult {
        let Some(attempt) = self.current_attempt() else {
            return PaymentError::NotReady.into();
        };

        let session = attempt.snapshot();
        let status = session.status();
        if status != PaymentStatus::AwaitingUserAction {
            let err = if let Some(failure) = session.failure() {
                failure.clone()
            } else if status.is_terminal() {
                PaymentError::AttemptFinished
            } else if attempt.confirming.load(Ordering::Acquire) {
                PaymentError::ConfirmInProgress
            } else {
                PaymentError::NotReady
            };
            return err.into();
        }

        if attempt.confirming.swap(true, Ordering::AcqRel) {
            return PaymentError::ConfirmInProgress.into();
        }

        let outcome = tokio::select! {
            biased;
            _ = attempt.cancel.cancelled() => None,
            _ = tokio::time::sleep(self.completion_timeout) => Some(Err(PaymentError::Timeout)),
            outcome = self.complete(&attempt, &session) => Some(outcome),
        };

        match outcome {
            Some(outcome) if !attempt.cancel.is_cancelled() => self.record(&attempt, outcome),
            _ => {
                tracing::debug!(attempt = %attempt.id, "attempt torn down, discarding its outcome");
                PaymentError::Closed.into()
            }
        }
    }

    async fn complete(&self, attempt: &Attempt, session: &PaymentSession) -> Result<String> {
        let token = session
            .session_token
            .clone()
            .ok_or(PaymentError::SessionIncomplete)?;

        match session.provider {
            Provider::HostedWindow => {
                let secondary = session
                    .secondary_token
                    .clone()
                    .ok_or(PaymentError::SessionIncomplete)?;
                let payload = self.hosted.await_completion(&token).await?;
                attempt.with_session(|s| s.advance(PaymentStatus::Validating))?;
                self.validator.validate(payload, &token, &secondary).await
            }
            Provider::EmbeddedForm => {
                let identifier = self.embedded.confirm(&token).await?;
                attempt.with_session(|s| s.advance(PaymentStatus::Validating))?;
                parse_intent_id(&identifier)
            }
        }
    }

    /// Applies the terminal transition and produces the attempt's only result.
    fn record(&self, attempt: &Attempt, outcome: Result<String>) -> PaymentResult {
        let result = attempt.with_session(|s| match outcome {
            Ok(transaction_id) => match s.advance(PaymentStatus::Succeeded) {
                Ok(()) => PaymentResult::succeeded(transaction_id),
                Err(err) => {
                    s.fail(err.clone());
                    err.into()
                }
            },
            Err(PaymentError::Cancelled) if s.advance(PaymentStatus::Cancelled).is_ok() => {
                PaymentError::Cancelled.into()
            }
            Err(err) => {
                s.fail(err.clone());
                err.into()
            }
        });

        self.readiness.clear(attempt.id);
        self.release_form(attempt);
        tracing::info!(
            attempt = %attempt.id,
            success = result.success(),
            "payment attempt finished"
        );
        result
    }

    async fn prepare_attempt(
        &self,
        attempt: Arc<Attempt>,
        auth: Option<AuthToken>,
    ) -> Result<AttemptId> {
        let outcome = tokio::select! {
            biased;
            _ = attempt.cancel.cancelled() => return Err(PaymentError::Closed),
            outcome = self.prepare(&attempt, auth.as_ref()) => outcome,
        };
        if attempt.cancel.is_cancelled() {
            return Err(PaymentError::Closed);
        }

        match outcome {
            Ok(()) => {
                self.readiness.mark_ready(attempt.id);
                tracing::info!(attempt = %attempt.id, provider = %attempt.key.provider, "payment ready");
                Ok(attempt.id)
            }
            Err(err) => {
                attempt.with_session(|s| s.fail(err.clone()));
                self.readiness.mark_failed(attempt.id, err.to_string());
                Err(err)
            }
        }
    }

    async fn prepare(&self, attempt: &Attempt, auth: Option<&AuthToken>) -> Result<()> {
        let key = attempt.key;
        let (created, script) = match key.provider {
            Provider::HostedWindow => {
                // a signed-out caller must not wait on, or trigger, the script load
                let auth = auth.ok_or(PaymentError::NotAuthenticated)?;
                let (created, script) = tokio::try_join!(
                    self.initializer.initialize(key, Some(auth)),
                    async { Ok::<_, PaymentError>(self.loader.ensure_loaded().await) }
                )?;
                (created, Some(script))
            }
            Provider::EmbeddedForm => (self.initializer.initialize(key, auth).await?, None),
        };

        let response = match created {
            InitOutcome::Created(response) => response,
            InitOutcome::AlreadyRequested => {
                tracing::warn!(attempt = %attempt.id, "session for this attempt was already requested");
                return Err(PaymentError::SessionIncomplete);
            }
        };
        let token = response.session_token.clone();
        let has_secondary = response.secondary_token.is_some();
        attempt.with_session(|s| {
            s.session_token = Some(response.session_token);
            s.secondary_token = response.secondary_token;
            s.advance(PaymentStatus::Initializing)
        })?;

        match (key.provider, script) {
            (Provider::HostedWindow, Some(LoaderState::Failed(message))) => {
                return Err(PaymentError::ProviderLoadFailed(message));
            }
            (Provider::HostedWindow, _) if !has_secondary => {
                return Err(PaymentError::SessionIncomplete);
            }
            (Provider::EmbeddedForm, _) => self.embedded.prepare(&token).await?,
            _ => {}
        }

        attempt.with_session(|s| s.advance(PaymentStatus::AwaitingUserAction))
    }

    fn install(&self, current: &mut Option<Arc<Attempt>>, session: PaymentSession) -> Arc<Attempt> {
        if let Some(previous) = current.take() {
            self.retire(&previous);
        }
        let attempt = Arc::new(Attempt::new(session));
        self.readiness.begin(attempt.id, attempt.key.provider);
        *current = Some(attempt.clone());
        tracing::debug!(attempt = %attempt.id, provider = %attempt.key.provider, "payment attempt started");
        attempt
    }

    fn retire(&self, attempt: &Attempt) {
        attempt.cancel.cancel();
        self.initializer.forget(&attempt.key);
        self.readiness.clear(attempt.id);
        self.release_form(attempt);
        tracing::debug!(attempt = %attempt.id, "payment attempt retired");
    }

    /// Unmounts the embedded form at most once per attempt.
    fn release_form(&self, attempt: &Attempt) {
        if attempt.key.provider == Provider::EmbeddedForm
            && !attempt.form_released.swap(true, Ordering::AcqRel)
        {
            self.embedded.release();
        }
    }

    fn next_id(&self) -> AttemptId {
        AttemptId(self.next_attempt.fetch_add(1, Ordering::Relaxed))
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<Arc<Attempt>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_attempt(&self) -> Option<Arc<Attempt>> {
        self.lock_current().clone()
    }
}

impl Drop for PaymentOrchestrator {
    fn drop(&mut self) {
        self.unmount();
    }
}
