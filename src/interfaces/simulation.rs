//! Runs checkout scenarios end to end against the in-process doubles.

use super::csv::scenario_reader::{Outcome, Scenario};
use crate::application::checkout::CheckoutController;
use crate::application::orchestrator::{PaymentOrchestrator, ProviderRuntime};
use crate::config::OrchestratorConfig;
use crate::domain::ports::ValidationResponse;
use crate::domain::result::PaymentResult;
use crate::domain::session::{AuthToken, Provider};
use crate::error::{BackendError, Error};
use crate::infrastructure::browser::{
    BrowserBehavior, EmbeddedBehavior, HostedReply, SimulatedBrowser, SimulatedEmbeddedSdk,
};
use crate::infrastructure::in_memory::InMemoryPaymentBackend;
use crate::infrastructure::message_bus::ChannelMessageBus;
use std::sync::Arc;

const SIMULATED_AUTH: &str = "simulated-customer";

struct Setup {
    backend: InMemoryPaymentBackend,
    browser: BrowserBehavior,
    sdk: EmbeddedBehavior,
    auth: Option<AuthToken>,
}

/// Pays for one scenario's cart and reports what the customer would see.
#[tracing::instrument(skip_all, fields(scenario = %scenario.scenario))]
pub async fn run_scenario(
    scenario: &Scenario,
    config: &OrchestratorConfig,
) -> Result<PaymentResult, Error> {
    let setup = setup(scenario)?;
    let backend = Arc::new(setup.backend);
    let bus = ChannelMessageBus::new();
    let browser = Arc::new(
        SimulatedBrowser::new(bus.clone(), setup.browser)
            .with_message_prefix(config.hosted.message_prefix.clone()),
    );
    let runtime = ProviderRuntime {
        script_host: browser.clone(),
        surface: browser,
        bus: Arc::new(bus),
        embedded_sdk: Arc::new(SimulatedEmbeddedSdk::new(setup.sdk)),
    };

    let orchestrator = Arc::new(PaymentOrchestrator::new(backend.clone(), runtime, config)?);
    let checkout = CheckoutController::new(backend, orchestrator.clone(), setup.auth);

    if let Err(err) = checkout
        .select_provider(scenario.provider, scenario.amount)
        .await
    {
        tracing::debug!(error = %err, "provider could not be prepared");
        return Ok(PaymentResult::failed(err.to_string()));
    }

    let result = orchestrator.confirm_payment().await;
    orchestrator.unmount();
    Ok(result)
}

fn setup(scenario: &Scenario) -> Result<Setup, Error> {
    let mut setup = Setup {
        backend: InMemoryPaymentBackend::new(),
        browser: BrowserBehavior::default(),
        sdk: EmbeddedBehavior::default(),
        auth: AuthToken::parse(SIMULATED_AUTH),
    };
    let hosted = scenario.provider == Provider::HostedWindow;
    let approve = HostedReply::success(&processor_transaction_id(scenario).to_string());

    match (scenario.outcome, hosted) {
        (Outcome::Approve, true) => setup.browser.hosted_reply = Some(approve),
        (Outcome::Approve, false) => {}
        (Outcome::Cancel, true) => setup.browser.hosted_reply = Some(HostedReply::hide()),
        (Outcome::Decline, true) => {
            setup.browser.hosted_reply = Some(HostedReply::aborted("Card declined"));
        }
        (Outcome::Decline, false) => {
            setup.sdk.confirm_outcome = Some(Err("Your card was declined.".to_string()));
        }
        (Outcome::RejectValidation, true) => {
            setup.browser.hosted_reply = Some(approve);
            setup.backend = setup.backend.with_validation_reply(ValidationResponse {
                status: Some("failed".to_string()),
                transaction_id: None,
                message: Some("Payment could not be verified".to_string()),
            });
        }
        (Outcome::ScriptBlocked, true) => setup.browser.script_blocked = true,
        (Outcome::IframeBlocked, true) => {
            setup.browser.iframe_blocked = true;
            setup.browser.hosted_reply = Some(approve);
        }
        (Outcome::PopupBlocked, true) => {
            setup.browser.iframe_blocked = true;
            setup.browser.popup_blocked = true;
        }
        (Outcome::MountFailed, false) => {
            setup.sdk.mount_error = Some("payment element failed to load".to_string());
        }
        (Outcome::SessionError, _) => {
            setup.backend = setup.backend.failing_sessions(BackendError::Rejected {
                status: 503,
                message: Some("Payment service unavailable".to_string()),
            });
        }
        (Outcome::NoAuth, _) => setup.auth = None,
        (outcome, _) => {
            return Err(Error::Scenario(format!(
                "{outcome:?} is not possible with {}",
                scenario.provider
            )));
        }
    }
    Ok(setup)
}

/// A stable processor transaction number for the scenario's approval.
fn processor_transaction_id(scenario: &Scenario) -> u64 {
    scenario
        .scenario
        .bytes()
        .fold(1000u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)) % 1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn scenario(provider: Provider, outcome: Outcome) -> Scenario {
        Scenario {
            scenario: "s".to_string(),
            amount: dec!(20.00),
            provider,
            outcome,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_embedded_approval() {
        let result = run_scenario(
            &scenario(Provider::EmbeddedForm, Outcome::Approve),
            &OrchestratorConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(result, PaymentResult::succeeded("pi_1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_rejection_message() {
        let result = run_scenario(
            &scenario(Provider::HostedWindow, Outcome::RejectValidation),
            &OrchestratorConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(result.error_message(), Some("Payment could not be verified"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_popup_blocked() {
        let result = run_scenario(
            &scenario(Provider::HostedWindow, Outcome::PopupBlocked),
            &OrchestratorConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(result, PaymentResult::from(crate::error::PaymentError::PopupBlocked));
    }

    #[tokio::test(start_paused = true)]
    async fn test_impossible_combination_is_rejected() {
        let err = run_scenario(
            &scenario(Provider::EmbeddedForm, Outcome::ScriptBlocked),
            &OrchestratorConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Scenario(_)));
    }
}
