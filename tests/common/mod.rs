#![allow(dead_code)]

use cartpay::application::orchestrator::{PaymentOrchestrator, ProviderRuntime};
use cartpay::config::OrchestratorConfig;
use cartpay::domain::session::AuthToken;
use cartpay::infrastructure::browser::{
    BrowserBehavior, EmbeddedBehavior, SimulatedBrowser, SimulatedEmbeddedSdk,
};
use cartpay::infrastructure::in_memory::InMemoryPaymentBackend;
use cartpay::infrastructure::message_bus::ChannelMessageBus;
use std::sync::Arc;

pub struct Page {
    pub backend: Arc<InMemoryPaymentBackend>,
    pub bus: ChannelMessageBus,
    pub browser: Arc<SimulatedBrowser>,
    pub sdk: Arc<SimulatedEmbeddedSdk>,
    pub orchestrator: Arc<PaymentOrchestrator>,
}

pub fn page(
    backend: InMemoryPaymentBackend,
    browser: BrowserBehavior,
    sdk: EmbeddedBehavior,
) -> Page {
    page_with_config(backend, browser, sdk, &OrchestratorConfig::default())
}

pub fn page_with_config(
    backend: InMemoryPaymentBackend,
    browser: BrowserBehavior,
    sdk: EmbeddedBehavior,
    config: &OrchestratorConfig,
) -> Page {
    let backend = Arc::new(backend);
    let bus = ChannelMessageBus::new();
    let browser = Arc::new(SimulatedBrowser::new(bus.clone(), browser));
    let sdk = Arc::new(SimulatedEmbeddedSdk::new(sdk));
    let runtime = ProviderRuntime {
        script_host: browser.clone(),
        surface: browser.clone(),
        bus: Arc::new(bus.clone()),
        embedded_sdk: sdk.clone(),
    };
    let orchestrator = Arc::new(
        PaymentOrchestrator::new(backend.clone(), runtime, config).expect("valid config"),
    );
    Page {
        backend,
        bus,
        browser,
        sdk,
        orchestrator,
    }
}

pub fn auth() -> Option<AuthToken> {
    AuthToken::parse("customer-jwt")
}
