use crate::domain::session::Provider;
use crate::error::Error;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// How the simulated customer, provider and backend behave in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Approve,
    Cancel,
    Decline,
    RejectValidation,
    ScriptBlocked,
    IframeBlocked,
    PopupBlocked,
    MountFailed,
    SessionError,
    NoAuth,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    pub scenario: String,
    /// Kept unvalidated so non-positive totals can be exercised.
    pub amount: Decimal,
    pub provider: Provider,
    pub outcome: Outcome,
}

/// Reads checkout scenarios from a CSV source with the header
/// `scenario, amount, provider, outcome`.
pub struct ScenarioReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ScenarioReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn scenarios(self) -> impl Iterator<Item = Result<Scenario, Error>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(Error::from))
    }
}
