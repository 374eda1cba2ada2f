use cartpay::config::OrchestratorConfig;
use cartpay::domain::ports::PaymentBackend;
use cartpay::infrastructure::http::HttpPaymentBackend;
use cartpay::interfaces::csv::result_writer::ResultWriter;
use cartpay::interfaces::csv::scenario_reader::ScenarioReader;
use cartpay::interfaces::simulation::run_scenario;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file; omitted fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run checkout scenarios against simulated providers and print the results as CSV
    Simulate {
        /// Scenarios CSV file (scenario, amount, provider, outcome)
        scenarios: PathBuf,
    },
    /// Fetch the store's payment options from the backend
    Config {
        /// Overrides `api_base_url` from the config file
        #[arg(long)]
        api_url: Option<String>,
    },
}

fn init_logging() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .with_env_filter(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => OrchestratorConfig::load(path).into_diagnostic()?,
        None => OrchestratorConfig::default(),
    };

    match cli.command {
        Command::Simulate { scenarios } => simulate(scenarios, &config).await,
        Command::Config { api_url } => {
            let mut config = config;
            if let Some(api_url) = api_url {
                config.api_base_url = api_url;
            }
            let backend = HttpPaymentBackend::new(&config).into_diagnostic()?;
            let options = backend.payment_config().await.into_diagnostic()?;
            println!("{}", serde_json::to_string_pretty(&options).into_diagnostic()?);
            Ok(())
        }
    }
}

async fn simulate(path: PathBuf, config: &OrchestratorConfig) -> Result<()> {
    let file = File::open(path).into_diagnostic()?;
    let reader = ScenarioReader::new(file);

    let stdout = io::stdout();
    let mut writer = ResultWriter::new(stdout.lock());
    for scenario in reader.scenarios() {
        let scenario = match scenario {
            Ok(scenario) => scenario,
            Err(e) => {
                eprintln!("Error reading scenario: {}", e);
                continue;
            }
        };
        match run_scenario(&scenario, config).await {
            Ok(result) => writer.write(&scenario.scenario, &result).into_diagnostic()?,
            Err(e) => eprintln!("Error running scenario {}: {}", scenario.scenario, e),
        }
    }
    writer.flush().into_diagnostic()?;

    Ok(())
}
