use std::process::ExitCode;

use anyhow::Context;
use tracing::error;
use tracing_subscriber::EnvFilter;

use applicant_optimizer::config::{api_key_from_env, load_config};
use applicant_optimizer::generation::DocumentGenerator;
use applicant_optimizer::input::InputRoot;
use applicant_optimizer::pipeline::{Outcome, Pipeline};
use applicant_optimizer::providers::openrouter::OpenRouterAdapter;

#[tokio::main]
async fn main() -> ExitCode {
    // .env may carry OPENROUTER_API_KEY and CONFIG_PATH; absent is fine.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(outcome) => {
            let verdict = if outcome.analysis.qualified() {
                "qualified"
            } else {
                "not qualified"
            };
            println!(
                "{verdict} (ATS score {}/100)",
                outcome.analysis.ats_score()
            );
            for path in &outcome.artifacts {
                println!("{}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "run failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<Outcome> {
    let config = load_config().context("failed to load configuration")?;
    let api_key = api_key_from_env()?;
    let inputs = InputRoot::from_settings(config.inputs())?;

    let adapter = OpenRouterAdapter::new(config.provider(), api_key)
        .context("failed to initialize provider")?;
    let generator = DocumentGenerator::new(config.generation(), inputs.path());

    let outcome = Pipeline::new(&config, &inputs, &adapter, &generator)
        .run()
        .await?;
    Ok(outcome)
}
