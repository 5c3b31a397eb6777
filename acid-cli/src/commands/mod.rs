pub mod enroll;
pub mod login;

use std::sync::Arc;

use acid_core::{
    AwaitingInput, FileTrustStore, HttpBackend, Orchestrator, OrchestratorConfig, State,
    StaticTelemetry,
};
use anyhow::{Context, Result};
use serde_json::json;

use crate::exit_codes;
use crate::terminal::TerminalUi;
use crate::utils::{parse_method_choice, prompt};

/// Build the orchestrator and drive one session interactively.
pub async fn run_session(subject: String, base_url: Option<String>, update_mode: bool) -> Result<()> {
    let mut config = OrchestratorConfig::from_env();
    if let Some(base_url) = base_url {
        config.base_url = base_url;
    }

    let backend = Arc::new(HttpBackend::new(&config).context("Failed to create HTTP client")?);
    let fingerprint = json!({
        "userAgent": format!("acid-cli/{}", env!("CARGO_PKG_VERSION")),
        "platform": std::env::consts::OS,
        "publicKeyCredentialAvailable": false,
        "mediaDevicesAvailable": false,
    });

    let mut orchestrator = Orchestrator::builder(config, backend, subject)
        .update_mode(update_mode)
        .telemetry(Arc::new(StaticTelemetry::new(fingerprint)))
        .trust_store(Arc::new(FileTrustStore::from_env()))
        .ui(Arc::new(TerminalUi))
        .build();

    orchestrator.start().await?;

    loop {
        match orchestrator.state() {
            State::Done => break,
            State::MethodSelection => {
                let answer = prompt("Select a method (1-4, q to quit)")?;
                if answer.eq_ignore_ascii_case("q") {
                    orchestrator.teardown();
                    println!("Aborted.");
                    std::process::exit(exit_codes::VERIFICATION_FAILED);
                }
                match parse_method_choice(&answer) {
                    Some(method) => {
                        orchestrator.select_method(method).await?;
                    }
                    None => println!("Unrecognized choice: {answer}"),
                }
            }
            State::MethodActive(_) => match orchestrator.awaiting().cloned() {
                Some(AwaitingInput::Destination) => {
                    let number = prompt("Trusted phone number (e.g. 08011122233)")?;
                    orchestrator.submit_trusted_number(&number).await?;
                }
                Some(AwaitingInput::Code { .. }) => {
                    let code = prompt("Code (6 digits, c to cancel)")?;
                    if code.eq_ignore_ascii_case("c") {
                        orchestrator.cancel_method()?;
                    } else {
                        orchestrator.submit_code(&code).await?;
                    }
                }
                None => {
                    // a controller that awaits nothing has nothing to drive
                    orchestrator.cancel_method()?;
                }
            },
            state => anyhow::bail!("Unexpected orchestrator state: {state:?}"),
        }
    }

    Ok(())
}
