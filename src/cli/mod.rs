//! CLI command handling
//!
//! Dispatches CLI commands and formats their output. Generated scripts and
//! run logs go to stdout; warnings go to stderr.

use std::path::Path;
use std::process::ExitCode;

use colored::Colorize;

use crate::api::{ApiClient, EndpointResolver, EndpointTable, LogEntry, LogStatus, TestPlan};
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::compiler::{self, Compilation};
use crate::execution::{RunRequest, Runner, SessionEvent, SessionState};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<ExitCode> {
    match command {
        Commands::Compile {
            test_case_id,
            plan,
            output,
            strict,
            token,
        } => {
            let plan = match (plan, test_case_id) {
                (Some(path), _) => read_plan(&path)?,
                (None, Some(id)) => {
                    let mut client = ApiClient::new(&config.api, resolver(config)?)?;
                    client.set_bearer(token.as_deref());
                    client.fetch_plan(&id).await?
                }
                (None, None) => {
                    return Err(Error::Config(
                        "Either a test case id or --plan is required".to_string(),
                    ))
                }
            };

            let compilation = compiler::compile(&plan);
            warn_skipped(&compilation);
            let script = if strict {
                compilation.into_strict()?
            } else {
                compilation.script
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, script.as_str())?;
                    eprintln!("{} Script written to {}", "✓".green(), path.display());
                }
                None => print!("{script}"),
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Run {
            test_case_id,
            script_kind,
            token,
        } => {
            let runner = Runner::from_config(config, resolver(config)?);
            let request = RunRequest {
                test_case_id,
                script_kind: script_kind.unwrap_or(config.execution.default_script_kind),
                token,
            };
            let mut handle = runner.start(request)?;

            loop {
                tokio::select! {
                    event = handle.next_event() => match event {
                        Some(SessionEvent::Log(entry)) => print_entry(&entry),
                        Some(SessionEvent::State(state)) => {
                            tracing::debug!(%state, "Session state");
                        }
                        Some(SessionEvent::Released) => {}
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        eprintln!("{} Aborting run...", "!".yellow());
                        handle.abort();
                    }
                }
            }

            let report = handle.wait().await?;
            let state = match report.state {
                SessionState::Closed => report.state.to_string().normal(),
                _ => report.state.to_string().red(),
            };
            if report.outcome.is_success() {
                println!(
                    "\n{} Run {} (session {})",
                    "✓".green().bold(),
                    report.outcome.to_string().green().bold(),
                    state
                );
                Ok(ExitCode::SUCCESS)
            } else {
                println!(
                    "\n{} Run {} (session {})",
                    "✗".red().bold(),
                    report.outcome.to_string().red().bold(),
                    state
                );
                Ok(ExitCode::FAILURE)
            }
        }

        Commands::Execute {
            test_case_id,
            script_kind,
            token,
        } => {
            let mut client = ApiClient::new(&config.api, resolver(config)?)?;
            client.set_bearer(Some(&token));

            let plan = client.fetch_plan(&test_case_id).await?;
            let compilation = compiler::compile(&plan);
            warn_skipped(&compilation);

            let kind = script_kind.unwrap_or(config.execution.default_script_kind);
            let entries = client
                .execute_script(&test_case_id, compilation.script.as_str(), kind)
                .await?;

            for entry in &entries {
                print_entry(entry);
            }

            if entries.iter().any(|e| e.status.is_error()) {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }

        Commands::Resolve { key, params } => {
            let resolver = resolver(config)?;
            let params: Vec<(&str, &str)> = params
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()))
                .collect();

            if resolver.table().template(&key).is_none() {
                eprintln!(
                    "{} No endpoint named '{}'; using it as a literal path",
                    "!".yellow(),
                    key
                );
            }
            println!("{}", resolver.resolve(&key, &params));
            println!("{}", resolver.http_url(&key, &params)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Build the resolver from the configured endpoint table and base URL
fn resolver(config: &Config) -> Result<EndpointResolver> {
    let table = EndpointTable::new(config.api.endpoints.iter().cloned());
    EndpointResolver::new(table, &config.api.base_url)
}

fn read_plan(path: &Path) -> Result<TestPlan> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn warn_skipped(compilation: &Compilation) {
    for phrase in compilation.skipped() {
        eprintln!("{} No rule for step: {}", "!".yellow(), phrase);
    }
}

fn print_entry(entry: &LogEntry) {
    let status = match &entry.status {
        LogStatus::Success => entry.status.as_str().green(),
        LogStatus::Error => entry.status.as_str().red(),
        LogStatus::Debug => entry.status.as_str().dimmed(),
        LogStatus::Info => entry.status.as_str().normal(),
        LogStatus::Other(_) => entry.status.as_str().cyan(),
    };
    println!(
        "{} [{:>9}] {}",
        entry.timestamp.dimmed(),
        status,
        entry.message
    );
}
