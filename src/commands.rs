//! CLI command definitions
//!
//! Defines the clap commands for the bddrun CLI.

use clap::Subcommand;
use std::path::PathBuf;

use crate::api::ScriptKind;

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a test plan into a Playwright script
    Compile {
        /// Test case whose plan is fetched from the backend
        #[arg(required_unless_present = "plan")]
        test_case_id: Option<String>,

        /// Read the plan from a JSON file instead of the backend
        #[arg(long, conflicts_with = "test_case_id")]
        plan: Option<PathBuf>,

        /// Write the script to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Fail when a step phrase has no rule
        #[arg(long)]
        strict: bool,

        /// Bearer credential for the backend
        #[arg(long, env = "BDDRUN_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Stream a test case's execution from the runner
    Run {
        /// Test case to execute
        test_case_id: String,

        /// Script flavor the runner should use (default from config)
        #[arg(long, value_enum)]
        script_kind: Option<ScriptKind>,

        /// Bearer credential for the runner
        #[arg(long, env = "BDDRUN_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Fetch, compile and upload a script, then print its output
    Execute {
        /// Test case to execute
        test_case_id: String,

        /// Script flavor the runner should use (default from config)
        #[arg(long, value_enum)]
        script_kind: Option<ScriptKind>,

        /// Bearer credential for the backend
        #[arg(long, env = "BDDRUN_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Print the resolved URL for an endpoint key
    Resolve {
        /// Logical endpoint name, e.g. TestPlan
        key: String,

        /// Template parameter as name=value (repeatable)
        #[arg(long = "param", short = 'p', value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))
}
