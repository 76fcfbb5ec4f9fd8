//! Plan compiler
//!
//! Turns a [`TestPlan`] into a Playwright script: a fixed prologue, one block
//! per recognized step in plan order, and a fixed epilogue. Compilation never
//! fails. Steps whose phrase has no rule emit nothing, and each of them is
//! reported as [`StepResult::Skipped`] so the caller can decide whether that
//! is acceptable.

pub mod rules;
pub mod script;

use std::fmt;

use crate::api::types::TestPlan;
use crate::common::{Error, Result};

pub use rules::{find_rule, StepRule};
pub use script::{escape_data, EPILOGUE, PROLOGUE};

/// Why a step produced no code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No step rule matches the phrase
    UnrecognizedPhrase,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnrecognizedPhrase => write!(f, "no rule for this step phrase"),
        }
    }
}

/// What compiling a single step produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Emitted(String),
    Skipped(SkipReason),
}

/// A plan step together with its compile result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub phrase: String,
    pub result: StepResult,
}

/// Generated script text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScript(String);

impl GeneratedScript {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for GeneratedScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of compiling a plan
#[derive(Debug, Clone)]
pub struct Compilation {
    pub script: GeneratedScript,
    /// One outcome per plan step, in plan order
    pub steps: Vec<StepOutcome>,
}

impl Compilation {
    /// Phrases that produced no code
    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .filter(|s| matches!(s.result, StepResult::Skipped(_)))
            .map(|s| s.phrase.as_str())
    }

    pub fn emitted_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.result, StepResult::Emitted(_)))
            .count()
    }

    /// Return the script, or an error naming every skipped step
    pub fn into_strict(self) -> Result<GeneratedScript> {
        let skipped: Vec<String> = self.skipped().map(str::to_string).collect();
        if skipped.is_empty() {
            Ok(self.script)
        } else {
            Err(Error::UnrecognizedSteps(skipped))
        }
    }
}

/// Compile a single step phrase with its test data
pub fn compile_step(phrase: &str, data: &str) -> StepResult {
    match find_rule(phrase) {
        Some(rule) => StepResult::Emitted(rule.render(data)),
        None => StepResult::Skipped(SkipReason::UnrecognizedPhrase),
    }
}

/// Compile a plan into a script
pub fn compile(plan: &TestPlan) -> Compilation {
    let mut text = String::from(PROLOGUE);
    let mut steps = Vec::with_capacity(plan.steps.len());

    for (phrase, data) in &plan.steps {
        let result = compile_step(phrase, data.as_str());
        match &result {
            StepResult::Emitted(block) => text.push_str(block),
            StepResult::Skipped(reason) => {
                tracing::debug!(step = %phrase, %reason, "Skipping step");
            }
        }
        steps.push(StepOutcome {
            phrase: phrase.clone(),
            result,
        });
    }

    text.push_str(EPILOGUE);

    Compilation {
        script: GeneratedScript(text),
        steps,
    }
}
