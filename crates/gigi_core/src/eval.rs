use crate::embed::EmbeddingProvider;
use crate::engine::MatchingEngine;
use crate::model::ReplySource;
use crate::normalize::normalize;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// The reply source a case expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Expectation {
    Intent(String),
    Knowledge(String),
    Fallback,
}

impl TryFrom<String> for Expectation {
    type Error = String;

    /// Accepts `intent:<name>`, `knowledge:<question>` or `fallback`.
    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "fallback" {
            return Ok(Self::Fallback);
        }
        match value.split_once(':') {
            Some(("intent", name)) if !name.trim().is_empty() => {
                Ok(Self::Intent(name.trim().to_string()))
            }
            Some(("knowledge", question)) if !normalize(question).is_empty() => {
                Ok(Self::Knowledge(normalize(question)))
            }
            _ => Err(format!(
                "expected 'intent:<name>', 'knowledge:<question>' or 'fallback', got {value:?}"
            )),
        }
    }
}

impl From<Expectation> for String {
    fn from(value: Expectation) -> Self {
        match value {
            Expectation::Intent(name) => format!("intent:{name}"),
            Expectation::Knowledge(key) => format!("knowledge:{key}"),
            Expectation::Fallback => "fallback".to_string(),
        }
    }
}

impl Expectation {
    pub fn matches(&self, actual: &ReplySource) -> bool {
        match (self, actual) {
            (Self::Intent(expected), ReplySource::Intent(name)) => expected == name,
            (Self::Knowledge(expected), ReplySource::Knowledge(key)) => expected == key,
            (Self::Fallback, ReplySource::Fallback) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    pub case_id: String,
    pub question: String,
    pub expected: Expectation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalOutcome {
    pub case_id: String,
    pub passed: bool,
    pub actual: ReplySource,
    pub reply: String,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f32,
    pub outcomes: Vec<EvalOutcome>,
}

impl EvalSummary {
    pub fn meets(&self, required_pass_rate: f32) -> bool {
        self.pass_rate >= required_pass_rate
    }
}

pub fn evaluate_cases<E, R>(
    engine: &MatchingEngine<E>,
    cases: &[EvalCase],
    rng: &mut R,
) -> EvalSummary
where
    E: EmbeddingProvider,
    R: Rng + ?Sized,
{
    let mut outcomes = Vec::with_capacity(cases.len());

    for case in cases {
        let start = Instant::now();
        let reply = engine.answer_with(&case.question, rng);
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        outcomes.push(EvalOutcome {
            case_id: case.case_id.clone(),
            passed: case.expected.matches(&reply.source),
            actual: reply.source,
            reply: reply.text,
            latency_ms,
        });
    }

    let total = outcomes.len();
    let passed = outcomes.iter().filter(|o| o.passed).count();
    let failed = total.saturating_sub(passed);
    let pass_rate = if total == 0 {
        0.0
    } else {
        passed as f32 / total as f32
    };

    EvalSummary {
        total,
        passed,
        failed,
        pass_rate,
        outcomes,
    }
}
