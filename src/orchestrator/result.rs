//! Aggregated outcome of one fan-out.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::client::CallOutcome;

/// Settled outcomes of every requested call, keyed by call name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResult {
    outcomes: BTreeMap<String, CallOutcome>,
    #[serde(rename = "processing_time_ms", serialize_with = "as_millis")]
    processing_time: Duration,
    partial_failure: bool,
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

impl AggregatedResult {
    pub fn outcomes(&self) -> &BTreeMap<String, CallOutcome> {
        &self.outcomes
    }

    pub fn outcome(&self, name: &str) -> Option<&CallOutcome> {
        self.outcomes.get(name)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Wall-clock time from invocation start to the last call settling.
    pub fn processing_time(&self) -> Duration {
        self.processing_time
    }

    /// True when at least one call did not succeed.
    pub fn partial_failure(&self) -> bool {
        self.partial_failure
    }

    /// Names of calls that did not succeed.
    pub fn failed_calls(&self) -> impl Iterator<Item = (&str, &CallOutcome)> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(name, outcome)| (name.as_str(), outcome))
    }

    /// Payload per call, `None` (serialized as null) for calls that did not succeed.
    pub fn payloads(&self) -> BTreeMap<String, Option<Value>> {
        self.outcomes
            .iter()
            .map(|(name, outcome)| (name.clone(), outcome.payload().cloned()))
            .collect()
    }
}

/// Collects outcomes as calls settle. Each expected name owns exactly one slot.
#[derive(Debug)]
pub struct ResultBuilder {
    expected: BTreeSet<String>,
    outcomes: BTreeMap<String, CallOutcome>,
}

impl ResultBuilder {
    pub fn new<I, S>(expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            expected: expected.into_iter().map(Into::into).collect(),
            outcomes: BTreeMap::new(),
        }
    }

    /// Record a settled call. Returns false for unexpected or already-filled slots.
    pub fn record(&mut self, name: impl Into<String>, outcome: CallOutcome) -> bool {
        let name = name.into();
        if !self.expected.contains(&name) || self.outcomes.contains_key(&name) {
            return false;
        }
        self.outcomes.insert(name, outcome);
        true
    }

    /// Expected calls with no outcome yet.
    pub fn unsettled(&self) -> Vec<String> {
        self.expected
            .iter()
            .filter(|name| !self.outcomes.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Close the barrier: fill any empty slot with `fallback` and derive summary fields.
    pub fn finish<F>(mut self, processing_time: Duration, fallback: F) -> AggregatedResult
    where
        F: Fn(&str) -> CallOutcome,
    {
        for name in self.unsettled() {
            let outcome = fallback(&name);
            self.outcomes.insert(name, outcome);
        }
        let partial_failure = self.outcomes.values().any(|o| !o.is_success());

        AggregatedResult {
            outcomes: self.outcomes,
            processing_time,
            partial_failure,
        }
    }
}
