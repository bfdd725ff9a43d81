//! Mutants as reported by the server, and the derived identity key.
//!
//! The server-assigned `id` is not guaranteed stable across runs, so tree
//! placement and re-test targeting use a key derived from the fields that
//! define the mutation itself: mutator name, location, and replacement.

use serde::{Deserialize, Serialize};

use crate::location::Location;

/// Outcome of testing a single mutant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutantStatus {
    Killed,
    Survived,
    NoCoverage,
    CompileError,
    RuntimeError,
    Timeout,
    Ignored,
    Pending,
}

/// A mutant found by static analysis. Discovery never executes tests, so
/// there is no status here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredMutant {
    pub id: String,
    pub mutator_name: String,
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

/// A mutant with its test outcome attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutantResult {
    pub id: String,
    pub mutator_name: String,
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    pub status: MutantStatus,
    /// Free-format explanation for the status, e.g. the failing test's
    /// assertion message for a killed mutant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    /// Test ids that covered this mutant, if the framework measures coverage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covered_by: Option<Vec<String>>,
    /// Test ids that killed this mutant (usually one, when the run bails on
    /// the first failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killed_by: Option<Vec<String>>,
    /// Net test time for this mutant in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Tests actually run; can be fewer than `covered_by` because of bailing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_completed: Option<u32>,
    /// A static mutant is loaded once during initialization, which makes it
    /// slow or impossible to test depending on the framework.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#static: Option<bool>,
}

fn identity_key(mutator_name: &str, location: &Location, replacement: Option<&str>) -> String {
    format!(
        "{}({}:{}-{}:{}) ({})",
        mutator_name,
        location.start.line,
        location.start.column,
        location.end.line,
        location.end.column,
        replacement.unwrap_or_default(),
    )
}

impl DiscoveredMutant {
    /// Identity stable across discover/test runs, unlike the server `id`.
    #[must_use]
    pub fn identity(&self) -> String {
        identity_key(&self.mutator_name, &self.location, self.replacement.as_deref())
    }
}

impl MutantResult {
    #[must_use]
    pub fn identity(&self) -> String {
        identity_key(&self.mutator_name, &self.location, self.replacement.as_deref())
    }
}

/// What a tree leaf holds: the mutant as last reported, discovered or tested.
///
/// Re-upserting the same identity replaces the payload in place, so a leaf
/// upgrades from `Discovered` to `Tested` as results come in.
#[derive(Debug, Clone, PartialEq)]
pub enum MutantPayload {
    Discovered(DiscoveredMutant),
    Tested(MutantResult),
}

impl MutantPayload {
    #[must_use]
    pub fn identity(&self) -> String {
        match self {
            Self::Discovered(m) => m.identity(),
            Self::Tested(m) => m.identity(),
        }
    }

    #[must_use]
    pub fn mutator_name(&self) -> &str {
        match self {
            Self::Discovered(m) => &m.mutator_name,
            Self::Tested(m) => &m.mutator_name,
        }
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            Self::Discovered(m) => &m.location,
            Self::Tested(m) => &m.location,
        }
    }

    /// Test outcome, absent while the mutant is only discovered.
    #[must_use]
    pub fn status(&self) -> Option<MutantStatus> {
        match self {
            Self::Discovered(_) => None,
            Self::Tested(m) => Some(m.status),
        }
    }
}

impl From<DiscoveredMutant> for MutantPayload {
    fn from(mutant: DiscoveredMutant) -> Self {
        Self::Discovered(mutant)
    }
}

impl From<MutantResult> for MutantPayload {
    fn from(mutant: MutantResult) -> Self {
        Self::Tested(mutant)
    }
}
