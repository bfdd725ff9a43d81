//! Request and response shapes for the mutation server protocol methods.
//!
//! `configure` establishes version compatibility, `discover` enumerates
//! mutants without running tests, `mutationTest` runs them. The progress
//! notification `reportMutationTestProgress` reuses [`MutationTestResult`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::location::Location;
use crate::mutant::{DiscoveredMutant, MutantResult};

/// A file or directory to analyze, optionally restricted to a sub-range.
/// A `path` ending in `/` denotes a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRange {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Location>,
}

impl FileRange {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            range: None,
        }
    }

    #[must_use]
    pub fn with_range(path: impl Into<String>, range: Location) -> Self {
        Self {
            path: path.into(),
            range: Some(range),
        }
    }

    /// Whether this target denotes a directory rather than a single file.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.path.ends_with('/')
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureParams {
    /// Path to the mutation testing framework's own config file, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigureResult {
    /// The protocol major version the server supports, e.g. `"1"`.
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoverParams {
    /// Files to run discovery on; omitted means the whole project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileRange>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredFile {
    pub mutants: Vec<DiscoveredMutant>,
}

/// Discovery outcome, keyed by relative slash-delimited file path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoverResult {
    pub files: BTreeMap<String, DiscoveredFile>,
}

/// A previously discovered mutant to re-test, addressed by the file it
/// lives in plus its discovered fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutantTarget {
    pub file: String,
    #[serde(flatten)]
    pub mutant: DiscoveredMutant,
}

/// One entry of `mutationTest`'s target list, discriminated on the wire by
/// a `type` field of `"file"` or `"mutant"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MutationTestTarget {
    File(FileRange),
    Mutant(MutantTarget),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationTestParams {
    /// Targets to mutation test; omitted means everything in the project.
    /// File and mutant targets may be mixed freely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<MutationTestTarget>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutantResultFile {
    pub mutants: Vec<MutantResult>,
}

/// Final or partial mutation test outcome, keyed by relative file path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationTestResult {
    pub files: BTreeMap<String, MutantResultFile>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Connection coordinates a freshly spawned server reports on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerLocation {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}
