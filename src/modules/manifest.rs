use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The only manifest schema version this shell understands.
pub const SUPPORTED_MANIFEST_VERSION: &str = "1";

/// Keys every manifest must define (non-null) to be considered at all.
pub const REQUIRED_FIELDS: [&str; 8] = [
    "id",
    "name",
    "version",
    "author",
    "main",
    "description",
    "manifestVersion",
    "enabled",
];

/// Validated module descriptor.
///
/// Only [`crate::modules::validate`] constructs these, so every instance has all
/// required fields, an `id` equal to its directory name and a supported
/// `manifestVersion`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleManifest {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) author: String,
    pub(crate) main: String,
    pub(crate) description: String,
    pub(crate) manifest_version: String,
    pub(crate) enabled: bool,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

impl ModuleManifest {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Entry point reference, relative to the module directory.
    pub fn main(&self) -> &str {
        &self.main
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn manifest_version(&self) -> &str {
        &self.manifest_version
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Keys outside the required set, kept as written.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// Why a candidate did not produce a [`ModuleManifest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    ReadFailed,
    InvalidJson,
    MissingFields,
    IdMismatch,
    UnsupportedVersion,
    /// A present field has the wrong JSON type. Only reached once the
    /// presence, id and version checks have all passed.
    InvalidFieldType,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::ReadFailed => "read_failed",
            SkipReason::InvalidJson => "invalid_json",
            SkipReason::MissingFields => "missing_fields",
            SkipReason::IdMismatch => "id_mismatch",
            SkipReason::UnsupportedVersion => "unsupported_version",
            SkipReason::InvalidFieldType => "invalid_field_type",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validator rejection: the reason plus a human readable detail for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: SkipReason,
    pub detail: String,
}

impl Rejection {
    pub(crate) fn new(reason: SkipReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.detail)
    }
}

impl std::error::Error for Rejection {}

/// Terminal state of one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOutcome {
    Loaded(ModuleManifest),
    Skipped(Rejection),
}

impl From<Result<ModuleManifest, Rejection>> for DiscoveryOutcome {
    fn from(result: Result<ModuleManifest, Rejection>) -> Self {
        match result {
            Ok(manifest) => DiscoveryOutcome::Loaded(manifest),
            Err(rejection) => DiscoveryOutcome::Skipped(rejection),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedModule {
    pub candidate: String,
    pub reason: SkipReason,
    pub detail: String,
}

/// Aggregate result of one discovery pass, ordered by launch position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryReport {
    loaded: Vec<ModuleManifest>,
    skipped: Vec<SkippedModule>,
}

impl DiscoveryReport {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the report from `(candidate, outcome)` pairs already in launch order.
    pub(crate) fn from_outcomes(outcomes: Vec<(String, DiscoveryOutcome)>) -> Self {
        let mut report = Self::default();
        for (candidate, outcome) in outcomes {
            match outcome {
                DiscoveryOutcome::Loaded(manifest) => report.loaded.push(manifest),
                DiscoveryOutcome::Skipped(Rejection { reason, detail }) => {
                    report.skipped.push(SkippedModule {
                        candidate,
                        reason,
                        detail,
                    })
                }
            }
        }
        report
    }

    pub fn loaded(&self) -> &[ModuleManifest] {
        &self.loaded
    }

    pub fn skipped(&self) -> &[SkippedModule] {
        &self.skipped
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn total(&self) -> usize {
        self.loaded.len() + self.skipped.len()
    }

    /// Loaded manifests whose `enabled` flag is set.
    pub fn enabled(&self) -> impl Iterator<Item = &ModuleManifest> {
        self.loaded.iter().filter(|manifest| manifest.enabled)
    }
}
