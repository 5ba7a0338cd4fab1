//! Module discovery: candidate listing, concurrent manifest validation and
//! the ordered report.

pub mod barrier;
pub mod discovery;
pub mod manifest;
pub mod source;
pub mod validator;

pub use barrier::{CompletionBarrier, CompletionWaiter};
pub use discovery::{DiscoveryProgress, ModuleDiscovery};
pub use manifest::{
    DiscoveryOutcome, DiscoveryReport, ModuleManifest, Rejection, SkipReason, SkippedModule,
    REQUIRED_FIELDS, SUPPORTED_MANIFEST_VERSION,
};
pub use source::{FsManifestSource, ManifestSource};
pub use validator::validate;
