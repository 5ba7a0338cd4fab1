use futures::future::BoxFuture;
use std::io;
use std::path::Path;

/// Reads manifest text for discovery tasks.
///
/// The filesystem implementation is the default; tests substitute sources that
/// delay, fail or hang individual reads.
pub trait ManifestSource: Send + Sync + 'static {
    fn read_manifest<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<String>>;
}

/// Reads manifests as UTF-8 text with `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsManifestSource;

impl ManifestSource for FsManifestSource {
    fn read_manifest<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<String>> {
        Box::pin(tokio::fs::read_to_string(path))
    }
}
