//! Copying bundled defaults into the user's configuration directory.

use futures::future::BoxFuture;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Materializes bundled defaults on first run.
///
/// Both copies complete before the returned future resolves; callers re-read
/// the destination afterwards and treat a still-missing target as fatal.
pub trait DefaultsSeeder: Send + Sync + 'static {
    /// Copies one file, returning the bytes written.
    fn seed_file<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, io::Result<u64>>;

    /// Copies a directory tree, returning the number of files written.
    fn seed_tree<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, io::Result<u64>>;
}

/// Copies defaults on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsDefaultsSeeder;

impl DefaultsSeeder for FsDefaultsSeeder {
    fn seed_file<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, io::Result<u64>> {
        Box::pin(tokio::fs::copy(from, to))
    }

    fn seed_tree<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, io::Result<u64>> {
        let source = from.to_path_buf();
        let destination = to.to_path_buf();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || copy_tree(&source, &destination))
                .await
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?
        })
    }
}

/// Recursively copies `source` into `destination`, creating directories as needed.
fn copy_tree(source: &Path, destination: &Path) -> io::Result<u64> {
    let mut copied = 0;
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}
