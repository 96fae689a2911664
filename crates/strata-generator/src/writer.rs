//! Output writing.

use std::{
    fs,
    io::Write as _,
    path::{Component, Path, PathBuf},
};

use strata_core::{CoreError, Result};
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes rendered bytes to a destination relative to the output root.
pub trait Writer: Send + Sync {
    fn write(&self, destination: &Path, bytes: &[u8]) -> Result<()>;
}

/// Filesystem writer rooted at the output directory.
///
/// Each file goes through a temporary file in its destination directory that
/// is renamed into place, so a failed write never leaves a partial file.
#[derive(Debug, Clone)]
pub struct FsWriter {
    root: PathBuf,
}

impl FsWriter {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute target of `destination`, rejecting paths that leave the root.
    fn target(&self, destination: &Path) -> Result<PathBuf> {
        let mut target = self.root.clone();
        let mut depth = 0usize;
        for component in destination.components() {
            match component {
                Component::Normal(part) => {
                    target.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir if depth > 0 => {
                    target.pop();
                    depth -= 1;
                }
                _ => {
                    return Err(CoreError::write(
                        destination,
                        "destination escapes the output directory",
                    ));
                }
            }
        }
        if depth == 0 {
            return Err(CoreError::write(destination, "empty destination"));
        }
        Ok(target)
    }
}

impl Writer for FsWriter {
    fn write(&self, destination: &Path, bytes: &[u8]) -> Result<()> {
        let target = self.target(destination)?;
        let failed = |e: std::io::Error| CoreError::write(destination, e.to_string());

        let parent = target.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(failed)?;

        let mut file = NamedTempFile::new_in(parent).map_err(failed)?;
        file.write_all(bytes).map_err(failed)?;
        file.persist(&target).map_err(|e| failed(e.error))?;

        debug!(path = %target.display(), bytes = bytes.len(), "wrote file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_writes_nested_destinations() {
        let dir = TempDir::new().unwrap();
        let writer = FsWriter::new(dir.path());

        writer.write(Path::new("article/2020/one.html"), b"<p>one</p>").unwrap();
        writer.write(Path::new("article/2020/one.html"), b"<p>again</p>").unwrap();

        let written = fs::read_to_string(dir.path().join("article/2020/one.html")).unwrap();
        assert_eq!(written, "<p>again</p>");
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("article/2020")).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_rejects_escaping_destinations() {
        let dir = TempDir::new().unwrap();
        let writer = FsWriter::new(dir.path().join("out"));

        for destination in ["../secret.html", "a/../../b.html", "/etc/passwd", ""] {
            let err = writer.write(Path::new(destination), b"x").unwrap_err();
            assert!(matches!(err, CoreError::Write { .. }), "{destination}: {err}");
        }
        assert!(!dir.path().join("secret.html").exists());
        assert!(!dir.path().join("b.html").exists());

        writer.write(Path::new("a/./../b.html"), b"ok").unwrap();
        assert!(dir.path().join("out/b.html").exists());
    }
}
