use std::{
    io,
    path::{Path, PathBuf},
};

use log::{debug, warn};

fn random_name(prefix: &str, len: usize) -> String {
    use rand::distributions::{Alphanumeric, DistString};

    let mut name = String::with_capacity(prefix.len() + len);
    name.push_str(prefix);
    Alphanumeric.append_string(&mut rand::thread_rng(), &mut name, len);
    name
}

/// A private directory under the system temporary directory that is removed, together with its
/// contents, when dropped.
#[derive(Debug)]
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(prefix: &str) -> io::Result<Self> {
        const LEN: usize = 16;

        let path = std::env::temp_dir().join(random_name(prefix, LEN));
        create_private_dir(&path)?;
        debug!("created temporary directory {path:?}");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_dir_all(&self.path) {
            warn!(
                "failed to remove temporary directory {path:?}: {error}",
                path = self.path
            );
        }
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new().mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> io::Result<()> {
    std::fs::create_dir(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_dir_is_removed_on_drop() {
        let dir = TempDir::new("publish-image-test-").unwrap();
        let path = dir.path().to_owned();
        std::fs::write(dir.join("file.json"), "{}").unwrap();
        assert!(path.is_dir());

        drop(dir);
        assert!(!path.exists());
    }

    #[test]
    fn random_name_has_prefix_and_length() {
        let name = random_name("abc-", 16);
        assert!(name.starts_with("abc-"));
        assert_eq!(name.len(), 20);
    }
}
