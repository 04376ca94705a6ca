//! Named-resource lookup. The generator and the document factory only ever
//! ask a [`Resources`] store for bytes by name, so where templates and logos
//! live (a directory, memory, the binary itself) is the caller's choice.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Resource name of the logo composited into every QR code.
pub const LOGO_RESOURCE: &str = "qr/qr-code-logo.png";

pub trait Resources {
    /// Return the raw bytes stored under `name`, or
    /// [`Error::ResourceNotFound`] when there is none.
    fn resolve(&self, name: &str) -> Result<Vec<u8>>;
}

impl<R: Resources + ?Sized> Resources for &R {
    fn resolve(&self, name: &str) -> Result<Vec<u8>> {
        (**self).resolve(name)
    }
}

/// Resources read from files below a root directory.
#[derive(Debug, Clone)]
pub struct DirResources {
    root: PathBuf,
}

impl DirResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Resources for DirResources {
    fn resolve(&self, name: &str) -> Result<Vec<u8>> {
        // Names are store-relative; never let one climb out of the root.
        if Path::new(name).is_absolute() || name.split('/').any(|part| part == "..") {
            return Err(Error::ResourceNotFound(name.to_string()));
        }
        let path = self.root.join(name);
        log::trace!("reading resource {}", path.display());
        std::fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::ResourceNotFound(name.to_string()),
            _ => Error::Io(e),
        })
    }
}

/// In-memory resources, mostly useful for tests and for callers that load
/// their assets some other way.
#[derive(Debug, Clone, Default)]
pub struct MemoryResources {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), bytes.into());
    }

    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }
}

impl Resources for MemoryResources {
    fn resolve(&self, name: &str) -> Result<Vec<u8>> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ResourceNotFound(name.to_string()))
    }
}

/// The logo and templates shipped with the crate, compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledResources;

const BUNDLED: &[(&str, &[u8])] = &[
    (
        LOGO_RESOURCE,
        include_bytes!("../assets/qr/qr-code-logo.png"),
    ),
    (
        "templates/site-onboarding.html",
        include_bytes!("../assets/templates/site-onboarding.html"),
    ),
];

impl Resources for BundledResources {
    fn resolve(&self, name: &str) -> Result<Vec<u8>> {
        BUNDLED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, bytes)| bytes.to_vec())
            .ok_or_else(|| Error::ResourceNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_resources_resolve_and_miss() {
        let res = MemoryResources::new().with("a.txt", b"hello".to_vec());
        assert_eq!(res.resolve("a.txt").unwrap(), b"hello");
        assert!(matches!(
            res.resolve("b.txt"),
            Err(Error::ResourceNotFound(name)) if name == "b.txt"
        ));
    }

    #[test]
    fn bundled_resources_carry_logo_and_template() {
        let logo = BundledResources.resolve(LOGO_RESOURCE).unwrap();
        assert_eq!(&logo[1..4], b"PNG");
        let tpl = BundledResources
            .resolve("templates/site-onboarding.html")
            .unwrap();
        assert!(String::from_utf8(tpl).unwrap().contains("qr_code.data_uri"));
    }

    #[test]
    fn dir_resources_map_missing_files_to_not_found() {
        let res = DirResources::new(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"));
        assert!(res.resolve(LOGO_RESOURCE).is_ok());
        assert!(matches!(
            res.resolve("qr/missing.png"),
            Err(Error::ResourceNotFound(_))
        ));
        assert!(matches!(
            res.resolve("../Cargo.toml"),
            Err(Error::ResourceNotFound(_))
        ));
    }
}
