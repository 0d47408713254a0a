//! Opaque binary fixtures supplied to test bodies.
//!
//! Fixtures are produced by an external module builder (encoded modules,
//! truncated modules, garbage bytes). The harness only stores, compares and
//! measures them; it never looks inside.

use crate::error::HarnessError;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// File extension picked up by [`Fixtures::load_dir`].
pub const FIXTURE_EXTENSION: &str = "wasm";

/// An immutable, cheaply clonable byte sequence.
#[derive(Clone, PartialEq, Eq)]
pub struct Fixture(Rc<[u8]>);

impl Fixture {
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Fixture {
    fn from(bytes: Vec<u8>) -> Self {
        Fixture(bytes.into())
    }
}

impl From<&[u8]> for Fixture {
    fn from(bytes: &[u8]) -> Self {
        Fixture(bytes.into())
    }
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixture({} bytes)", self.len())
    }
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[fixture of {} bytes]", self.len())
    }
}

/// Named fixtures available to a script run.
#[derive(Debug, Default, Clone)]
pub struct Fixtures {
    entries: BTreeMap<String, Fixture>,
}

impl Fixtures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, fixture: impl Into<Fixture>) {
        self.entries.insert(name.into(), fixture.into());
    }

    pub fn get(&self, name: &str) -> Option<&Fixture> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Load every `*.wasm` file in `dir`, keyed by file stem. Subdirectories
    /// and other extensions are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the directory or any fixture file cannot be read.
    pub fn load_dir(dir: &Path) -> Result<Self, HarnessError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| HarnessError::Io { path, source }
        };

        let mut fixtures = Fixtures::new();
        for entry in fs::read_dir(dir).map_err(io_err(dir))? {
            let path = entry.map_err(io_err(dir))?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(FIXTURE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bytes = fs::read(&path).map_err(io_err(&path))?;
            tracing::debug!(fixture = name, bytes = bytes.len(), "loaded fixture");
            fixtures.insert(name, bytes);
        }
        Ok(fixtures)
    }
}
