//! Output directory tree: named subdirectories, histograms and scalars.
//!
//! This is the in-memory analogue of a ROOT `TDirectory` hierarchy. Keys keep
//! insertion order, and writing an object under an existing name replaces it.
//! A whole tree round-trips through JSON.

use std::path::Path;

use fr_core::{Error, Parameters, Result};
use serde::{Deserialize, Serialize};

use crate::hist::Histogram;

/// One directory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Object {
    /// A subdirectory.
    Dir(OutputDir),
    /// A histogram.
    Hist(Histogram),
    /// The parameter manifest of a Spectra.
    Manifest(Parameters),
}

impl Object {
    /// Short class name, for listings.
    pub fn class_name(&self) -> &'static str {
        match self {
            Object::Dir(_) => "Directory",
            Object::Hist(h) => match h.dim() {
                1 => "Hist1D",
                2 => "Hist2D",
                _ => "Hist3D",
            },
            Object::Manifest(_) => "Manifest",
        }
    }
}

/// A named key and its object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Key name.
    pub name: String,
    /// Stored object.
    pub object: Object,
}

/// A directory of keyed objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputDir {
    entries: Vec<Entry>,
}

/// Key under which a Spectra directory stores its [`Parameters`].
pub const MANIFEST_KEY: &str = "__parameters__";

impl OutputDir {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a tree previously written by [`OutputDir::save`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display())))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write the tree as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Key names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Whether a key named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Store `object` under `name`, replacing any existing key of that name.
    pub fn put(&mut self, name: impl Into<String>, object: Object) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.entries[i].object = object,
            None => self.entries.push(Entry { name, object }),
        }
    }

    /// Write a histogram under its own name.
    pub fn write_hist(&mut self, hist: Histogram) {
        self.put(hist.name.clone(), Object::Hist(hist));
    }

    /// Store the parameter manifest.
    pub fn write_manifest(&mut self, params: &Parameters) {
        self.put(MANIFEST_KEY, Object::Manifest(params.clone()));
    }

    /// The parameter manifest, if present.
    pub fn manifest(&self) -> Option<&Parameters> {
        match self.position(MANIFEST_KEY).map(|i| &self.entries[i].object) {
            Some(Object::Manifest(p)) => Some(p),
            _ => None,
        }
    }

    /// Subdirectory `name`, created if absent.
    ///
    /// # Panics
    ///
    /// Panics if `name` exists but is not a directory.
    pub fn mkdir(&mut self, name: &str) -> &mut OutputDir {
        let i = match self.position(name) {
            Some(i) => i,
            None => {
                self.entries
                    .push(Entry { name: name.to_string(), object: Object::Dir(OutputDir::new()) });
                self.entries.len() - 1
            }
        };
        match &mut self.entries[i].object {
            Object::Dir(d) => d,
            other => panic!("key '{name}' is a {}, not a directory", other.class_name()),
        }
    }

    /// Subdirectory `name`.
    pub fn dir(&self, name: &str) -> Option<&OutputDir> {
        self.entries.iter().find(|e| e.name == name).and_then(|e| match &e.object {
            Object::Dir(d) => Some(d),
            _ => None,
        })
    }

    /// Mutable subdirectory `name`.
    pub fn dir_mut(&mut self, name: &str) -> Option<&mut OutputDir> {
        self.entries.iter_mut().find(|e| e.name == name).and_then(|e| match &mut e.object {
            Object::Dir(d) => Some(d),
            _ => None,
        })
    }

    /// Names of the subdirectories, in insertion order.
    pub fn subdirs(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| matches!(e.object, Object::Dir(_)))
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Histogram stored under `name`.
    pub fn hist(&self, name: &str) -> Option<&Histogram> {
        self.entries.iter().find(|e| e.name == name).and_then(|e| match &e.object {
            Object::Hist(h) => Some(h),
            _ => None,
        })
    }

    /// Histogram stored under `name`, or a [`Error::NotFound`].
    pub fn require_hist(&self, name: &str) -> Result<&Histogram> {
        self.hist(name).ok_or_else(|| Error::NotFound(format!("histogram '{name}'")))
    }

    /// All histograms in this directory (not recursive).
    pub fn hists(&self) -> impl Iterator<Item = &Histogram> {
        self.entries.iter().filter_map(|e| match &e.object {
            Object::Hist(h) => Some(h),
            _ => None,
        })
    }

    /// Look up a histogram by slash-separated path, e.g. `"enu/ND/enu_nue_mu_NoXSec_ND"`.
    pub fn get_hist(&self, path: &str) -> Option<&Histogram> {
        let mut parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let leaf = parts.pop()?;
        let mut dir = self;
        for p in parts {
            dir = dir.dir(p)?;
        }
        dir.hist(leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hist::{Axis, bins};

    fn h(name: &str) -> Histogram {
        Histogram::new_1d(name, "", Axis::new("x", bins(2, 0.0, 1.0)))
    }

    #[test]
    fn mkdir_reuses_existing() {
        let mut root = OutputDir::new();
        root.mkdir("a").write_hist(h("h1"));
        root.mkdir("a").write_hist(h("h2"));
        root.mkdir("b");
        assert_eq!(root.subdirs(), ["a", "b"]);
        assert_eq!(root.dir("a").unwrap().keys().collect::<Vec<_>>(), ["h1", "h2"]);
        assert!(root.get_hist("a/h2").is_some());
        assert!(root.get_hist("b/h2").is_none());
    }

    #[test]
    fn write_replaces_same_name() {
        let mut d = OutputDir::new();
        d.write_hist(h("h"));
        let mut again = h("h");
        again.fill(&[0.1], 2.0);
        d.write_hist(again);
        assert_eq!(d.entries().len(), 1);
        assert_eq!(d.hist("h").unwrap().integral(), 2.0);
    }

    #[test]
    #[should_panic(expected = "not a directory")]
    fn mkdir_over_hist_panics() {
        let mut d = OutputDir::new();
        d.write_hist(h("x"));
        d.mkdir("x");
    }

    #[test]
    fn save_and_open() {
        let mut p = std::env::temp_dir();
        p.push(format!("fr-spectra-output-{}.json", std::process::id()));

        let mut root = OutputDir::new();
        root.mkdir("enu").mkdir("ND").write_hist(h("enu_nue"));
        root.mkdir("enu").write_manifest(&Parameters::new(true));
        root.save(&p).unwrap();

        let back = OutputDir::open(&p).unwrap();
        assert!(back.get_hist("enu/ND/enu_nue").is_some());
        assert_eq!(back.dir("enu").unwrap().manifest().unwrap().n_flav(), 4);
        assert_eq!(back.dir("enu").unwrap().subdirs(), ["ND"]);

        let _ = std::fs::remove_file(&p);
    }
}
