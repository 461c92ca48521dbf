//! Sum the histograms of a written result over flavors and parents.
//!
//! The [`Combiner`] rebuilds each Spectra's parameters from the result
//! itself: from the stored manifest when there is one, otherwise from the
//! detector directory names and the `title_flav_par_xsec_det` histogram names.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use fr_core::{Detector, Error, Parameters, Particle, Result, all_nu_flavors};

use crate::combine::{Block, Namer, is_combined, rename_all, sum_markers};
use crate::hist::Histogram;
use crate::output::OutputDir;

/// Combines flavors and parents of every uncorrelated Spectra in a result.
#[derive(Debug, Clone)]
pub struct Combiner {
    path: Option<PathBuf>,
    root: OutputDir,
    spectra: BTreeMap<String, Parameters>,
}

impl Combiner {
    /// Open a result file written by the flux reader.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let root = OutputDir::open(path)?;
        let mut c = Self::from_dir(root);
        c.path = Some(path.to_path_buf());
        Ok(c)
    }

    /// Work on an in-memory result.
    pub fn from_dir(root: OutputDir) -> Self {
        let mut spectra = BTreeMap::new();
        for title in root.subdirs() {
            let Some(dir) = root.dir(title) else { continue };
            match reconstruct(title, dir) {
                Some(p) => {
                    spectra.insert(title.to_string(), p);
                }
                None => log::debug!("'{title}' has no detector directories; not combined"),
            }
        }

        log::info!(
            "found {} spectra: {}",
            spectra.len(),
            spectra.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        for (title, p) in &spectra {
            p.log_summary(&format!("spectra '{title}'"));
        }

        Self { path: None, root, spectra }
    }

    /// Titles of the Spectra that will be combined.
    pub fn spectra(&self) -> impl Iterator<Item = &str> {
        self.spectra.keys().map(String::as_str)
    }

    /// Reconstructed parameters of Spectra `title`.
    pub fn params(&self, title: &str) -> Option<&Parameters> {
        self.spectra.get(title)
    }

    /// The result tree.
    pub fn root(&self) -> &OutputDir {
        &self.root
    }

    /// Consume, returning the result tree.
    pub fn into_root(self) -> OutputDir {
        self.root
    }

    /// Add, per (detector, cross section, parent), the sum over flavors,
    /// named with `allnu`.
    pub fn combine_nu_flavs(&mut self) -> Result<()> {
        if self.already_combined(|(nu, _)| nu) {
            log::info!("neutrino flavors have already been combined");
            return Ok(());
        }
        let n = self.for_each_detector(|dir, block, namer| {
            let raw = collect(dir, namer.raw_names())?;
            let mut sums = block.sum_flavors(&raw);
            rename_all(&mut sums, namer.flavor_sums());
            Ok(sums)
        })?;
        log::info!("wrote {n} flavor-combined histograms");
        Ok(())
    }

    /// Add, per (detector, cross section, flavor), the sum over parents,
    /// named with `allpar`.
    pub fn combine_parents(&mut self) -> Result<()> {
        if self.already_combined(|(_, par)| par) {
            log::info!("parents have already been combined");
            return Ok(());
        }
        let n = self.for_each_detector(|dir, block, namer| {
            let raw = collect(dir, namer.raw_names())?;
            let mut sums = block.sum_parents(&raw);
            rename_all(&mut sums, namer.parent_sums());
            Ok(sums)
        })?;
        log::info!("wrote {n} parent-combined histograms");
        Ok(())
    }

    /// Combine flavors and parents, then add, per (detector, cross section),
    /// the sum over flavors of the parent-combined histograms, named with
    /// `allnu_allpar`.
    pub fn combine_all(&mut self) -> Result<()> {
        if self.already_combined(|(nu, par)| nu && par) {
            log::info!("all possible histograms have already been combined");
            return Ok(());
        }
        self.combine_nu_flavs()?;
        self.combine_parents()?;
        let n = self.for_each_detector(|dir, block, namer| {
            let by_parent = collect(dir, namer.parent_sums())?;
            let mut sums = block.sum_parent_sums(&by_parent);
            rename_all(&mut sums, namer.total_sums());
            Ok(sums)
        })?;
        log::info!("wrote {n} fully combined histograms");
        Ok(())
    }

    /// Write the result back to the file it was opened from.
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(p) => self.root.save(p),
            None => Err(Error::Config("combiner was not opened from a file".into())),
        }
    }

    /// Write the result to `path`.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        self.root.save(path)
    }

    /// Whether the first detector directory of the first Spectra holds a
    /// histogram whose sum markers satisfy `done`.
    fn already_combined(&self, done: impl Fn((bool, bool)) -> bool) -> bool {
        let Some((title, params)) = self.spectra.iter().next() else {
            return false;
        };
        let Some(det) = params.detector(0) else {
            return false;
        };
        self.root
            .dir(title)
            .and_then(|d| d.dir(det.name()))
            .is_some_and(|d| d.keys().any(|k| done(sum_markers(k, title))))
    }

    fn for_each_detector<F>(&mut self, mut make: F) -> Result<usize>
    where
        F: FnMut(&OutputDir, Block, Namer<'_>) -> Result<Vec<Histogram>>,
    {
        let mut written = 0;
        for (title, params) in &self.spectra {
            let block = Block::of(params);
            for det in params.detectors() {
                let dir = self
                    .root
                    .dir_mut(title)
                    .and_then(|d| d.dir_mut(det.name()))
                    .ok_or_else(|| Error::NotFound(format!("directory '{title}/{}'", det.name())))?;
                let namer = Namer { title, params, det: det.name() };
                let new = make(dir, block, namer)?;
                written += new.len();
                for h in new {
                    dir.write_hist(h);
                }
            }
        }
        Ok(written)
    }
}

fn collect(dir: &OutputDir, names: Vec<String>) -> Result<Vec<Histogram>> {
    names.iter().map(|n| dir.require_hist(n).cloned()).collect()
}

/// Parameters of the Spectra stored in `dir`, or `None` for a correlated
/// Spectra (no detector directories).
fn reconstruct(title: &str, dir: &OutputDir) -> Option<Parameters> {
    let dets: BTreeSet<&str> = dir.subdirs().into_iter().collect();
    let first = *dets.first()?;

    if let Some(p) = dir.manifest() {
        return Some(p.clone());
    }

    let mut flavs = BTreeSet::new();
    let mut parents = BTreeSet::new();
    let mut xsecs = BTreeSet::new();
    for name in dir.dir(first)?.keys() {
        if is_combined(name, title) {
            continue;
        }
        match split_name(name, title, first) {
            Some((f, p, x)) => {
                flavs.insert(f.to_string());
                parents.insert(p.to_string());
                xsecs.insert(x.to_string());
            }
            None => log::debug!("'{name}' does not follow the histogram naming scheme"),
        }
    }

    let nu_flavs = all_nu_flavors(true).into_iter().filter(|f| flavs.contains(f.name())).collect();
    // Only names matter for combining, so parents get stand-in PDG codes.
    let parents = parents.into_iter().enumerate().map(|(i, n)| Particle::new(n, i as i32)).collect();
    let detectors = dets.into_iter().map(Detector::placeholder).collect();
    Some(Parameters::from_parts(nu_flavs, parents, xsecs.into_iter().collect(), detectors, true))
}

/// Split `{title}_{flav}_{par}_{xsec}_{det}` into `(flav, par, xsec)`.
/// The cross-section label may itself contain `_`.
fn split_name<'a>(name: &'a str, title: &str, det: &str) -> Option<(&'a str, &'a str, &'a str)> {
    let inner = name.strip_prefix(title)?.strip_prefix('_')?;
    let inner = inner.strip_suffix(det)?.strip_suffix('_')?;
    let (flav, rest) = inner.split_once('_')?;
    let (par, xsec) = rest.split_once('_')?;
    Some((flav, par, xsec))
}
