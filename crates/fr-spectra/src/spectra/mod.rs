//! The Spectra family: histogram collections filled from flux entries, one
//! histogram per master index of a [`Parameters`] snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;
use std::ops::Range;

use fr_core::{AncestorMode, Detector, Indices, Parameters, Result};

use crate::event::FluxEvent;
use crate::hist::Histogram;
use crate::output::OutputDir;
use crate::var::{Var, Weight};
use crate::xsec::{CrossSection, XSecCache, XSecProvider};

mod corr_det;
mod nd;

pub use corr_det::{SpectraCorrDet, normalize_joint};
pub use nd::{AxisSpec, Spectra1D, Spectra2D, Spectra3D, SpectraND};

/// Converts simulation weights to flux units; applied once per ray.
pub const NORMALIZATION: f64 = 1.0 / (10000.0 * PI);

/// Branches every Spectra reads to pick its histogram and weight a ray.
pub const DEFAULT_BRANCHES: &[&str] =
    &["nuray", "nuray.E", "nuray.wgt", "decay", "decay.ntype", "decay.ptype", "decay.nimpwt"];

/// A collection of histograms filled from flux entries.
pub trait Spectra: Send {
    /// Title; prefix of every histogram name and name of the output directory.
    fn title(&self) -> &str;

    /// The parameter snapshot taken at construction.
    fn params(&self) -> &Parameters;

    /// Flux branches this Spectra reads.
    fn branches(&self) -> &BTreeSet<String>;

    /// Detectors this Spectra needs rays for.
    fn detectors(&self) -> Vec<Detector> {
        self.params().detectors().to_vec()
    }

    /// Number of histograms.
    fn n_hists(&self) -> usize;

    /// Histogram `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    fn hist(&mut self, i: usize) -> &Histogram;

    /// Add one flux entry. Entries whose flavor or parent is not tracked are
    /// skipped.
    fn fill(&mut self, event: &FluxEvent, offsets: &RayOffsets);

    /// Write every histogram below `dir`.
    fn write_hists(&mut self, dir: &mut OutputDir);
}

/// Position of each detector's rays inside [`FluxEvent::nuray`].
///
/// Detectors are laid out in name order, each taking `uses` consecutive rays.
/// When several detectors share a name, the first one decides its count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RayOffsets {
    blocks: BTreeMap<String, (usize, u32)>,
    total: usize,
}

impl RayOffsets {
    /// Lay out `detectors`. Repeated names keep their first occurrence.
    pub fn from_detectors<'a>(detectors: impl IntoIterator<Item = &'a Detector>) -> Self {
        let mut uses: BTreeMap<&str, u32> = BTreeMap::new();
        for d in detectors {
            uses.entry(d.name()).or_insert(d.uses().max(1));
        }
        let mut blocks = BTreeMap::new();
        let mut total = 0;
        for (name, n) in uses {
            blocks.insert(name.to_string(), (total, n));
            total += n as usize;
        }
        Self { blocks, total }
    }

    /// First ray of detector `name`.
    pub fn first(&self, name: &str) -> Option<usize> {
        self.blocks.get(name).map(|&(first, _)| first)
    }

    /// Rays per entry laid out for detector `name`.
    pub fn uses(&self, name: &str) -> Option<u32> {
        self.blocks.get(name).map(|&(_, n)| n)
    }

    /// Total number of rays per entry.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Detector names with their first ray, in layout order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.blocks.iter().map(|(k, &(first, _))| (k.as_str(), first))
    }

    /// Rays belonging to detector `name` in this layout.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not part of the layout.
    pub fn rays(&self, name: &str) -> Range<usize> {
        let Some(&(first, n)) = self.blocks.get(name) else {
            panic!("detector '{name}' has no rays in this layout");
        };
        first..first + n as usize
    }
}

/// State shared by every Spectra: the snapshot, x variable, weight and
/// cross-section evaluators.
#[derive(Debug, Clone)]
pub struct SpectraBase {
    params: Parameters,
    title: String,
    var_x: Var,
    weight: Weight,
    ext_weights: Option<Histogram>,
    branches: BTreeSet<String>,
    xsecs: XSecCache,
}

impl SpectraBase {
    /// Snapshot `params` and build its cross-section evaluators.
    pub fn new(
        params: &Parameters,
        title: impl Into<String>,
        var_x: Var,
        weight: Weight,
        ext_weights: Option<Histogram>,
        provider: &dyn XSecProvider,
    ) -> Result<Self> {
        let params = params.clone();
        let xsecs = XSecCache::build(&params, provider)?;

        let mut branches: BTreeSet<String> =
            DEFAULT_BRANCHES.iter().map(|b| b.to_string()).collect();
        if params.ancestor_mode() == AncestorMode::ByTargetExitAncestor {
            branches.insert("tgtexit".into());
            branches.insert("tgtexit.tptype".into());
        }
        branches.extend(var_x.branches().iter().cloned());
        branches.extend(weight.branches().iter().cloned());

        Ok(Self { params, title: title.into(), var_x, weight, ext_weights, branches, xsecs })
    }

    /// Also read the branches of `var`.
    pub fn add_branches(&mut self, var: &Var) {
        self.branches.extend(var.branches().iter().cloned());
    }

    /// The snapshot.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Branches read.
    pub fn branches(&self) -> &BTreeSet<String> {
        &self.branches
    }

    /// The x variable.
    pub fn var_x(&self) -> &Var {
        &self.var_x
    }

    /// Name of the histogram at `master`: `{title}_{flav}_{par}_{xsec}_{det}`.
    ///
    /// # Panics
    ///
    /// Panics if `master` is out of range.
    pub fn hist_name(&self, master: usize) -> String {
        match self.params.name_tag(master) {
            Some(tag) => format!("{}_{tag}", self.title),
            None => panic!("master index {master} is out of range"),
        }
    }

    /// PDG code the entry is attributed to, folded to its absolute value
    /// unless the snapshot is sign sensitive.
    pub fn parent_pdg(&self, event: &FluxEvent) -> i32 {
        let pdg = match self.params.ancestor_mode() {
            AncestorMode::ByDirectParent => event.decay.ptype,
            AncestorMode::ByTargetExitAncestor => event.tgtexit.tptype,
        };
        if self.params.is_sign_sensitive() { pdg } else { pdg.abs() }
    }

    /// Flavor and parent digits of `event`, or `None` if either is not tracked.
    /// The cross-section and detector digits are 0.
    pub fn select(&self, event: &FluxEvent) -> Option<Indices> {
        let mut cursor = self.params.cursor();
        if !cursor.set_current_nu_flav(event.decay.ntype) {
            return None;
        }
        if !cursor.set_current_parent(self.parent_pdg(event)) {
            return None;
        }
        Some(cursor.indices())
    }

    /// Evaluator for the flavor, cross section and detector of `idx`.
    pub fn xsec(&self, idx: Indices) -> &dyn CrossSection {
        self.xsecs.get((idx.flav, idx.xsec, idx.det))
    }

    /// Weight of ray `i_ray`: importance weight x ray weight x cross section
    /// x [`NORMALIZATION`], passed through the Spectra's [`Weight`].
    pub fn ray_weight(&self, event: &FluxEvent, i_ray: usize, xsec: &dyn CrossSection) -> f64 {
        let ray = event.ray(i_ray);
        let w = event.decay.nimpwt * ray.wgt * xsec.eval(ray.energy) * NORMALIZATION;
        self.weight.eval(w, event, i_ray, self.ext_weights.as_ref())
    }
}
