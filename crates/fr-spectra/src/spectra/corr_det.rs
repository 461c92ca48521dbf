//! Correlated spectra between two detectors.
//!
//! The same event fills a joint histogram with a ray from each detector,
//! then each row is normalized by the single-detector spectrum.

use std::collections::BTreeSet;

use fr_core::{Indices, Parameters, Result};

use super::{AxisSpec, RayOffsets, Spectra, SpectraBase};
use crate::combine::{Block, Namer, rename_all};
use crate::event::FluxEvent;
use crate::hist::{Axis, Histogram};
use crate::output::OutputDir;
use crate::var::Weight;
use crate::xsec::XSecProvider;

/// Divide every bin `(i, j)` of `joint`, flow bins included, by bin `i` of
/// `norm`. Bins whose normalization is not positive are set to 0.
///
/// # Panics
///
/// Panics if `joint` is not 2D or `norm`'s x binning differs.
pub fn normalize_joint(joint: &mut Histogram, norm: &Histogram) {
    assert_eq!(joint.dim(), 2, "joint histogram '{}' must be 2D", joint.name);
    assert_eq!(
        joint.axis(0).edges,
        norm.axis(0).edges,
        "normalization of '{}' has a different x binning",
        joint.name
    );
    let nx = joint.axis(0).n_bins();
    let ny = joint.axis(1).n_bins();
    for i in 0..=nx + 1 {
        let n = norm.bin_content_at(&[i]);
        for j in 0..=ny + 1 {
            let v = if n > 0.0 { joint.bin_content_at(&[i, j]) / n } else { 0.0 };
            joint.set_bin_content_at(&[i, j], v);
        }
    }
}

/// Joint spectrum of one variable at two detectors.
///
/// For each (flavor, parent, cross section) it holds a 2D histogram of the
/// variable at `det_x` against the variable at `det_y`, weighted at `det_y`,
/// and a 1D histogram of the variable at `det_x`, weighted at `det_x`. Reading
/// or writing the histograms first sums them over flavors and parents, then
/// divides each joint histogram by its x-detector histogram, so every column
/// becomes the `det_y` distribution per unit of `det_x` flux.
#[derive(Debug, Clone)]
pub struct SpectraCorrDet {
    base: SpectraBase,
    det_x: usize,
    det_y: usize,
    hists: Vec<Histogram>,
    norms: Vec<Histogram>,
    flavors_combined: bool,
    parents_combined: bool,
    all_combined: bool,
    normalized: bool,
}

impl SpectraCorrDet {
    /// Build a correlated Spectra over a snapshot of `params`.
    ///
    /// # Panics
    ///
    /// Panics if `det_x` or `det_y` is not one of the detectors of `params`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        params: &Parameters,
        title: impl Into<String>,
        det_x: &str,
        det_y: &str,
        axis: AxisSpec,
        weight: Weight,
        ext_weights: Option<Histogram>,
        provider: &dyn XSecProvider,
    ) -> Result<Self> {
        let (Some(i_x), Some(i_y)) = (params.det_index(det_x), params.det_index(det_y)) else {
            panic!("correlated spectra needs detectors '{det_x}' and '{det_y}' in its parameters");
        };

        let base = SpectraBase::new(params, title, axis.var, weight, ext_weights, provider)?;

        let x = Axis::new(format!("{det_x} {}", axis.label), axis.edges.clone());
        let y = Axis::new(format!("{det_y} {}", axis.label), axis.edges);
        let det = format!("{det_x}_{det_y}");
        let names = Namer { title: base.title(), params: base.params(), det: &det }.raw_names();
        let mut hists = Vec::with_capacity(names.len());
        let mut norms = Vec::with_capacity(names.len());
        for name in names {
            norms.push(Histogram::new_1d(format!("{name}_norm"), "", x.clone()));
            hists.push(Histogram::new(name, "", vec![x.clone(), y.clone()]));
        }

        Ok(Self {
            base,
            det_x: i_x,
            det_y: i_y,
            hists,
            norms,
            flavors_combined: false,
            parents_combined: false,
            all_combined: false,
            normalized: false,
        })
    }

    /// Shared state.
    pub fn base(&self) -> &SpectraBase {
        &self.base
    }

    fn refuse_after_normalize(&self) -> bool {
        if self.normalized {
            log::warn!("'{}' is already normalized, not combining", self.base.title());
        }
        self.normalized
    }

    fn block(&self) -> Block {
        Block::of(self.base.params())
    }

    fn det_suffix(&self) -> String {
        let p = self.base.params();
        let name = |i: usize| p.detector(i).map(|d| d.name()).unwrap_or_default();
        format!("{}_{}", name(self.det_x), name(self.det_y))
    }

    fn namer<'a>(&'a self, det: &'a str) -> Namer<'a> {
        Namer { title: self.base.title(), params: self.base.params(), det }
    }

    /// Joint and normalization histograms, unnormalized.
    pub fn raw(&self) -> (&[Histogram], &[Histogram]) {
        (&self.hists, &self.norms)
    }

    /// Append the sums over flavors, named with `allnu`.
    pub fn combine_nu_flavs(&mut self) {
        if self.refuse_after_normalize() {
            return;
        }
        if self.flavors_combined {
            log::info!("flavors of '{}' are already combined", self.base.title());
            return;
        }
        let b = self.block();
        let raw = b.len();
        let mut hists = b.sum_flavors(&self.hists[..raw]);
        let norms = b.sum_flavors(&self.norms[..raw]);
        let det = self.det_suffix();
        rename_all(&mut hists, self.namer(&det).flavor_sums());
        self.hists.extend(hists);
        self.norms.extend(norms);
        self.flavors_combined = true;
    }

    /// Append the sums over parents, named with `allpar`.
    pub fn combine_parents(&mut self) {
        if self.refuse_after_normalize() {
            return;
        }
        if self.parents_combined {
            log::info!("parents of '{}' are already combined", self.base.title());
            return;
        }
        let b = self.block();
        let raw = b.len();
        let mut hists = b.sum_parents(&self.hists[..raw]);
        let norms = b.sum_parents(&self.norms[..raw]);
        let det = self.det_suffix();
        rename_all(&mut hists, self.namer(&det).parent_sums());
        self.hists.extend(hists);
        self.norms.extend(norms);
        self.parents_combined = true;
    }

    /// Append the flavor sums, the parent sums, and their combination named
    /// with `allnu_allpar`.
    pub fn combine_all(&mut self) {
        if self.refuse_after_normalize() {
            return;
        }
        if self.all_combined {
            log::info!("'{}' is already fully combined", self.base.title());
            return;
        }
        if !self.flavors_combined {
            self.combine_nu_flavs();
        }
        if !self.parents_combined {
            self.combine_parents();
        }

        let b = self.block();
        let raw = b.len();
        let hists = b.sum_parents(&self.hists[..raw]);
        let norms = b.sum_parents(&self.norms[..raw]);
        let mut hists = b.sum_parent_sums(&hists);
        let norms = b.sum_parent_sums(&norms);
        let det = self.det_suffix();
        rename_all(&mut hists, self.namer(&det).total_sums());
        self.hists.extend(hists);
        self.norms.extend(norms);
        self.all_combined = true;
    }

    /// Combine everything (once), then divide each joint histogram by its
    /// normalization. Runs at most once.
    pub fn normalize(&mut self) {
        if self.normalized {
            return;
        }
        if !self.all_combined {
            self.combine_all();
        }
        for (h, n) in self.hists.iter_mut().zip(&self.norms) {
            normalize_joint(h, n);
        }
        self.normalized = true;
    }
}

impl Spectra for SpectraCorrDet {
    fn title(&self) -> &str {
        self.base.title()
    }

    fn params(&self) -> &Parameters {
        self.base.params()
    }

    fn branches(&self) -> &BTreeSet<String> {
        self.base.branches()
    }

    fn n_hists(&self) -> usize {
        self.hists.len()
    }

    fn hist(&mut self, i: usize) -> &Histogram {
        self.normalize();
        assert!(i < self.hists.len(), "histogram index {i} is out of range");
        &self.hists[i]
    }

    fn fill(&mut self, event: &FluxEvent, offsets: &RayOffsets) {
        let Some(sel) = self.base.select(event) else {
            return;
        };
        let params = self.base.params();
        let (Some(det_x), Some(det_y)) = (params.detector(self.det_x), params.detector(self.det_y))
        else {
            return;
        };
        let x_rays = offsets.rays(det_x.name());
        let y_rays = offsets.rays(det_y.name());
        let block = Block::of(params);

        for i_xsec in 0..params.n_xsec() {
            let idx = Indices::new(sel.flav, sel.par, i_xsec, self.det_y);
            let xsec = self.base.xsec(idx);
            let i_hist = block.local(sel.flav, sel.par, i_xsec);
            for rx in x_rays.clone() {
                let wx = self.base.ray_weight(event, rx, xsec);
                let vx = self.base.var_x().eval(event, rx);
                for ry in y_rays.clone() {
                    let wy = self.base.ray_weight(event, ry, xsec);
                    let vy = self.base.var_x().eval(event, ry);
                    self.hists[i_hist].fill(&[vx, vy], wy);
                    self.norms[i_hist].fill(&[vx], wx);
                }
            }
        }
    }

    fn write_hists(&mut self, dir: &mut OutputDir) {
        self.normalize();
        for h in &self.hists {
            dir.write_hist(h.clone());
        }
    }
}
