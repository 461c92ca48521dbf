//! Spectra with one to three binned axes, one histogram per detector block.

use std::collections::BTreeSet;

use fr_core::{Parameters, Result};

use super::{RayOffsets, Spectra, SpectraBase};
use crate::event::FluxEvent;
use crate::hist::{Axis, Histogram};
use crate::output::OutputDir;
use crate::var::{Var, Weight};
use crate::xsec::XSecProvider;

/// One histogram axis and the variable binned along it.
#[derive(Debug, Clone)]
pub struct AxisSpec {
    /// Axis label.
    pub label: String,
    /// Bin edges.
    pub edges: Vec<f64>,
    /// Variable filled along this axis.
    pub var: Var,
}

impl AxisSpec {
    /// Create an axis.
    pub fn new(label: impl Into<String>, edges: Vec<f64>, var: Var) -> Self {
        Self { label: label.into(), edges, var }
    }

    fn axis(&self) -> Axis {
        Axis::new(self.label.clone(), self.edges.clone())
    }
}

/// A Spectra of `N`-dimensional histograms, one per master index.
///
/// Histograms are written in detector subdirectories of the output directory.
#[derive(Debug, Clone)]
pub struct SpectraND<const N: usize> {
    base: SpectraBase,
    vars: [Var; N],
    hists: Vec<Histogram>,
}

/// Histograms of one variable.
pub type Spectra1D = SpectraND<1>;
/// Histograms of two variables.
pub type Spectra2D = SpectraND<2>;
/// Histograms of three variables.
pub type Spectra3D = SpectraND<3>;

impl<const N: usize> SpectraND<N> {
    /// Build a Spectra over a snapshot of `params`.
    ///
    /// Fails if `provider` cannot supply a cross section the parameters need.
    pub fn new(
        params: &Parameters,
        title: impl Into<String>,
        axes: [AxisSpec; N],
        weight: Weight,
        ext_weights: Option<Histogram>,
        provider: &dyn XSecProvider,
    ) -> Result<Self> {
        const { assert!(N >= 1 && N <= 3, "spectra have one to three axes") };

        let mut base =
            SpectraBase::new(params, title, axes[0].var.clone(), weight, ext_weights, provider)?;
        for a in &axes[1..] {
            base.add_branches(&a.var);
        }

        let hist_axes: Vec<Axis> = axes.iter().map(AxisSpec::axis).collect();
        let hists = (0..base.params().max_master())
            .map(|m| Histogram::new(base.hist_name(m), "", hist_axes.clone()))
            .collect();
        let vars = axes.map(|a| a.var);

        log::debug!(
            "created {} {}D histograms for '{}'",
            base.params().max_master(),
            N,
            base.title()
        );
        Ok(Self { base, vars, hists })
    }

    /// Shared state.
    pub fn base(&self) -> &SpectraBase {
        &self.base
    }

    /// All histograms, in master order.
    pub fn hists(&self) -> &[Histogram] {
        &self.hists
    }
}

impl<const N: usize> Spectra for SpectraND<N> {
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
        assert!(i < self.hists.len(), "histogram index {i} is out of range");
        &self.hists[i]
    }

    fn fill(&mut self, event: &FluxEvent, offsets: &RayOffsets) {
        let Some(mut idx) = self.base.select(event) else {
            return;
        };
        let params = self.base.params();
        let radix = params.radix();

        for (i_det, det) in params.detectors().iter().enumerate() {
            idx.det = i_det;
            let rays = offsets.rays(det.name());
            for i_xsec in 0..params.n_xsec() {
                idx.xsec = i_xsec;
                let master = radix.encode(idx);
                let xsec = self.base.xsec(idx);
                for i_ray in rays.clone() {
                    let w = self.base.ray_weight(event, i_ray, xsec);
                    let values: [f64; N] = std::array::from_fn(|k| self.vars[k].eval(event, i_ray));
                    self.hists[master].fill(&values, w);
                }
            }
        }
    }

    fn write_hists(&mut self, dir: &mut OutputDir) {
        let params = self.base.params();
        let stride = params.radix().det_stride();
        // Masters are detector-major, so each detector owns one contiguous block.
        for (i_det, det) in params.detectors().iter().enumerate() {
            let sub = dir.mkdir(det.name());
            for h in &self.hists[i_det * stride..(i_det + 1) * stride] {
                sub.write_hist(h.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NuRay;
    use crate::hist::bins;
    use crate::spectra::NORMALIZATION;
    use crate::var::{vars, weights};
    use crate::xsec::{ConstantXSec, CrossSection, NoCurves};
    use approx::assert_relative_eq;
    use fr_core::{Detector, Particle};
    use nalgebra::Vector3;
    use std::sync::Arc;

    fn params(dets: &[(&str, u32)]) -> Parameters {
        Parameters::from_parts(
            vec![Particle::new("nue", 12), Particle::new("numu", 14)],
            vec![Particle::new("muon", 13)],
            vec!["NoXSec".into()],
            dets.iter()
                .map(|&(n, u)| Detector::new(n, "C", Vector3::zeros(), Vector3::zeros(), u))
                .collect(),
            false,
        )
    }

    fn event(ntype: i32, rays: &[(f64, f64)]) -> FluxEvent {
        let mut ev = FluxEvent::default();
        ev.decay.ntype = ntype;
        ev.decay.ptype = 13;
        ev.decay.nimpwt = 1.0;
        ev.decay.pdpz = 7.0;
        ev.nuray = rays.iter().map(|&(energy, wgt)| NuRay { energy, wgt }).collect();
        ev
    }

    fn energy_axis() -> AxisSpec {
        AxisSpec::new("E (GeV)", bins(10, 0.0, 10.0), vars::energy())
    }

    #[test]
    fn fills_each_detector_with_its_rays() {
        let p = params(&[("ND", 2), ("FD", 1)]);
        let mut s =
            Spectra1D::new(&p, "s", [energy_axis()], weights::no_weight(), None, &NoCurves).unwrap();
        let offsets = RayOffsets::from_detectors(p.detectors());

        // FD takes ray 0, ND rays 1 and 2
        s.fill(&event(14, &[(5.5, 1.0), (1.5, 1.0), (2.5, 1.0)]), &offsets);

        let nd = s.hist(1);
        assert_eq!(nd.name, "s_numu_muon_NoXSec_ND");
        assert_eq!(nd.bin_content_at(&[2]), 1.0);
        assert_eq!(nd.bin_content_at(&[3]), 1.0);
        let fd = s.hist(3);
        assert_eq!(fd.name, "s_numu_muon_NoXSec_FD");
        assert_eq!(fd.bin_content_at(&[6]), 1.0);
        assert_eq!(fd.entries, 1.0);
        assert_eq!(s.hist(0).entries, 0.0);
    }

    struct Doubling;

    impl XSecProvider for Doubling {
        fn evaluator(&self, _: i32, _: &str, _: &str) -> Result<Arc<dyn CrossSection>> {
            Ok(Arc::new(ConstantXSec(2.0)))
        }
    }

    #[test]
    fn weight_includes_cross_section_and_importance() {
        let mut p = params(&[("ND", 1)]);
        p.add_xsec("tot_cc");
        let mut s =
            Spectra1D::new(&p, "s", [energy_axis()], Weight::default(), None, &Doubling).unwrap();
        let mut ev = event(12, &[(3.0, 0.5)]);
        ev.decay.nimpwt = 4.0;
        s.fill(&ev, &RayOffsets::from_detectors(p.detectors()));

        assert_relative_eq!(s.hist(0).integral(), 2.0 * NORMALIZATION);
        // tot_cc block starts after the NoXSec block (2 flavors x 1 parent)
        assert_relative_eq!(s.hist(2).integral(), 4.0 * NORMALIZATION);
    }

    #[test]
    fn two_d_fill() {
        let p = params(&[("ND", 1)]);
        let axes = [
            energy_axis(),
            AxisSpec::new("pz", bins(2, 0.0, 10.0), vars::parent_pz()),
        ];
        let mut s = Spectra2D::new(&p, "s2", axes, weights::no_weight(), None, &NoCurves).unwrap();
        assert!(s.branches().contains("decay.pdpz"));
        s.fill(&event(12, &[(0.5, 1.0)]), &RayOffsets::from_detectors(p.detectors()));
        assert_eq!(s.hist(0).bin_content_at(&[1, 2]), 1.0);
    }

    #[test]
    fn writes_detector_subdirectories() {
        let p = params(&[("ND", 1), ("FD", 1)]);
        let mut s =
            Spectra1D::new(&p, "s", [energy_axis()], Weight::default(), None, &NoCurves).unwrap();
        let mut dir = OutputDir::new();
        s.write_hists(&mut dir);
        s.write_hists(&mut dir);

        assert_eq!(dir.subdirs(), ["ND", "FD"]);
        let nd: Vec<&str> = dir.dir("ND").unwrap().keys().collect();
        assert_eq!(nd, ["s_nue_muon_NoXSec_ND", "s_numu_muon_NoXSec_ND"]);
        assert_eq!(dir.dir("FD").unwrap().entries().len(), 2);
    }

    #[test]
    fn later_parameter_edits_do_not_reach_spectra() {
        let mut p = params(&[("ND", 1)]);
        p.add_xsec("tot_cc");
        let mut s =
            Spectra1D::new(&p, "s", [energy_axis()], Weight::default(), None, &Doubling).unwrap();
        let n = s.n_hists();

        p.set_ancestor_tgt();
        p.remove_xsec("tot_cc");
        assert_eq!(s.n_hists(), n);
        assert!(!s.branches().contains("tgtexit.tptype"));

        // tagged by the decay parent, not the target-exit ancestor
        let mut ev = event(12, &[(3.0, 1.0)]);
        ev.tgtexit.tptype = 2212;
        s.fill(&ev, &RayOffsets::from_detectors(p.detectors()));
        assert_relative_eq!(s.hist(0).integral(), NORMALIZATION);
        assert_relative_eq!(s.hist(2).integral(), 2.0 * NORMALIZATION);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn hist_out_of_range() {
        let p = params(&[("ND", 1)]);
        let mut s =
            Spectra1D::new(&p, "s", [energy_axis()], Weight::default(), None, &NoCurves).unwrap();
        s.hist(2);
    }
}
