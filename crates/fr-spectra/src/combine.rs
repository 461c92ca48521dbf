//! Summing histograms over flavors and parents.
//!
//! Within one detector, histograms sit at `flav + n_flav * (par + n_par * xsec)`.
//! Summing over flavors walks consecutive positions; summing over parents
//! steps by `n_flav`.

use fr_core::Parameters;

use crate::hist::Histogram;

/// Flavor segment of flavor-summed histograms.
pub const ALL_NU: &str = "allnu";
/// Parent segment of parent-summed histograms.
pub const ALL_PAR: &str = "allpar";

/// For histogram `name` of Spectra `title`: whether its flavor segment is
/// `allnu` and whether its parent segment is `allpar`.
pub fn sum_markers(name: &str, title: &str) -> (bool, bool) {
    let Some(rest) = name.strip_prefix(title).and_then(|r| r.strip_prefix('_')) else {
        return (false, false);
    };
    let mut segments = rest.split('_');
    (segments.next() == Some(ALL_NU), segments.next() == Some(ALL_PAR))
}

/// Whether histogram `name` of Spectra `title` is a flavor or parent sum.
pub fn is_combined(name: &str, title: &str) -> bool {
    let (nu, par) = sum_markers(name, title);
    nu || par
}

/// Shape of the histograms of one detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Number of flavors.
    pub n_flav: usize,
    /// Number of parents.
    pub n_par: usize,
    /// Number of cross sections.
    pub n_xsec: usize,
}

impl Block {
    /// Block shape of `params`.
    pub fn of(params: &Parameters) -> Self {
        Self { n_flav: params.n_flav(), n_par: params.n_par(), n_xsec: params.n_xsec() }
    }

    /// Number of histograms in one block.
    pub fn len(&self) -> usize {
        self.n_flav * self.n_par * self.n_xsec
    }

    /// Whether the block holds no histograms.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of `(flav, par, xsec)` inside the block.
    pub fn local(&self, flav: usize, par: usize, xsec: usize) -> usize {
        flav + self.n_flav * (par + self.n_par * xsec)
    }

    /// Per `(xsec, par)`, cross section outermost: the sum over flavors.
    ///
    /// # Panics
    ///
    /// Panics if `block` is shorter than [`Block::len`] or binnings differ.
    pub fn sum_flavors(&self, block: &[Histogram]) -> Vec<Histogram> {
        let mut out = Vec::with_capacity(self.n_xsec * self.n_par);
        for xsec in 0..self.n_xsec {
            for par in 0..self.n_par {
                out.extend(sum_strided(block, self.local(0, par, xsec), 1, self.n_flav));
            }
        }
        out
    }

    /// Per `(xsec, flav)`, cross section outermost: the sum over parents.
    pub fn sum_parents(&self, block: &[Histogram]) -> Vec<Histogram> {
        let mut out = Vec::with_capacity(self.n_xsec * self.n_flav);
        for xsec in 0..self.n_xsec {
            for flav in 0..self.n_flav {
                out.extend(sum_strided(block, self.local(flav, 0, xsec), self.n_flav, self.n_par));
            }
        }
        out
    }

    /// Per cross section: the sum over flavors of the output of
    /// [`Block::sum_parents`].
    pub fn sum_parent_sums(&self, parent_sums: &[Histogram]) -> Vec<Histogram> {
        (0..self.n_xsec)
            .filter_map(|xsec| sum_strided(parent_sums, xsec * self.n_flav, 1, self.n_flav))
            .collect()
    }
}

/// Sum of `count` histograms starting at `first`, `stride` apart.
fn sum_strided(hists: &[Histogram], first: usize, stride: usize, count: usize) -> Option<Histogram> {
    if count == 0 {
        return None;
    }
    let mut total = hists[first].clone();
    for k in 1..count {
        total.add(&hists[first + k * stride]);
    }
    Some(total)
}

/// Builds histogram names from the parameter labels of one Spectra.
#[derive(Debug, Clone, Copy)]
pub struct Namer<'a> {
    /// Spectra title.
    pub title: &'a str,
    /// Parameters providing the labels.
    pub params: &'a Parameters,
    /// Trailing detector segment, e.g. `ND` or `ND_FD`.
    pub det: &'a str,
}

impl Namer<'_> {
    fn name(&self, flav: &str, par: &str, xsec: usize) -> String {
        let xsec = self.params.xsec(xsec).unwrap_or_default();
        format!("{}_{flav}_{par}_{xsec}_{}", self.title, self.det)
    }

    fn flav(&self, i: usize) -> &str {
        self.params.nu_flav(i).map(|p| p.name()).unwrap_or_default()
    }

    fn par(&self, i: usize) -> &str {
        self.params.parent(i).map(|p| p.name()).unwrap_or_default()
    }

    /// Names of the uncombined histograms, in block order.
    pub fn raw_names(&self) -> Vec<String> {
        let b = Block::of(self.params);
        let mut out = Vec::with_capacity(b.len());
        for xsec in 0..b.n_xsec {
            for par in 0..b.n_par {
                for flav in 0..b.n_flav {
                    out.push(self.name(self.flav(flav), self.par(par), xsec));
                }
            }
        }
        out
    }

    /// Names matching [`Block::sum_flavors`].
    pub fn flavor_sums(&self) -> Vec<String> {
        let b = Block::of(self.params);
        let mut out = Vec::with_capacity(b.n_xsec * b.n_par);
        if b.n_flav == 0 {
            return out;
        }
        for xsec in 0..b.n_xsec {
            for par in 0..b.n_par {
                out.push(self.name(ALL_NU, self.par(par), xsec));
            }
        }
        out
    }

    /// Names matching [`Block::sum_parents`].
    pub fn parent_sums(&self) -> Vec<String> {
        let b = Block::of(self.params);
        let mut out = Vec::with_capacity(b.n_xsec * b.n_flav);
        if b.n_par == 0 {
            return out;
        }
        for xsec in 0..b.n_xsec {
            for flav in 0..b.n_flav {
                out.push(self.name(self.flav(flav), ALL_PAR, xsec));
            }
        }
        out
    }

    /// Names matching [`Block::sum_parent_sums`].
    pub fn total_sums(&self) -> Vec<String> {
        let b = Block::of(self.params);
        if b.n_flav == 0 || b.n_par == 0 {
            return Vec::new();
        }
        (0..b.n_xsec).map(|xsec| self.name(ALL_NU, ALL_PAR, xsec)).collect()
    }
}

/// Give each histogram the matching name.
pub fn rename_all(hists: &mut [Histogram], names: Vec<String>) {
    debug_assert_eq!(hists.len(), names.len());
    for (h, n) in hists.iter_mut().zip(names) {
        h.name = n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hist::{Axis, bins};
    use fr_core::{Detector, Particle};

    fn block_hists(b: Block) -> Vec<Histogram> {
        (0..b.len())
            .map(|i| {
                let mut h = Histogram::new_1d(format!("h{i}"), "", Axis::new("x", bins(1, 0.0, 1.0)));
                h.fill(&[0.5], (1 << i) as f64);
                h
            })
            .collect()
    }

    #[test]
    fn flavor_sums_use_consecutive_positions() {
        let b = Block { n_flav: 2, n_par: 3, n_xsec: 2 };
        let sums = b.sum_flavors(&block_hists(b));
        assert_eq!(sums.len(), 6);
        // (xsec 0, par 1) covers positions 2 and 3
        assert_eq!(sums[1].integral(), (4 + 8) as f64);
        // (xsec 1, par 0) covers positions 6 and 7
        assert_eq!(sums[3].integral(), (64 + 128) as f64);
    }

    #[test]
    fn parent_sums_stride_by_flavors() {
        let b = Block { n_flav: 2, n_par: 3, n_xsec: 2 };
        let sums = b.sum_parents(&block_hists(b));
        assert_eq!(sums.len(), 4);
        // (xsec 0, flav 1): positions 1, 3, 5
        assert_eq!(sums[1].integral(), (2 + 8 + 32) as f64);
        let totals = b.sum_parent_sums(&sums);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].integral(), 63.0);
        assert_eq!(totals[1].integral(), (63 << 6) as f64);
    }

    #[test]
    fn names_follow_sum_order() {
        let params = Parameters::from_parts(
            vec![Particle::new("nue", 12), Particle::new("numu", 14)],
            vec![Particle::new("pi", 211)],
            vec!["NoXSec".into(), "res_cc_p".into()],
            vec![Detector::placeholder("ND")],
            false,
        );
        let namer = Namer { title: "t", params: &params, det: "ND" };
        assert_eq!(namer.raw_names()[1], "t_numu_pi_NoXSec_ND");
        assert_eq!(namer.raw_names()[2], "t_nue_pi_res_cc_p_ND");
        assert_eq!(namer.flavor_sums(), ["t_allnu_pi_NoXSec_ND", "t_allnu_pi_res_cc_p_ND"]);
        assert_eq!(namer.parent_sums()[3], "t_numu_allpar_res_cc_p_ND");
        assert_eq!(namer.total_sums(), ["t_allnu_allpar_NoXSec_ND", "t_allnu_allpar_res_cc_p_ND"]);
        assert!(is_combined("t_allnu_allpar_NoXSec_ND", "t"));
        assert!(!is_combined("t_nue_pi_NoXSec_ND", "t"));
    }

    #[test]
    fn markers_are_read_from_segments() {
        assert_eq!(sum_markers("smallnumu_allnu_pi_NoXSec_ND", "smallnumu"), (true, false));
        assert_eq!(sum_markers("smallnumu_numu_allpar_NoXSec_ND", "smallnumu"), (false, true));
        assert!(!is_combined("smallnumu_numu_pi_NoXSec_ND", "smallnumu"));
        assert!(!is_combined("t_nue_pi_allpar_xsec_ND", "t"));
        assert!(!is_combined("t_allnu_pi_NoXSec_ND", "other"));
    }
}
