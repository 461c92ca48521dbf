//! Variables to bin entries by, and weights to fill them with.
//!
//! A [`Var`] or [`Weight`] pairs a function with the set of flux branches it
//! reads, so the reader knows which branches must be loaded.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::event::FluxEvent;
use crate::hist::Histogram;

type VarFn = dyn Fn(&FluxEvent, usize) -> f64 + Send + Sync;
type WeightFn = dyn Fn(f64, &FluxEvent, usize, Option<&Histogram>) -> f64 + Send + Sync;

fn branch_set(branches: &[&str]) -> BTreeSet<String> {
    branches.iter().map(|b| b.to_string()).collect()
}

/// A quantity computed from a flux entry and one of its ray indices.
#[derive(Clone)]
pub struct Var {
    branches: BTreeSet<String>,
    func: Arc<VarFn>,
}

impl Var {
    /// Create a variable reading `branches`.
    pub fn new<F>(branches: &[&str], func: F) -> Self
    where
        F: Fn(&FluxEvent, usize) -> f64 + Send + Sync + 'static,
    {
        Self { branches: branch_set(branches), func: Arc::new(func) }
    }

    /// Branches this variable reads.
    pub fn branches(&self) -> &BTreeSet<String> {
        &self.branches
    }

    /// Evaluate for ray `i_ray` of `event`.
    pub fn eval(&self, event: &FluxEvent, i_ray: usize) -> f64 {
        (self.func)(event, i_ray)
    }

    /// Look up a preset by name (`energy`, `parent_pt`, `parent_pz`,
    /// `target_exit_pt`, `target_exit_pz`).
    pub fn preset(name: &str) -> Option<Self> {
        Some(match name {
            "energy" => vars::energy(),
            "parent_pt" => vars::parent_pt(),
            "parent_pz" => vars::parent_pz(),
            "target_exit_pt" => vars::target_exit_pt(),
            "target_exit_pz" => vars::target_exit_pz(),
            _ => return None,
        })
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var").field("branches", &self.branches).finish_non_exhaustive()
    }
}

/// Maps the standard entry weight to the weight actually filled.
///
/// The function receives the standard weight (importance weight x ray weight
/// x cross section x normalization), the entry, the ray index and optional
/// external weights.
#[derive(Clone)]
pub struct Weight {
    branches: BTreeSet<String>,
    func: Arc<WeightFn>,
}

impl Weight {
    /// Create a weight reading `branches`.
    pub fn new<F>(branches: &[&str], func: F) -> Self
    where
        F: Fn(f64, &FluxEvent, usize, Option<&Histogram>) -> f64 + Send + Sync + 'static,
    {
        Self { branches: branch_set(branches), func: Arc::new(func) }
    }

    /// Branches this weight reads.
    pub fn branches(&self) -> &BTreeSet<String> {
        &self.branches
    }

    /// Evaluate.
    pub fn eval(&self, w: f64, event: &FluxEvent, i_ray: usize, ext: Option<&Histogram>) -> f64 {
        (self.func)(w, event, i_ray, ext)
    }

    /// Look up a preset by name (`default`, `none`, `ext_pt_pz`).
    pub fn preset(name: &str) -> Option<Self> {
        Some(match name {
            "default" => weights::default_weight(),
            "none" => weights::no_weight(),
            "ext_pt_pz" => weights::ext_weight_by_pt_pz(),
            _ => return None,
        })
    }
}

impl Default for Weight {
    fn default() -> Self {
        weights::default_weight()
    }
}

impl fmt::Debug for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Weight").field("branches", &self.branches).finish_non_exhaustive()
    }
}

/// Common variables.
pub mod vars {
    use super::Var;

    /// Neutrino energy of the ray.
    pub fn energy() -> Var {
        Var::new(&["nuray", "nuray.E"], |nu, i| nu.ray(i).energy)
    }

    /// Parent momentum transverse to the beam, at decay.
    pub fn parent_pt() -> Var {
        Var::new(&["decay", "decay.pdpx", "decay.pdpy"], |nu, _| {
            nu.decay.pdpx.hypot(nu.decay.pdpy)
        })
    }

    /// Parent momentum along the beam, at decay.
    pub fn parent_pz() -> Var {
        Var::new(&["decay", "decay.pdpz"], |nu, _| nu.decay.pdpz)
    }

    /// Transverse momentum of the ancestor leaving the target.
    pub fn target_exit_pt() -> Var {
        Var::new(&["tgtexit", "tgtexit.tpx", "tgtexit.tpy"], |nu, _| {
            nu.tgtexit.tpx.hypot(nu.tgtexit.tpy)
        })
    }

    /// Longitudinal momentum of the ancestor leaving the target.
    pub fn target_exit_pz() -> Var {
        Var::new(&["tgtexit", "tgtexit.tpz"], |nu, _| nu.tgtexit.tpz)
    }
}

/// Common weights.
pub mod weights {
    use super::Weight;

    /// The standard weight, unchanged.
    pub fn default_weight() -> Weight {
        Weight::new(&[], |w, _, _, _| w)
    }

    /// Every entry weighs 1.
    pub fn no_weight() -> Weight {
        Weight::new(&[], |_, _, _, _| 1.0)
    }

    /// Every entry weighs `c`.
    pub fn constant(c: f64) -> Weight {
        Weight::new(&[], move |_, _, _, _| c)
    }

    /// Standard weight times the external 2D histogram evaluated at the
    /// first ancestor's (pT, pz). Entries outside the histogram, or without
    /// an ancestor or external histogram, weigh 0.
    pub fn ext_weight_by_pt_pz() -> Weight {
        Weight::new(
            &["ancestor", "ancestor.stoppx", "ancestor.stoppy", "ancestor.stoppz"],
            |w, nu, _, ext| {
                let (Some(hist), Some(anc)) = (ext, nu.ancestor.first()) else {
                    return 0.0;
                };
                let pt = anc.stoppx.hypot(anc.stoppy);
                match hist.find_in_range_bin(&[pt, anc.stoppz]) {
                    Some(bin) => w * hist.bin_content[bin],
                    None => 0.0,
                }
            },
        )
    }
}
