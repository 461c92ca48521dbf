//! Flux entry record: one simulated decay and its per-detector neutrino rays.
//!
//! Field names follow the dk2nu flux format so that branch names
//! (`"decay.ntype"`, `"nuray.E"`, ...) keep their meaning.

use serde::{Deserialize, Serialize};

/// Decay of the neutrino parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Decay {
    /// Neutrino PDG code.
    pub ntype: i32,
    /// Parent PDG code.
    pub ptype: i32,
    /// Importance weight.
    pub nimpwt: f64,
    /// Decay vertex (cm, beam coordinates).
    pub vx: f64,
    /// Decay vertex y.
    pub vy: f64,
    /// Decay vertex z.
    pub vz: f64,
    /// Parent momentum at decay, x (GeV/c).
    pub pdpx: f64,
    /// Parent momentum at decay, y.
    pub pdpy: f64,
    /// Parent momentum at decay, z.
    pub pdpz: f64,
    /// Parent energy at production (GeV).
    pub ppenergy: f64,
    /// Neutrino energy in the parent rest frame (GeV).
    pub necm: f64,
}

/// The ancestor of the neutrino as it left the target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetExit {
    /// PDG code of the ancestor leaving the target.
    pub tptype: i32,
    /// Momentum at target exit, x (GeV/c).
    pub tpx: f64,
    /// Momentum at target exit, y.
    pub tpy: f64,
    /// Momentum at target exit, z.
    pub tpz: f64,
}

/// One entry of the ancestry chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ancestor {
    /// PDG code.
    pub pdg: i32,
    /// Momentum where this ancestor stopped, x (GeV/c).
    pub stoppx: f64,
    /// Momentum where this ancestor stopped, y.
    pub stoppy: f64,
    /// Momentum where this ancestor stopped, z.
    pub stoppz: f64,
}

/// A neutrino ray forced toward a detector location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NuRay {
    /// Neutrino energy at the detector (GeV).
    #[serde(rename = "E")]
    pub energy: f64,
    /// Propagation weight to the detector.
    pub wgt: f64,
}

/// One flux entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxEvent {
    /// Parent decay.
    pub decay: Decay,
    /// Target-exit ancestor.
    pub tgtexit: TargetExit,
    /// Ancestry chain.
    pub ancestor: Vec<Ancestor>,
    /// Rays, laid out per detector at the offsets assigned by the reader.
    pub nuray: Vec<NuRay>,
}

impl FluxEvent {
    /// Ray `i`.
    ///
    /// # Panics
    ///
    /// Panics if the entry has fewer rays than the detector layout requires.
    pub fn ray(&self, i: usize) -> &NuRay {
        match self.nuray.get(i) {
            Some(r) => r,
            None => panic!("entry has {} rays, ray {i} requested", self.nuray.len()),
        }
    }

    /// Make room for at least `n` rays.
    pub fn ensure_rays(&mut self, n: usize) {
        if self.nuray.len() < n {
            self.nuray.resize(n, NuRay::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_dk2nu_names() {
        let ev: FluxEvent = serde_json::from_str(
            r#"{"decay": {"ntype": 14, "ptype": 211, "nimpwt": 0.5},
                "nuray": [{"E": 2.0, "wgt": 1e-6}]}"#,
        )
        .unwrap();
        assert_eq!(ev.decay.ntype, 14);
        assert_eq!(ev.ray(0).energy, 2.0);
        assert!(ev.ancestor.is_empty());
    }

    #[test]
    fn ensure_rays_only_grows() {
        let mut ev = FluxEvent::default();
        ev.ensure_rays(3);
        assert_eq!(ev.nuray.len(), 3);
        ev.ensure_rays(1);
        assert_eq!(ev.nuray.len(), 3);
    }
}
