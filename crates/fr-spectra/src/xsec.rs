//! Cross-section curves used to weight rays.
//!
//! Curves are opaque: a Spectra asks an [`XSecProvider`] once per distinct
//! (neutrino PDG, target, interaction label) and keeps the evaluator for its
//! lifetime.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use fr_core::{Error, Parameters, Result, NO_XSEC};

/// A cross section as a function of neutrino energy.
pub trait CrossSection: Send + Sync {
    /// Cross section at `energy` (GeV).
    fn eval(&self, energy: f64) -> f64;
}

/// The same value at every energy. `NoXSec` uses 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantXSec(pub f64);

impl CrossSection for ConstantXSec {
    fn eval(&self, _energy: f64) -> f64 {
        self.0
    }
}

/// Piecewise-linear curve through tabulated `(energy, value)` points.
///
/// Negative interpolated values are clamped to 0; energies outside the table
/// evaluate to 0.
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedXSec {
    energies: Vec<f64>,
    values: Vec<f64>,
}

impl TabulatedXSec {
    /// Build from points; they are sorted by energy.
    pub fn new(mut points: Vec<(f64, f64)>) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::Validation("cross-section table has no points".into()));
        }
        if points.iter().any(|(e, v)| !e.is_finite() || !v.is_finite()) {
            return Err(Error::Validation("cross-section table has non-finite points".into()));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (energies, values) = points.into_iter().unzip();
        Ok(Self { energies, values })
    }
}

impl CrossSection for TabulatedXSec {
    fn eval(&self, energy: f64) -> f64 {
        let n = self.energies.len();
        if energy.is_nan() || energy < self.energies[0] || energy > self.energies[n - 1] {
            return 0.0;
        }
        let hi = self.energies.partition_point(|&e| e < energy);
        if hi == 0 {
            return self.values[0].max(0.0);
        }
        let (e0, e1) = (self.energies[hi - 1], self.energies[hi]);
        let (v0, v1) = (self.values[hi - 1], self.values[hi]);
        let t = (energy - e0) / (e1 - e0);
        (v0 + t * (v1 - v0)).max(0.0)
    }
}

/// Source of cross-section evaluators.
pub trait XSecProvider {
    /// Evaluator for neutrino `pdg` on `target` with interaction `label`.
    fn evaluator(&self, pdg: i32, target: &str, label: &str) -> Result<Arc<dyn CrossSection>>;
}

/// Provider backed by a JSON table of curves.
///
/// The file maps `"pdg/target/label"` keys (e.g. `"14/C/tot_cc"`) to lists of
/// `[energy, value]` points.
#[derive(Debug, Clone, Default)]
pub struct TableXSecProvider {
    curves: BTreeMap<String, Arc<TabulatedXSec>>,
}

impl TableXSecProvider {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Key under which a curve is stored.
    pub fn key(pdg: i32, target: &str, label: &str) -> String {
        format!("{pdg}/{target}/{label}")
    }

    /// Add or replace a curve.
    pub fn insert(&mut self, pdg: i32, target: &str, label: &str, curve: TabulatedXSec) {
        self.curves.insert(Self::key(pdg, target, label), Arc::new(curve));
    }

    /// Parse a JSON table.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<(f64, f64)>> = serde_json::from_str(json)?;
        let mut curves = BTreeMap::new();
        for (key, points) in raw {
            let curve = TabulatedXSec::new(points)
                .map_err(|e| Error::Validation(format!("curve '{key}': {e}")))?;
            curves.insert(key, Arc::new(curve));
        }
        Ok(Self { curves })
    }

    /// Read a JSON table from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Number of curves.
    pub fn len(&self) -> usize {
        self.curves.len()
    }

    /// Whether the table holds no curves.
    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }
}

impl XSecProvider for TableXSecProvider {
    fn evaluator(&self, pdg: i32, target: &str, label: &str) -> Result<Arc<dyn CrossSection>> {
        let key = Self::key(pdg, target, label);
        match self.curves.get(&key) {
            Some(c) => Ok(c.clone()),
            None => Err(Error::NotFound(format!("cross section '{key}'"))),
        }
    }
}

/// Small-integer key of a cached evaluator: (flavor, cross section, detector) positions.
pub type XSecKey = (usize, usize, usize);

/// Evaluators of one Spectra, keyed by parameter positions.
#[derive(Clone, Default)]
pub struct XSecCache {
    evaluators: HashMap<XSecKey, Arc<dyn CrossSection>>,
}

impl XSecCache {
    /// Build every evaluator `params` can need.
    ///
    /// Each distinct (flavor, cross section, detector) triple gets one entry.
    /// Triples that resolve to the same (PDG, target, label) share one
    /// evaluator, and `NoXSec` never reaches the provider.
    pub fn build(params: &Parameters, provider: &dyn XSecProvider) -> Result<Self> {
        let mut evaluators: HashMap<XSecKey, Arc<dyn CrossSection>> = HashMap::new();
        let mut by_curve: HashMap<(i32, String, String), Arc<dyn CrossSection>> = HashMap::new();
        let unit: Arc<dyn CrossSection> = Arc::new(ConstantXSec(1.0));

        for (_, idx) in params.iter() {
            let key = (idx.flav, idx.xsec, idx.det);
            if evaluators.contains_key(&key) {
                continue;
            }
            let label = &params.xsecs()[idx.xsec];
            let eval = if label == NO_XSEC {
                unit.clone()
            } else {
                let pdg = params.nu_flavs()[idx.flav].pdg();
                let target = params.detectors()[idx.det].target().to_string();
                let curve = (pdg, target, label.clone());
                match by_curve.get(&curve) {
                    Some(e) => e.clone(),
                    None => {
                        let e = provider.evaluator(pdg, &curve.1, label)?;
                        by_curve.insert(curve, e.clone());
                        e
                    }
                }
            };
            evaluators.insert(key, eval);
        }
        Ok(Self { evaluators })
    }

    /// Evaluator for `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` was not part of the parameters the cache was built from.
    pub fn get(&self, key: XSecKey) -> &dyn CrossSection {
        match self.evaluators.get(&key) {
            Some(e) => e.as_ref(),
            None => panic!("no cross section cached for {key:?}"),
        }
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}

impl std::fmt::Debug for XSecCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XSecCache").field("keys", &self.evaluators.len()).finish()
    }
}

/// Provider that knows no curves; any parameter set using only `NoXSec` works with it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCurves;

impl XSecProvider for NoCurves {
    fn evaluator(&self, pdg: i32, target: &str, label: &str) -> Result<Arc<dyn CrossSection>> {
        Err(Error::NotFound(format!(
            "cross section '{}': no cross-section table loaded",
            TableXSecProvider::key(pdg, target, label)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fr_core::{Detector, Particle};
    use nalgebra::Vector3;
    use std::cell::Cell;

    #[test]
    fn tabulated_interpolates_and_clamps() {
        let xs = TabulatedXSec::new(vec![(2.0, 4.0), (0.0, 0.0), (4.0, -4.0)]).unwrap();
        assert_relative_eq!(xs.eval(1.0), 2.0);
        assert_relative_eq!(xs.eval(2.0), 4.0);
        assert_relative_eq!(xs.eval(0.0), 0.0);
        // 4 -> -4 crosses zero at 3
        assert_relative_eq!(xs.eval(2.5), 2.0);
        assert_eq!(xs.eval(3.5), 0.0);
        assert_eq!(xs.eval(5.0), 0.0);
        assert_eq!(xs.eval(-1.0), 0.0);
    }

    #[test]
    fn table_from_json() {
        let p = TableXSecProvider::from_json(r#"{"14/C/tot_cc": [[0, 0], [10, 1]]}"#).unwrap();
        assert_eq!(p.len(), 1);
        assert_relative_eq!(p.evaluator(14, "C", "tot_cc").unwrap().eval(5.0), 0.5);
        assert!(matches!(p.evaluator(12, "C", "tot_cc"), Err(Error::NotFound(_))));
        assert!(TableXSecProvider::from_json(r#"{"x": []}"#).is_err());
    }

    struct Counting {
        calls: Cell<usize>,
    }

    impl XSecProvider for Counting {
        fn evaluator(&self, _: i32, _: &str, _: &str) -> Result<Arc<dyn CrossSection>> {
            self.calls.set(self.calls.get() + 1);
            Ok(Arc::new(ConstantXSec(2.0)))
        }
    }

    fn det(name: &str, target: &str) -> Detector {
        Detector::new(name, target, Vector3::zeros(), Vector3::zeros(), 1)
    }

    #[test]
    fn cache_shares_curves_and_skips_no_xsec() {
        let params = Parameters::from_parts(
            vec![Particle::new("nue", 12), Particle::new("numu", 14)],
            vec![Particle::new("pi", 211), Particle::new("K", 321)],
            vec!["NoXSec".into(), "tot_cc".into()],
            vec![det("ND", "C"), det("FD", "C"), det("WC", "O")],
            false,
        );
        let provider = Counting { calls: Cell::new(0) };
        let cache = XSecCache::build(&params, &provider).unwrap();

        assert_eq!(cache.len(), 2 * 2 * 3);
        // tot_cc for two flavors on two distinct targets
        assert_eq!(provider.calls.get(), 4);
        assert_eq!(cache.get((1, 0, 2)).eval(3.0), 1.0);
        assert_eq!(cache.get((1, 1, 2)).eval(3.0), 2.0);
    }

    #[test]
    fn no_curves_only_supports_no_xsec() {
        let mut params = Parameters::from_parts(
            vec![Particle::new("nue", 12)],
            vec![Particle::new("mu", 13)],
            vec!["NoXSec".into()],
            vec![det("D1", "C")],
            false,
        );
        assert!(XSecCache::build(&params, &NoCurves).is_ok());
        params.add_xsec("tot_cc");
        assert!(matches!(XSecCache::build(&params, &NoCurves), Err(Error::NotFound(_))));
    }
}
