//! The parameter set a Spectra is sliced by: neutrino flavors, parents,
//! cross sections and detectors.
//!
//! [`Parameters`] only holds the collections. The "current selection" lives in a
//! separate [`ParamCursor`], so a Spectra can keep an immutable snapshot and
//! compute indices per fill.

use serde::{Deserialize, Serialize};

use crate::detector::Detector;
use crate::indices::{Indices, Radix, RadixIter};
use crate::interaction::{GenieInteractions, InteractionRegistry, NO_XSEC};
use crate::particle::{self, Particle, ParticleKey};

/// Which particle a neutrino is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AncestorMode {
    /// The particle that decayed into the neutrino.
    #[default]
    ByDirectParent,
    /// The ancestor that left the target.
    ByTargetExitAncestor,
}

/// Flavors, parents, cross sections and detectors to split histograms by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameters {
    nu_flavs: Vec<Particle>,
    parents: Vec<Particle>,
    xsecs: Vec<String>,
    detectors: Vec<Detector>,
    sign_sensitive: bool,
    #[serde(default)]
    ancestor: AncestorMode,
    #[serde(default = "default_verbose")]
    verbose: bool,
}

fn default_verbose() -> bool {
    true
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Parameters {
    /// Default parameters: all non-tau flavors, every parent, `NoXSec`, `tot_cc`
    /// and `tot_nc`, and no detectors.
    pub fn new(sign_sensitive: bool) -> Self {
        let mut p = Self {
            nu_flavs: Vec::new(),
            parents: Vec::new(),
            xsecs: Vec::new(),
            detectors: Vec::new(),
            sign_sensitive,
            ancestor: AncestorMode::ByDirectParent,
            verbose: true,
        };
        p.set_defaults(sign_sensitive);
        p.remove_nu_taus();
        p
    }

    /// Build directly from collections, without duplicate or label validation.
    ///
    /// Used when reconstructing parameters from a written result, where the
    /// labels are whatever the file contains.
    pub fn from_parts(
        nu_flavs: Vec<Particle>,
        parents: Vec<Particle>,
        xsecs: Vec<String>,
        detectors: Vec<Detector>,
        sign_sensitive: bool,
    ) -> Self {
        Self {
            nu_flavs,
            parents,
            xsecs,
            detectors,
            sign_sensitive,
            ancestor: AncestorMode::ByDirectParent,
            verbose: true,
        }
    }

    /// Reset flavors, parents and cross sections to the defaults.
    /// Detectors are left untouched.
    pub fn set_defaults(&mut self, sign_sensitive: bool) {
        self.sign_sensitive = sign_sensitive;
        self.nu_flavs = particle::all_nu_flavors(true);
        self.parents = particle::all_parents(sign_sensitive);
        self.xsecs = vec![NO_XSEC.to_string(), "tot_cc".to_string(), "tot_nc".to_string()];
    }

    /// Enable or disable logging of lookup misses.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Whether lookup misses are logged.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Whether the sign of the parent PDG code is kept.
    pub fn is_sign_sensitive(&self) -> bool {
        self.sign_sensitive
    }

    /// How neutrinos are attributed to a parent.
    pub fn ancestor_mode(&self) -> AncestorMode {
        self.ancestor
    }

    /// Split by the direct parent (default).
    pub fn set_ancestor_par(&mut self) {
        self.ancestor = AncestorMode::ByDirectParent;
    }

    /// Split by the ancestor exiting the target.
    pub fn set_ancestor_tgt(&mut self) {
        self.ancestor = AncestorMode::ByTargetExitAncestor;
    }

    // ----- additions -------------------------------------------------------

    /// Add a detector. A detector with the same name is rejected.
    pub fn add_detector(&mut self, det: Detector) {
        if self.det_index(det.name()).is_some() {
            log::warn!("detector name '{}' already exists for another detector", det.name());
            return;
        }
        self.detectors.push(det);
    }

    /// Add a parent. A parent with the same PDG code is rejected.
    pub fn add_parent(&mut self, parent: Particle) {
        if let Some(existing) = self.parents.iter().find(|p| p.pdg() == parent.pdg()) {
            log::warn!("parent {} is already included as {}", parent.pdg(), existing.name());
            return;
        }
        self.parents.push(parent);
    }

    /// Add a cross section, validated against the GENIE interaction list.
    pub fn add_xsec(&mut self, label: &str) {
        self.add_xsec_with(label, &GenieInteractions);
    }

    /// Add a cross section, validated against `registry`.
    ///
    /// Duplicates and labels unknown to the registry (other than `NoXSec`) are rejected.
    pub fn add_xsec_with(&mut self, label: &str, registry: &dyn InteractionRegistry) {
        if self.xsecs.iter().any(|x| x == label) {
            log::warn!("cross section '{label}' is already included");
            return;
        }
        if label != NO_XSEC && !registry.is_valid(label) {
            log::warn!(
                "cross section '{label}' is not valid; valid labels are: {}",
                registry.labels().join(", ")
            );
            return;
        }
        self.xsecs.push(label.to_string());
    }

    // ----- removals --------------------------------------------------------

    /// Remove every detector named `name`.
    pub fn remove_detector(&mut self, name: &str) {
        self.detectors.retain(|d| d.name() != name);
    }

    /// Remove neutrino flavors matching `key`.
    pub fn remove_nu_flav(&mut self, key: ParticleKey<'_>) {
        particle::remove_matching(&mut self.nu_flavs, key);
    }

    /// Remove neutrino flavors with PDG code `pdg`.
    pub fn remove_nu_flav_pdg(&mut self, pdg: i32) {
        self.remove_nu_flav(ParticleKey::Pdg(pdg));
    }

    /// Remove neutrino flavors named `name`.
    pub fn remove_nu_flav_name(&mut self, name: &str) {
        self.remove_nu_flav(ParticleKey::Name(name));
    }

    /// Remove both tau flavors.
    pub fn remove_nu_taus(&mut self) {
        self.remove_nu_flav_pdg(16);
        self.remove_nu_flav_pdg(-16);
    }

    /// Remove parents matching `key`.
    pub fn remove_parent(&mut self, key: ParticleKey<'_>) {
        particle::remove_matching(&mut self.parents, key);
    }

    /// Remove parents with PDG code `pdg`.
    pub fn remove_parent_pdg(&mut self, pdg: i32) {
        self.remove_parent(ParticleKey::Pdg(pdg));
    }

    /// Remove parents named `name`.
    pub fn remove_parent_name(&mut self, name: &str) {
        self.remove_parent(ParticleKey::Name(name));
    }

    /// Remove the cross section `label`.
    pub fn remove_xsec(&mut self, label: &str) {
        self.xsecs.retain(|x| x != label);
    }

    /// Restore all six neutrino flavors. Flavors cannot be added one by one.
    pub fn reset_nu_flavs(&mut self) {
        self.nu_flavs = particle::all_nu_flavors(true);
    }

    /// Set the number of rays per decay for the detector `name`.
    pub fn set_det_uses(&mut self, name: &str, uses: u32) {
        for det in self.detectors.iter_mut().filter(|d| d.name() == name) {
            det.set_uses(uses);
        }
    }

    // ----- accessors -------------------------------------------------------

    /// Number of flavors.
    pub fn n_flav(&self) -> usize {
        self.nu_flavs.len()
    }

    /// Number of parents.
    pub fn n_par(&self) -> usize {
        self.parents.len()
    }

    /// Number of cross sections.
    pub fn n_xsec(&self) -> usize {
        self.xsecs.len()
    }

    /// Number of detectors.
    pub fn n_det(&self) -> usize {
        self.detectors.len()
    }

    /// The bases of the master index.
    pub fn radix(&self) -> Radix {
        Radix::new(self.n_flav(), self.n_par(), self.n_xsec(), self.n_det())
    }

    /// Number of master indices (product of all four sizes).
    pub fn max_master(&self) -> usize {
        self.radix().max_master()
    }

    /// Exclusive upper bound of the masters whose detector digit is at most `det`.
    pub fn max_master_for(&self, det: usize) -> usize {
        self.radix().max_master_for(det)
    }

    /// All neutrino flavors.
    pub fn nu_flavs(&self) -> &[Particle] {
        &self.nu_flavs
    }

    /// All parents.
    pub fn parents(&self) -> &[Particle] {
        &self.parents
    }

    /// All cross-section labels.
    pub fn xsecs(&self) -> &[String] {
        &self.xsecs
    }

    /// All detectors.
    pub fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    /// Flavor at position `i`.
    pub fn nu_flav(&self, i: usize) -> Option<&Particle> {
        self.nu_flavs.get(i)
    }

    /// Parent at position `i`.
    pub fn parent(&self, i: usize) -> Option<&Particle> {
        self.parents.get(i)
    }

    /// Cross-section label at position `i`.
    pub fn xsec(&self, i: usize) -> Option<&str> {
        self.xsecs.get(i).map(String::as_str)
    }

    /// Detector at position `i`.
    pub fn detector(&self, i: usize) -> Option<&Detector> {
        self.detectors.get(i)
    }

    /// Position of the flavor with PDG code `pdg`.
    pub fn nu_flav_index(&self, pdg: i32) -> Option<usize> {
        self.nu_flavs.iter().position(|p| p.pdg() == pdg)
    }

    /// Position of the parent with PDG code `pdg`.
    pub fn parent_index(&self, pdg: i32) -> Option<usize> {
        self.parents.iter().position(|p| p.pdg() == pdg)
    }

    /// Position of the cross section `label`.
    pub fn xsec_index(&self, label: &str) -> Option<usize> {
        self.xsecs.iter().position(|x| x == label)
    }

    /// Position of the detector named `name`.
    pub fn det_index(&self, name: &str) -> Option<usize> {
        self.detectors.iter().position(|d| d.name() == name)
    }

    /// Whether any of the four collections is empty.
    pub fn is_degenerate(&self) -> bool {
        self.radix().is_degenerate()
    }

    /// Name segments for `idx`: `flav_par_xsec_det`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of range.
    pub fn label(&self, idx: Indices) -> String {
        format!(
            "{}_{}_{}_{}",
            self.nu_flavs[idx.flav].name(),
            self.parents[idx.par].name(),
            self.xsecs[idx.xsec],
            self.detectors[idx.det].name()
        )
    }

    /// Composite label of master index `master`, `None` when out of range.
    pub fn name_tag(&self, master: usize) -> Option<String> {
        self.radix().decode(master).map(|idx| self.label(idx))
    }

    /// Every combination, in master order.
    pub fn iter(&self) -> RadixIter {
        self.radix().iter()
    }

    /// A cursor positioned at master 0.
    pub fn cursor(&self) -> ParamCursor<'_> {
        ParamCursor { params: self, idx: Indices::default() }
    }

    /// Log the contents of this parameter set.
    pub fn log_summary(&self, label: &str) {
        log::info!(
            "{label}: {} detectors, {} cross sections, {} parents, {} flavors",
            self.n_det(),
            self.n_xsec(),
            self.n_par(),
            self.n_flav()
        );
        log::debug!(
            "{label}: flavors=[{}] parents=[{}] xsecs=[{}] detectors=[{}]",
            join_names(self.nu_flavs.iter().map(Particle::name)),
            join_names(self.parents.iter().map(Particle::name)),
            join_names(self.xsecs.iter().map(String::as_str)),
            join_names(self.detectors.iter().map(Detector::name)),
        );
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = (usize, Indices);
    type IntoIter = RadixIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The current selection inside a [`Parameters`] set.
#[derive(Debug, Clone, Copy)]
pub struct ParamCursor<'a> {
    params: &'a Parameters,
    idx: Indices,
}

impl<'a> ParamCursor<'a> {
    /// The parameters this cursor walks.
    pub fn params(&self) -> &'a Parameters {
        self.params
    }

    /// Current digits.
    pub fn indices(&self) -> Indices {
        self.idx
    }

    /// Current flavor digit.
    pub fn current_nu_flav(&self) -> usize {
        self.idx.flav
    }

    /// Current parent digit.
    pub fn current_parent(&self) -> usize {
        self.idx.par
    }

    /// Current cross-section digit.
    pub fn current_xsec(&self) -> usize {
        self.idx.xsec
    }

    /// Current detector digit.
    pub fn current_det(&self) -> usize {
        self.idx.det
    }

    /// Select the flavor with PDG code `pdg`. Returns false if it is not tracked.
    pub fn set_current_nu_flav(&mut self, pdg: i32) -> bool {
        match self.params.nu_flav_index(pdg) {
            Some(i) => {
                self.idx.flav = i;
                true
            }
            None => {
                if self.params.verbose {
                    log::debug!("could not find {pdg} in flavor list");
                }
                false
            }
        }
    }

    /// Select the parent with PDG code `pdg`. Returns false if it is not tracked.
    pub fn set_current_parent(&mut self, pdg: i32) -> bool {
        match self.params.parent_index(pdg) {
            Some(i) => {
                self.idx.par = i;
                true
            }
            None => {
                if self.params.verbose {
                    log::debug!("could not find {pdg} in parent list");
                }
                false
            }
        }
    }

    /// Select cross section `i`. Returns false if out of range.
    pub fn set_current_xsec(&mut self, i: usize) -> bool {
        if i >= self.params.n_xsec() {
            if self.params.verbose {
                log::warn!("cross section index {i} is out of range");
            }
            return false;
        }
        self.idx.xsec = i;
        true
    }

    /// Select detector `i`. Returns false if out of range.
    pub fn set_current_det(&mut self, i: usize) -> bool {
        if i >= self.params.n_det() {
            if self.params.verbose {
                log::warn!("detector index {i} is out of range");
            }
            return false;
        }
        self.idx.det = i;
        true
    }

    /// Set every digit from `master`. Returns false (and leaves the cursor
    /// unchanged) if `master` is out of range.
    pub fn set_indices(&mut self, master: usize) -> bool {
        match self.params.radix().decode(master) {
            Some(idx) => {
                self.idx = idx;
                true
            }
            None => {
                if self.params.verbose {
                    log::warn!("master index {master} is out of range");
                }
                false
            }
        }
    }

    /// Master index of the current digits.
    ///
    /// # Panics
    ///
    /// Panics if the parameter set is degenerate.
    pub fn current_master(&self) -> usize {
        self.params.radix().encode(self.idx)
    }

    /// Composite label of the current digits.
    pub fn name_tag(&self) -> String {
        self.params.label(self.idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::{nu, parent};
    use nalgebra::Vector3;

    fn det(name: &str) -> Detector {
        Detector::new(name, "C", Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0), 1)
    }

    #[test]
    fn defaults() {
        let p = Parameters::new(true);
        assert_eq!(p.n_flav(), 4);
        assert_eq!(p.n_par(), 7);
        assert_eq!(p.xsecs(), ["NoXSec", "tot_cc", "tot_nc"]);
        assert_eq!(p.n_det(), 0);
        assert!(p.is_degenerate());
        assert_eq!(p.ancestor_mode(), AncestorMode::ByDirectParent);

        let folded = Parameters::new(false);
        assert_eq!(folded.n_par(), 4);
        assert_eq!(folded.n_flav(), 4);
    }

    #[test]
    fn rejects_duplicates() {
        let mut p = Parameters::new(true);
        p.add_detector(det("ND"));
        p.add_detector(det("ND"));
        assert_eq!(p.n_det(), 1);

        p.add_parent(Particle::new("other_pi", 211));
        assert_eq!(p.n_par(), 7);

        p.add_xsec("tot_cc");
        assert_eq!(p.n_xsec(), 3);
    }

    #[test]
    fn rejects_unknown_xsec() {
        let mut p = Parameters::new(true);
        p.add_xsec("not_a_process");
        assert_eq!(p.n_xsec(), 3);

        p.remove_xsec("NoXSec");
        p.add_xsec("NoXSec");
        p.add_xsec("mec_cc");
        assert_eq!(p.xsecs(), ["tot_cc", "tot_nc", "NoXSec", "mec_cc"]);
    }

    #[test]
    fn removals_and_max_master() {
        let mut p = Parameters::new(true);
        p.add_detector(det("ND"));
        p.add_detector(det("FD"));
        assert_eq!(p.max_master(), 4 * 7 * 3 * 2);

        p.remove_nu_flav_name("anumu");
        p.remove_nu_flav(ParticleKey::Exact(&nu::ANUE));
        p.remove_parent_pdg(130);
        p.remove_parent(ParticleKey::Exact(&parent::K_MINUS));
        p.remove_parent_name("Kplus");
        p.remove_xsec("tot_nc");
        p.remove_detector("FD");
        p.remove_detector("missing");

        assert_eq!(p.radix(), Radix::new(2, 4, 2, 1));
        assert_eq!(p.max_master(), 16);
        assert_eq!(p.max_master_for(0), 16);
    }

    #[test]
    fn flavors_only_return_through_reset() {
        let mut p = Parameters::new(true);
        p.remove_nu_flav(ParticleKey::Exact(&nu::NUMU));
        assert_eq!(p.nu_flav_index(14), None);
        p.reset_nu_flavs();
        assert_eq!(p.n_flav(), 6);
        assert!(p.nu_flav_index(14).is_some());
    }

    #[test]
    fn parent_round_trip_membership() {
        let mut p = Parameters::new(true);
        p.remove_parent(ParticleKey::Exact(&parent::PI_PLUS));
        assert_eq!(p.n_par(), 6);
        p.add_parent(parent::PI_PLUS);
        assert_eq!(p.n_par(), 7);
        assert!(p.parents().contains(&parent::PI_PLUS));
    }

    #[test]
    fn name_tag_follows_digit_order() {
        let p = Parameters::from_parts(
            vec![nu::NUE, nu::NUMU],
            vec![parent::MUON, parent::PION],
            vec!["NoXSec".into()],
            vec![det("D1"), det("D2")],
            false,
        );
        assert_eq!(p.name_tag(0).as_deref(), Some("nue_mu_NoXSec_D1"));
        assert_eq!(p.name_tag(1).as_deref(), Some("numu_mu_NoXSec_D1"));
        assert_eq!(p.name_tag(2).as_deref(), Some("nue_pi_NoXSec_D1"));
        assert_eq!(p.name_tag(7).as_deref(), Some("numu_pi_NoXSec_D2"));
        assert_eq!(p.name_tag(8), None);
    }

    #[test]
    fn cursor_selection() {
        let mut p = Parameters::new(true);
        p.add_detector(det("ND"));
        p.set_verbose(false);

        let mut c = p.cursor();
        assert!(c.set_current_nu_flav(14));
        assert!(c.set_current_parent(211));
        assert!(!c.set_current_nu_flav(16));
        assert!(c.set_current_xsec(2));
        assert!(!c.set_current_xsec(3));
        assert!(!c.set_current_det(1));
        assert_eq!(c.current_nu_flav(), 2);
        assert_eq!(c.current_parent(), 2);
        assert_eq!(c.current_master(), 2 + 2 * 4 + 2 * 28);
        assert_eq!(c.name_tag(), "numu_piplus_tot_nc_ND");

        assert!(!c.set_indices(p.max_master()));
        assert_eq!(c.current_master(), 66);
        assert!(c.set_indices(5));
        assert_eq!(c.current_master(), 5);
    }

    #[test]
    fn quiet_cursor_still_reports_misses() {
        let mut p = Parameters::new(true);
        p.add_detector(det("ND"));
        p.set_verbose(false);
        let mut c = p.cursor();
        assert!(!c.set_current_xsec(p.n_xsec()));
        assert!(!c.set_current_det(1));
        assert!(!c.set_indices(p.max_master()));
        assert!(!c.set_current_nu_flav(16));
        assert_eq!(c.current_master(), 0);
    }

    #[test]
    fn snapshot_is_independent() {
        let mut p = Parameters::new(true);
        let snapshot = p.clone();
        p.set_ancestor_tgt();
        p.remove_xsec("tot_cc");
        assert_eq!(snapshot.ancestor_mode(), AncestorMode::ByDirectParent);
        assert_eq!(snapshot.n_xsec(), 3);
    }

    #[test]
    fn set_det_uses_targets_one_detector() {
        let mut p = Parameters::new(true);
        p.add_detector(det("ND"));
        p.add_detector(det("FD"));
        p.set_det_uses("FD", 4);
        assert_eq!(p.detector(0).map(Detector::uses), Some(1));
        assert_eq!(p.detector(1).map(Detector::uses), Some(4));
    }

    #[test]
    fn manifest_round_trip() {
        let mut p = Parameters::new(false);
        p.add_detector(det("ND"));
        p.set_ancestor_tgt();
        let json = serde_json::to_string(&p).unwrap();
        let back: Parameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back.radix(), p.radix());
        assert_eq!(back.ancestor_mode(), AncestorMode::ByTargetExitAncestor);
        assert_eq!(back.name_tag(0), p.name_tag(0));
    }
}
