//! Particle catalog: neutrino flavors and neutrino parents, keyed by PDG code.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A named particle category with its PDG Monte Carlo code.
///
/// Two particles are equal only when both the name and the PDG code match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Particle {
    name: Cow<'static, str>,
    pdg: i32,
}

impl Particle {
    /// Catalog entry with a static name.
    pub const fn preset(name: &'static str, pdg: i32) -> Self {
        Self { name: Cow::Borrowed(name), pdg }
    }

    /// Particle with a runtime name.
    pub fn new(name: impl Into<String>, pdg: i32) -> Self {
        Self { name: Cow::Owned(name.into()), pdg }
    }

    /// Particle name, as used in histogram names.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// PDG code.
    pub fn pdg(&self) -> i32 {
        self.pdg
    }
}

impl fmt::Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:+})", self.name, self.pdg)
    }
}

/// Neutrino flavors.
pub mod nu {
    use super::Particle;

    /// Electron neutrino.
    pub const NUE: Particle = Particle::preset("nue", 12);
    /// Electron antineutrino.
    pub const ANUE: Particle = Particle::preset("anue", -12);
    /// Muon neutrino.
    pub const NUMU: Particle = Particle::preset("numu", 14);
    /// Muon antineutrino.
    pub const ANUMU: Particle = Particle::preset("anumu", -14);
    /// Tau neutrino.
    pub const NUTAU: Particle = Particle::preset("nutau", 16);
    /// Tau antineutrino.
    pub const ANUTAU: Particle = Particle::preset("anutau", -16);
}

/// Neutrino parents.
pub mod parent {
    use super::Particle;

    /// mu+ (PDG -13).
    pub const MU_PLUS: Particle = Particle::preset("muplus", -13);
    /// mu- (PDG +13).
    pub const MU_MINUS: Particle = Particle::preset("muminus", 13);
    /// pi+.
    pub const PI_PLUS: Particle = Particle::preset("piplus", 211);
    /// pi-.
    pub const PI_MINUS: Particle = Particle::preset("piminus", -211);
    /// K+.
    pub const K_PLUS: Particle = Particle::preset("Kplus", 321);
    /// K-.
    pub const K_MINUS: Particle = Particle::preset("Kminus", -321);

    /// Muon, charge ignored.
    pub const MUON: Particle = Particle::preset("mu", 13);
    /// Charged pion, charge ignored.
    pub const PION: Particle = Particle::preset("pi", 211);
    /// Charged kaon, charge ignored.
    pub const KAON: Particle = Particle::preset("K", 321);
    /// K long.
    pub const K_LONG: Particle = Particle::preset("KL", 130);
}

/// All neutrino flavors; antineutrinos are omitted when `sign_sensitive` is false.
pub fn all_nu_flavors(sign_sensitive: bool) -> Vec<Particle> {
    let mut ret = Vec::with_capacity(6);
    for (particle, anti) in
        [(nu::NUE, nu::ANUE), (nu::NUMU, nu::ANUMU), (nu::NUTAU, nu::ANUTAU)]
    {
        ret.push(particle);
        if sign_sensitive {
            ret.push(anti);
        }
    }
    ret
}

/// All neutrino parents, either the signed family or the charge-folded one, plus K long.
pub fn all_parents(sign_sensitive: bool) -> Vec<Particle> {
    let mut ret = if sign_sensitive {
        vec![
            parent::MU_PLUS,
            parent::MU_MINUS,
            parent::PI_PLUS,
            parent::PI_MINUS,
            parent::K_PLUS,
            parent::K_MINUS,
        ]
    } else {
        vec![parent::MUON, parent::PION, parent::KAON]
    };
    ret.push(parent::K_LONG);
    ret
}

/// Which key to remove particles by.
#[derive(Debug, Clone, Copy)]
pub enum ParticleKey<'a> {
    /// Match on PDG code.
    Pdg(i32),
    /// Match on name.
    Name(&'a str),
    /// Match on name and PDG code.
    Exact(&'a Particle),
}

impl ParticleKey<'_> {
    /// Whether `p` matches this key.
    pub fn matches(&self, p: &Particle) -> bool {
        match *self {
            ParticleKey::Pdg(pdg) => p.pdg() == pdg,
            ParticleKey::Name(name) => p.name() == name,
            ParticleKey::Exact(other) => p == other,
        }
    }
}

/// Remove every particle matching `key`. Returns the number removed.
pub fn remove_matching(particles: &mut Vec<Particle>, key: ParticleKey<'_>) -> usize {
    let before = particles.len();
    particles.retain(|p| !key.matches(p));
    before - particles.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flavors_sign_sensitive() {
        let names: Vec<_> = all_nu_flavors(true).iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, ["nue", "anue", "numu", "anumu", "nutau", "anutau"]);

        let names: Vec<_> = all_nu_flavors(false).iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, ["nue", "numu", "nutau"]);
    }

    #[test]
    fn parents_end_with_k_long() {
        let signed = all_parents(true);
        assert_eq!(signed.len(), 7);
        assert_eq!(signed.last(), Some(&parent::K_LONG));

        let folded = all_parents(false);
        assert_eq!(folded.iter().map(Particle::pdg).collect::<Vec<_>>(), [13, 211, 321, 130]);
    }

    #[test]
    fn equality_needs_name_and_pdg() {
        assert_eq!(Particle::new("nue", 12), nu::NUE);
        assert_ne!(Particle::new("electron_nu", 12), nu::NUE);
        assert_ne!(Particle::new("nue", -12), nu::NUE);
    }

    #[test]
    fn remove_by_each_key() {
        let mut v = all_nu_flavors(true);
        assert_eq!(remove_matching(&mut v, ParticleKey::Pdg(16)), 1);
        assert_eq!(remove_matching(&mut v, ParticleKey::Name("anutau")), 1);
        assert_eq!(remove_matching(&mut v, ParticleKey::Exact(&Particle::new("nue", 14))), 0);
        assert_eq!(remove_matching(&mut v, ParticleKey::Exact(&nu::NUE)), 1);
        assert_eq!(v.len(), 3);
    }
}
