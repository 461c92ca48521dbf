//! Detector description: name, target nucleus, placement and ray reuse count.

use std::cmp::Ordering;
use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

fn default_uses() -> u32 {
    1
}

/// A detector that neutrino rays are pointed toward.
///
/// Detectors are ordered (and compared) by name only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detector {
    name: String,
    /// Target nucleus used for cross-section lookups (e.g. `"C"`, `"CH2"`).
    #[serde(default)]
    target: String,
    /// Detector center in detector coordinates (cm).
    #[serde(default = "Vector3::zeros")]
    position: Vector3<f64>,
    /// Full extent along each axis (cm).
    #[serde(default = "Vector3::zeros")]
    size: Vector3<f64>,
    /// Number of times each decay is smeared through this detector.
    #[serde(default = "default_uses")]
    uses: u32,
}

impl Detector {
    /// Create a detector. `uses` below 1 is raised to 1.
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        position: Vector3<f64>,
        size: Vector3<f64>,
        uses: u32,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            position,
            size,
            uses: uses.max(1),
        }
    }

    /// Placeholder detector with no geometry, used when only the name matters.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self::new(name, "", Vector3::zeros(), Vector3::zeros(), 1)
    }

    /// Detector name; also the output directory name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target nucleus.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Detector center (cm).
    pub fn position(&self) -> &Vector3<f64> {
        &self.position
    }

    /// Full detector size (cm).
    pub fn size(&self) -> &Vector3<f64> {
        &self.size
    }

    /// Half of the detector size along each axis.
    pub fn half_size(&self) -> Vector3<f64> {
        self.size / 2.0
    }

    /// Number of rays per decay for this detector.
    pub fn uses(&self) -> u32 {
        self.uses
    }

    /// Set the number of rays per decay. Values below 1 are raised to 1.
    pub fn set_uses(&mut self, uses: u32) {
        self.uses = uses.max(1);
    }
}

impl PartialEq for Detector {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Detector {}

impl PartialOrd for Detector {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Detector {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.position;
        let s = &self.size;
        write!(
            f,
            "{} [target={}, position=({}, {}, {}) cm, size=({}, {}, {}) cm, uses={}]",
            self.name, self.target, p.x, p.y, p.z, s.x, s.y, s.z, self.uses
        )
    }
}
