//! # fr-core
//!
//! Core types for FluxReader: the particle catalog, detectors, the
//! [`Parameters`] set that histograms are split by, and the mixed-radix
//! [`Indices`] that map a (flavor, parent, cross section, detector)
//! combination to a single "master" index.
//!
//! ```
//! use fr_core::{Detector, Parameters};
//! use nalgebra::Vector3;
//!
//! let mut params = Parameters::new(true);
//! params.add_detector(Detector::new("ND", "CH2", Vector3::zeros(), Vector3::new(2.0, 2.0, 5.0), 1));
//! assert_eq!(params.max_master(), 4 * 7 * 3);
//! assert_eq!(params.name_tag(0).as_deref(), Some("nue_muplus_NoXSec_ND"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod detector;
pub mod error;
pub mod indices;
pub mod interaction;
pub mod parameters;
pub mod particle;

pub use detector::Detector;
pub use error::{Error, Result};
pub use indices::{Indices, Radix, RadixIter};
pub use interaction::{GENIE_INTERACTIONS, GenieInteractions, InteractionRegistry, LabelList, NO_XSEC};
pub use parameters::{AncestorMode, ParamCursor, Parameters};
pub use particle::{Particle, ParticleKey, all_nu_flavors, all_parents};
