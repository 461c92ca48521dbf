//! # fr-spectra
//!
//! Weighted neutrino flux spectra built from decay records.
//!
//! A [`FluxReader`] loops over flux files and hands every entry to each
//! registered [`Spectra`]. A Spectra owns one histogram per
//! (flavor, parent, cross section, detector) combination of its
//! [`Parameters`](fr_core::Parameters) and fills it with the ray weight
//! `nimpwt * wgt * xsec(E) / (10000 pi)`. After the run, a [`Combiner`]
//! adds histograms summed over flavors, parents, or both.
//!
//! ```
//! use fr_core::{Detector, Particle, Parameters};
//! use fr_spectra::{AxisSpec, Spectra, Spectra1D, Var, Weight, bins};
//! use fr_spectra::xsec::NoCurves;
//!
//! let params = Parameters::from_parts(
//!     vec![Particle::new("numu", 14)],
//!     vec![Particle::new("pi", 211)],
//!     vec!["NoXSec".into()],
//!     vec![Detector::placeholder("ND")],
//!     false,
//! );
//! let axis = AxisSpec::new("E", bins(10, 0.0, 10.0), Var::preset("energy").unwrap());
//! let s = Spectra1D::new(&params, "enu", [axis], Weight::default(), None, &NoCurves).unwrap();
//! assert_eq!(s.n_hists(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod combine;
pub mod combiner;
pub mod event;
pub mod hist;
pub mod output;
pub mod reader;
pub mod source;
pub mod spectra;
pub mod var;
pub mod xsec;

pub use combiner::Combiner;
pub use event::{Ancestor, Decay, FluxEvent, NuRay, TargetExit};
pub use hist::{Axis, Histogram, bins};
pub use output::{Object, OutputDir};
pub use reader::{FluxReader, RayReweighter, RunSummary};
pub use source::{FluxFile, SourceLayout};
pub use spectra::{
    AxisSpec, NORMALIZATION, RayOffsets, Spectra, Spectra1D, Spectra2D, Spectra3D, SpectraBase,
    SpectraCorrDet, SpectraND,
};
pub use var::{Var, Weight};
pub use xsec::{CrossSection, TableXSecProvider, XSecProvider};
