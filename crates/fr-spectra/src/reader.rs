//! The flux reader: loops over flux files and fills every registered Spectra.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use fr_core::{Detector, Error, Parameters, Result};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::event::FluxEvent;
use crate::hist::{Axis, Histogram, bins};
use crate::output::OutputDir;
use crate::source::{FluxFile, SourceLayout, expand_pattern};
use crate::spectra::{
    AxisSpec, DEFAULT_BRANCHES, RayOffsets, Spectra, SpectraCorrDet, SpectraND,
};
use crate::var::Weight;
use crate::xsec::{NoCurves, XSecProvider};

/// Angle between detector and beam coordinates, in degrees.
pub const BEAM_ANGLE_DEG: f64 = 3.323155;

/// Entries between progress messages.
pub const PROGRESS_EVERY: usize = 250_000;

/// Name of the root histogram holding the total protons on target.
pub const TOTAL_POT: &str = "TotalPOT";

/// Recomputes a ray for a point inside a detector.
pub trait RayReweighter {
    /// Energy and propagation weight of the entry's neutrino if it reached
    /// `point` (beam coordinates, cm).
    fn reweight(&self, event: &FluxEvent, point: &Vector3<f64>) -> (f64, f64);
}

/// Uniform random point inside the detector's box, in detector coordinates.
///
/// With `radius_sq`, x and y are redrawn until `x^2 + y^2 <= radius_sq`.
pub fn smear<R: Rng + ?Sized>(det: &Detector, rng: &mut R, radius_sq: Option<f64>) -> Vector3<f64> {
    let h = det.half_size().abs();
    let mut x = rng.random_range(-h.x..=h.x);
    let mut y = rng.random_range(-h.y..=h.y);
    let z = rng.random_range(-h.z..=h.z);
    if let Some(rr) = radius_sq.filter(|&rr| rr > 0.0) {
        while x * x + y * y > rr {
            x = rng.random_range(-h.x..=h.x);
            y = rng.random_range(-h.y..=h.y);
        }
    }
    Vector3::new(x, y, z)
}

/// Shift a point by the detector position and rotate it about x by
/// [`BEAM_ANGLE_DEG`].
pub fn to_beam_coords(det: &Detector, local: &Vector3<f64>) -> Vector3<f64> {
    let (sin, cos) = BEAM_ANGLE_DEG.to_radians().sin_cos();
    let pos = det.position();
    Vector3::new(
        local.x + pos.x,
        pos.y + local.y * cos + local.z * sin,
        pos.z + local.z * cos - local.y * sin,
    )
}

/// Totals of one [`FluxReader::read_flux`] run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunSummary {
    /// Files read.
    pub files: usize,
    /// Entries read.
    pub entries: usize,
    /// Protons on target summed over all files.
    pub pot: f64,
}

/// Reads flux files and fills Spectra from them.
pub struct FluxReader {
    files: Vec<PathBuf>,
    spectra: Vec<Box<dyn Spectra>>,
    layout: SourceLayout,
    provider: Box<dyn XSecProvider>,
    reweighter: Option<Box<dyn RayReweighter>>,
    rng: StdRng,
}

impl FluxReader {
    /// Select input files.
    ///
    /// `pattern` may contain wildcards in its final component. After sorting,
    /// the first `skip_files` are dropped and at most `num_files` kept
    /// (0 keeps all). Fails if no file remains.
    pub fn new(pattern: &str, num_files: usize, skip_files: usize) -> Result<Self> {
        let mut files = expand_pattern(pattern)?;

        if skip_files > files.len() {
            log::warn!(
                "asked to skip {skip_files} files but only {} match '{pattern}'",
                files.len()
            );
            files.clear();
        } else {
            files.drain(..skip_files);
        }
        if num_files > files.len() {
            log::info!("fewer files than the requested {num_files}; using all of them");
        } else if num_files != 0 {
            files.truncate(num_files);
        }

        log::info!("{} files match the input criteria", files.len());
        Self::from_files(files)
    }

    /// Read exactly `files`. Fails if the list is empty.
    pub fn from_files(files: Vec<PathBuf>) -> Result<Self> {
        if files.is_empty() {
            return Err(Error::Config("there are no flux files to run over".into()));
        }
        Ok(Self {
            files,
            spectra: Vec::new(),
            layout: SourceLayout::default(),
            provider: Box::new(NoCurves),
            reweighter: None,
            rng: StdRng::seed_from_u64(0),
        })
    }

    /// Input files, in reading order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Registered Spectra, in fill order.
    pub fn spectra(&self) -> &[Box<dyn Spectra>] {
        &self.spectra
    }

    /// Cross sections for Spectra added through the `add_spectra_*` helpers.
    pub fn set_xsec_provider(&mut self, provider: Box<dyn XSecProvider>) {
        self.provider = provider;
    }

    /// Recompute every ray per detector use before filling.
    pub fn set_reweighter(&mut self, reweighter: Box<dyn RayReweighter>) {
        self.reweighter = Some(reweighter);
    }

    /// Seed of the detector smearing.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Register a Spectra.
    ///
    /// A detector already named by an earlier Spectra keeps its earlier
    /// geometry and ray count; a conflicting count is reported.
    pub fn add_spectra(&mut self, spectra: Box<dyn Spectra>) {
        let known = self.detectors();
        for d in spectra.detectors() {
            if let Some(first) = known.get(d.name())
                && first.uses().max(1) != d.uses().max(1)
            {
                log::warn!(
                    "'{}' asks for {} rays in detector '{}', but {} are already laid out",
                    spectra.title(),
                    d.uses(),
                    d.name(),
                    first.uses().max(1)
                );
            }
        }
        log::debug!("added spectra '{}'", spectra.title());
        self.spectra.push(spectra);
    }

    /// Register an `N`-dimensional Spectra.
    pub fn add_spectra_nd<const N: usize>(
        &mut self,
        params: &Parameters,
        title: &str,
        axes: [AxisSpec; N],
        weight: Weight,
        ext_weights: Option<Histogram>,
    ) -> Result<()> {
        let s = SpectraND::<N>::new(params, title, axes, weight, ext_weights, self.provider.as_ref())?;
        self.add_spectra(Box::new(s));
        Ok(())
    }

    /// Register a correlated Spectra between `det_x` and `det_y`.
    ///
    /// # Panics
    ///
    /// Panics if either detector is missing from `params`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_spectra_corr(
        &mut self,
        params: &Parameters,
        title: &str,
        det_x: &str,
        det_y: &str,
        axis: AxisSpec,
        weight: Weight,
        ext_weights: Option<Histogram>,
    ) -> Result<()> {
        let s = SpectraCorrDet::new(
            params,
            title,
            det_x,
            det_y,
            axis,
            weight,
            ext_weights,
            self.provider.as_ref(),
        )?;
        self.add_spectra(Box::new(s));
        Ok(())
    }

    /// Read entries from `tree` instead of `dk2nuTree`.
    pub fn override_tree_name(&mut self, tree: &str) {
        self.layout.tree = tree.to_string();
    }

    /// Read POT from `pot` inside `meta` instead of `pots` inside `dkmetaTree`.
    pub fn override_pot_path(&mut self, meta: &str, pot: &str) {
        self.layout.meta = meta.to_string();
        self.layout.pot = pot.to_string();
    }

    /// Read the branch `standard` from the field `renamed` of the input.
    /// Only branches some Spectra reads can be renamed.
    pub fn override_default_var_name(&mut self, standard: &str, renamed: &str) {
        if !self.branches().contains(standard) {
            log::warn!("'{standard}' is not a branch any spectra reads; not renaming it");
            return;
        }
        self.layout.overrides.insert(standard.to_string(), renamed.to_string());
    }

    /// The input layout.
    pub fn layout(&self) -> &SourceLayout {
        &self.layout
    }

    /// Union of the branches every Spectra reads.
    pub fn branches(&self) -> BTreeSet<String> {
        let mut out: BTreeSet<String> = DEFAULT_BRANCHES.iter().map(|b| b.to_string()).collect();
        for s in &self.spectra {
            out.extend(s.branches().iter().cloned());
        }
        out
    }

    /// Union of the detectors of every Spectra, by name; the first Spectra
    /// naming a detector decides its geometry.
    pub fn detectors(&self) -> BTreeMap<String, Detector> {
        let mut out = BTreeMap::new();
        for s in &self.spectra {
            for d in s.detectors() {
                out.entry(d.name().to_string()).or_insert(d);
            }
        }
        out
    }

    /// Where each detector's rays sit in an entry.
    pub fn ray_offsets(&self) -> RayOffsets {
        RayOffsets::from_detectors(self.detectors().values())
    }

    fn reweight_rays(&mut self, event: &mut FluxEvent, dets: &[Detector], offsets: &RayOffsets) {
        let Some(rw) = self.reweighter.as_deref() else {
            return;
        };
        event.ensure_rays(offsets.total());
        for det in dets {
            let rays = offsets.rays(det.name());
            let single = rays.len() == 1;
            for i_ray in rays {
                let local = if single {
                    Vector3::zeros()
                } else {
                    smear(det, &mut self.rng, None)
                };
                let (energy, wgt) = rw.reweight(event, &to_beam_coords(det, &local));
                event.nuray[i_ray].energy = energy;
                event.nuray[i_ray].wgt = wgt;
            }
        }
    }

    /// Fill every Spectra from every entry of every file, then write the
    /// total POT and one directory per Spectra into `out`.
    pub fn read_flux(&mut self, out: &mut OutputDir) -> Result<RunSummary> {
        log::info!(
            "{} histogram types will be created: {}",
            self.spectra.len(),
            self.spectra.iter().map(|s| s.title()).collect::<Vec<_>>().join(", ")
        );

        let offsets = self.ray_offsets();
        let dets: Vec<Detector> = self.detectors().into_values().collect();
        log::debug!("active branches: {}", self.branches().into_iter().collect::<Vec<_>>().join(", "));
        if !self.layout.is_standard() {
            log::info!(
                "reading entries from '{}' and POT from '{}/{}'",
                self.layout.tree,
                self.layout.meta,
                self.layout.pot
            );
        }

        let mut summary = RunSummary::default();
        let files = self.files.clone();
        for (i_file, path) in files.iter().enumerate() {
            log::info!("moving to file {i_file}: {}", path.display());
            let file = FluxFile::open(path, &self.layout)?;
            summary.pot += file.pot;
            summary.files += 1;

            for (i_entry, mut event) in file.entries.into_iter().enumerate() {
                summary.entries += 1;
                if summary.entries % PROGRESS_EVERY == 0 {
                    log::info!("on entry {}", summary.entries);
                }
                self.reweight_rays(&mut event, &dets, &offsets);
                if event.nuray.len() < offsets.total() {
                    return Err(Error::Validation(format!(
                        "{}: entry {i_entry} has {} rays, the detector layout needs {}",
                        path.display(),
                        event.nuray.len(),
                        offsets.total()
                    )));
                }
                for s in &mut self.spectra {
                    s.fill(&event, &offsets);
                }
            }
        }

        log::info!("total POT: {:e}", summary.pot);
        log::info!("number of entries: {}", summary.entries);

        let mut pot = Histogram::new_1d(TOTAL_POT, "POT", Axis::new("", bins(1, 0.0, 1.0)));
        pot.set_bin_content_at(&[1], summary.pot);
        out.write_hist(pot);

        for s in &mut self.spectra {
            let dir = out.mkdir(s.title());
            s.write_hists(dir);
            dir.write_manifest(s.params());
        }
        Ok(summary)
    }
}

impl std::fmt::Debug for FluxReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluxReader")
            .field("files", &self.files)
            .field("spectra", &self.spectra.iter().map(|s| s.title()).collect::<Vec<_>>())
            .field("layout", &self.layout)
            .field("reweight", &self.reweighter.is_some())
            .finish()
    }
}
