//! `fluxreader read` run configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fr_core::{Detector, Parameters};
use fr_spectra::{AxisSpec, FluxReader, TableXSecProvider, Var, Weight, bins};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Input flux files; wildcards allowed in the file name.
    pub input: String,
    /// Output result file (JSON).
    pub output: PathBuf,

    /// Read at most this many files (0 = all).
    #[serde(default)]
    pub num_files: usize,
    /// Skip this many files first.
    #[serde(default)]
    pub skip_files: usize,

    /// Entry list key, if not `dk2nuTree`.
    #[serde(default)]
    pub tree: Option<String>,
    /// POT location, if not `dkmetaTree/pots`.
    #[serde(default)]
    pub pot: Option<PotPath>,
    /// Standard branch -> field name in the input.
    #[serde(default)]
    pub branches: BTreeMap<String, String>,

    /// Cross-section table (JSON). Without it only `NoXSec` is usable.
    #[serde(default)]
    pub xsec_table: Option<PathBuf>,

    /// Named parameter sets.
    pub params: BTreeMap<String, ParamsConfig>,
    /// Spectra, filled in this order.
    pub spectra: Vec<SpectraConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PotPath {
    pub meta: String,
    pub key: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ancestor {
    #[default]
    Parent,
    TargetExit,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamsConfig {
    #[serde(default)]
    pub sign_sensitive: bool,
    /// Keep the tau flavors, which are dropped by default.
    #[serde(default)]
    pub keep_nu_taus: bool,
    #[serde(default)]
    pub remove_nu_flavs: Vec<String>,
    #[serde(default)]
    pub remove_parents: Vec<String>,
    #[serde(default)]
    pub add_xsecs: Vec<String>,
    #[serde(default)]
    pub remove_xsecs: Vec<String>,
    #[serde(default)]
    pub ancestor: Ancestor,
    #[serde(default)]
    pub detectors: Vec<Detector>,
}

impl ParamsConfig {
    pub fn build(&self) -> Parameters {
        let mut p = Parameters::new(self.sign_sensitive);
        if self.keep_nu_taus {
            p.reset_nu_flavs();
        }
        for name in &self.remove_nu_flavs {
            p.remove_nu_flav_name(name);
        }
        for name in &self.remove_parents {
            p.remove_parent_name(name);
        }
        for label in &self.add_xsecs {
            p.add_xsec(label);
        }
        for label in &self.remove_xsecs {
            p.remove_xsec(label);
        }
        if self.ancestor == Ancestor::TargetExit {
            p.set_ancestor_tgt();
        }
        for det in &self.detectors {
            p.add_detector(det.clone());
        }
        p
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectraKind {
    #[serde(rename = "1d")]
    OneD,
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    ThreeD,
    Corr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BinsConfig {
    pub n: usize,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisConfig {
    pub label: String,
    /// Preset variable name (`energy`, `parent_pt`, ...).
    pub var: String,
    #[serde(default)]
    pub bins: Option<BinsConfig>,
    #[serde(default)]
    pub edges: Option<Vec<f64>>,
}

impl AxisConfig {
    fn build(&self) -> Result<AxisSpec> {
        let edges = match (&self.bins, &self.edges) {
            (Some(b), None) => {
                if b.n == 0 || b.min >= b.max {
                    bail!("axis '{}': need n > 0 and min < max", self.label);
                }
                bins(b.n, b.min, b.max)
            }
            (None, Some(e)) => {
                if e.len() < 2 || e.windows(2).any(|w| w[0] >= w[1]) {
                    bail!("axis '{}': edges must be increasing, at least two", self.label);
                }
                e.clone()
            }
            _ => bail!("axis '{}': give exactly one of `bins` or `edges`", self.label),
        };
        let var = Var::preset(&self.var)
            .with_context(|| format!("axis '{}': unknown variable '{}'", self.label, self.var))?;
        Ok(AxisSpec::new(self.label.clone(), edges, var))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpectraConfig {
    pub kind: SpectraKind,
    pub title: String,
    /// Name of the parameter set.
    pub params: String,
    pub axes: Vec<AxisConfig>,
    /// Weight preset (`default`, `none`, `ext_pt_pz`).
    #[serde(default = "default_weight")]
    pub weight: String,
    /// Histogram file and path for `ext_pt_pz`.
    #[serde(default)]
    pub ext_weights: Option<ExtWeights>,
    #[serde(default)]
    pub det_x: Option<String>,
    #[serde(default)]
    pub det_y: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtWeights {
    pub file: PathBuf,
    /// Slash-separated histogram path inside the file.
    pub hist: String,
}

fn default_weight() -> String {
    "default".to_string()
}

pub fn read_run_config(path: &Path) -> Result<RunConfig> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let cfg: RunConfig = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        serde_yaml_ng::from_slice(&bytes)
            .with_context(|| format!("failed to parse run config {}", path.display()))?
    };
    Ok(cfg)
}

impl RunConfig {
    /// Resolve relative paths against `base`.
    pub fn rebase(&mut self, base: &Path) {
        let join = |p: &Path| if p.is_relative() { base.join(p) } else { p.to_path_buf() };
        if Path::new(&self.input).is_relative() {
            self.input = base.join(&self.input).to_string_lossy().into_owned();
        }
        self.output = join(&self.output);
        self.xsec_table = self.xsec_table.as_deref().map(join);
        for s in &mut self.spectra {
            if let Some(ext) = &mut s.ext_weights {
                ext.file = join(&ext.file);
            }
        }
    }

    /// A reader with every Spectra registered and the input layout applied.
    pub fn build_reader(&self) -> Result<FluxReader> {
        let mut reader = FluxReader::new(&self.input, self.num_files, self.skip_files)
            .with_context(|| format!("no usable input for '{}'", self.input))?;

        if let Some(table) = &self.xsec_table {
            let provider = TableXSecProvider::open(table)
                .with_context(|| format!("failed to load cross sections from {}", table.display()))?;
            tracing::info!("loaded {} cross-section curves", provider.len());
            reader.set_xsec_provider(Box::new(provider));
        }

        let params: BTreeMap<&str, Parameters> =
            self.params.iter().map(|(k, v)| (k.as_str(), v.build())).collect();
        for s in &self.spectra {
            let p = params
                .get(s.params.as_str())
                .with_context(|| format!("spectra '{}': unknown parameter set '{}'", s.title, s.params))?;
            add_spectra(&mut reader, p, s).with_context(|| format!("spectra '{}'", s.title))?;
        }

        if let Some(tree) = &self.tree {
            reader.override_tree_name(tree);
        }
        if let Some(pot) = &self.pot {
            reader.override_pot_path(&pot.meta, &pot.key);
        }
        for (standard, renamed) in &self.branches {
            reader.override_default_var_name(standard, renamed);
        }
        Ok(reader)
    }
}

fn add_spectra(reader: &mut FluxReader, params: &Parameters, s: &SpectraConfig) -> Result<()> {
    let weight = Weight::preset(&s.weight).with_context(|| format!("unknown weight '{}'", s.weight))?;
    let ext = match &s.ext_weights {
        Some(e) => {
            let file = fr_spectra::OutputDir::open(&e.file)
                .with_context(|| format!("failed to open {}", e.file.display()))?;
            let h = file
                .get_hist(&e.hist)
                .with_context(|| format!("no histogram '{}' in {}", e.hist, e.file.display()))?;
            Some(h.clone())
        }
        None => None,
    };
    let expected = match s.kind {
        SpectraKind::OneD | SpectraKind::Corr => 1,
        SpectraKind::TwoD => 2,
        SpectraKind::ThreeD => 3,
    };
    if s.axes.len() != expected {
        bail!("{:?} spectra need {expected} axes, got {}", s.kind, s.axes.len());
    }
    let mut axes = s.axes.iter().map(AxisConfig::build).collect::<Result<Vec<_>>>()?.into_iter();
    let mut next = || axes.next().context("missing axis");

    match s.kind {
        SpectraKind::OneD => reader.add_spectra_nd(params, &s.title, [next()?], weight, ext)?,
        SpectraKind::TwoD => {
            reader.add_spectra_nd(params, &s.title, [next()?, next()?], weight, ext)?
        }
        SpectraKind::ThreeD => {
            reader.add_spectra_nd(params, &s.title, [next()?, next()?, next()?], weight, ext)?
        }
        SpectraKind::Corr => {
            let (Some(x), Some(y)) = (&s.det_x, &s.det_y) else {
                bail!("correlated spectra need `det_x` and `det_y`");
            };
            for d in [x, y] {
                if params.det_index(d).is_none() {
                    bail!("detector '{d}' is not in parameter set '{}'", s.params);
                }
            }
            reader.add_spectra_corr(params, &s.title, x, y, next()?, weight, ext)?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN: &str = r#"
input: "flux/*.json"
output: out.json
num_files: 2
branches:
  decay.ntype: decay.nu_pdg
params:
  nd:
    remove_nu_flavs: [anue, anumu]
    remove_parents: [KL]
    detectors:
      - {name: ND, target: CH2, position: [0, 0, 57400], size: [200, 200, 500], uses: 3}
      - {name: FD, target: Ar}
spectra:
  - kind: 1d
    title: enu
    params: nd
    axes: [{label: "E (GeV)", var: energy, bins: {n: 20, min: 0, max: 10}}]
  - kind: corr
    title: corr
    params: nd
    det_x: ND
    det_y: FD
    axes: [{label: "E (GeV)", var: energy, edges: [0, 1, 2, 5]}]
"#;

    #[test]
    fn parses_run_config() {
        let cfg: RunConfig = serde_yaml_ng::from_str(RUN).unwrap();
        assert_eq!(cfg.num_files, 2);
        assert_eq!(cfg.spectra.len(), 2);
        assert_eq!(cfg.spectra[1].kind, SpectraKind::Corr);
        assert_eq!(cfg.spectra[0].weight, "default");

        let p = cfg.params["nd"].build();
        assert_eq!(p.n_flav(), 2);
        assert_eq!(p.n_par(), 3);
        assert_eq!(p.n_det(), 2);
        assert_eq!(p.detector(0).unwrap().uses(), 3);
        assert_eq!(p.detector(1).unwrap().uses(), 1);
    }

    #[test]
    fn rejects_smearing_seed() {
        let with_seed = format!("seed: 7\n{RUN}");
        let err = serde_yaml_ng::from_str::<RunConfig>(&with_seed).unwrap_err();
        assert!(err.to_string().contains("seed"), "{err}");
    }

    #[test]
    fn axis_needs_one_binning() {
        let both = AxisConfig {
            label: "x".into(),
            var: "energy".into(),
            bins: Some(BinsConfig { n: 2, min: 0.0, max: 1.0 }),
            edges: Some(vec![0.0, 1.0]),
        };
        assert!(both.build().is_err());

        let bad_var = AxisConfig { var: "nope".into(), edges: None, ..both.clone() };
        assert!(bad_var.build().is_err());

        let ok = AxisConfig { edges: None, ..both };
        assert_eq!(ok.build().unwrap().edges.len(), 3);
    }

    #[test]
    fn rebase_relative_paths() {
        let mut cfg: RunConfig = serde_yaml_ng::from_str(RUN).unwrap();
        cfg.rebase(Path::new("/data/run"));
        assert_eq!(cfg.input, "/data/run/flux/*.json");
        assert_eq!(cfg.output, PathBuf::from("/data/run/out.json"));
    }
}
