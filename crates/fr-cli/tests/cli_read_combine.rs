use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use approx::assert_relative_eq;
use fr_spectra::{NORMALIZATION, OutputDir};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fluxreader"))
}

fn repo_root() -> PathBuf {
    // crates/fr-cli -> repo root
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").canonicalize().unwrap()
}

fn fixture_path(name: &str) -> PathBuf {
    repo_root().join("tests/fixtures").join(name)
}

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("fluxreader_cli_{}_{}_{}", std::process::id(), nanos, name));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn read_fixture(out_file: &PathBuf) -> Output {
    let cfg = fixture_path("run.yaml");
    assert!(cfg.exists(), "missing fixture: {}", cfg.display());
    run(&[
        "read",
        "--config",
        cfg.to_string_lossy().as_ref(),
        "--output",
        out_file.to_string_lossy().as_ref(),
    ])
}

#[test]
fn read_writes_spectra_and_pot() {
    let dir = tmp_dir("read");
    let out_file = dir.join("out.json");
    let out = read_fixture(&out_file);
    assert!(out.status.success(), "read should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["files"], 2);
    assert_eq!(report["entries"], 6);
    assert_relative_eq!(report["pot"].as_f64().unwrap(), 1.0e6);

    let result = OutputDir::open(&out_file).unwrap();
    assert_relative_eq!(result.hist("TotalPOT").unwrap().bin_content_at(&[1]), 1.0e6);

    // rays are laid out FD then ND; both charged pions fold into "pi"
    let nd = result.get_hist("enu/ND/enu_numu_pi_NoXSec_ND").unwrap();
    assert_relative_eq!(nd.integral(), 1.25 * NORMALIZATION, epsilon = 1e-15);
    let fd = result.get_hist("enu/FD/enu_numu_pi_NoXSec_FD").unwrap();
    assert_relative_eq!(fd.integral(), 2.5 * NORMALIZATION, epsilon = 1e-15);

    // unweighted 2D spectra count rays
    let k = result.get_hist("enu_ppt/ND/enu_ppt_numu_K_NoXSec_ND").unwrap();
    assert_eq!(k.dim(), 2);
    assert_relative_eq!(k.bin_content.iter().sum::<f64>(), 1.0);

    assert!(result.get_hist("nd_fd/nd_fd_numu_pi_NoXSec_ND_FD").is_some());
    assert!(result.get_hist("nd_fd/nd_fd_allnu_allpar_NoXSec_ND_FD").is_some());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn combine_adds_sums_once() {
    let dir = tmp_dir("combine");
    let out_file = dir.join("out.json");
    let out = read_fixture(&out_file);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let file = out_file.to_string_lossy().to_string();
    let out = run(&["combine", "--file", &file, "--what", "flavors"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let result = OutputDir::open(&out_file).unwrap();
    let allnu = result.get_hist("enu/ND/enu_allnu_pi_NoXSec_ND").unwrap();
    // numu and anumu from pions
    assert_relative_eq!(allnu.integral(), 2.25 * NORMALIZATION, epsilon = 1e-15);
    assert!(result.get_hist("enu/ND/enu_numu_allpar_NoXSec_ND").is_none());

    let out = run(&["combine", "--file", &file]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let once = OutputDir::open(&out_file).unwrap();
    let n = once.dir("enu").unwrap().dir("ND").unwrap().hists().count();

    let out = run(&["combine", "--file", &file, "--what", "all"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let twice = OutputDir::open(&out_file).unwrap();
    assert_eq!(twice.dir("enu").unwrap().dir("ND").unwrap().hists().count(), n);

    let total = twice.get_hist("enu/ND/enu_allnu_allpar_NoXSec_ND").unwrap();
    // pions 2.25, kaon 4, muon-decay nue 1
    assert_relative_eq!(total.integral(), 7.25 * NORMALIZATION, epsilon = 1e-15);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn read_rejects_empty_input() {
    let dir = tmp_dir("empty");
    std::fs::create_dir_all(&dir).unwrap();
    let cfg = dir.join("run.yaml");
    std::fs::write(
        &cfg,
        "input: \"nothing/*.json\"\noutput: out.json\nparams: {}\nspectra: []\n",
    )
    .unwrap();

    let out = run(&["read", "--config", cfg.to_string_lossy().as_ref()]);
    assert!(!out.status.success(), "read with no files should fail");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("no flux files"), "stderr={stderr}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn params_lists_histogram_names() {
    let out = run(&["params", "--detector", "ND"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["max_master"], 4 * 4 * 3);
    assert_eq!(report["names"][0], "nue_mu_NoXSec_ND");
    assert_eq!(report["detectors"][0], "ND");
}
