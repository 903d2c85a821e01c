//! Exit status and output of the `simet` binary

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn write_population(dir: &Path, rows: usize, offset: f32) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..rows {
        let values: Vec<u8> = (0..4)
            .flat_map(|j| (((i * 4 + j) as f32 * 0.91).sin() + offset).to_le_bytes())
            .collect();
        fs::write(dir.join(format!("{i:03}.bin")), values).unwrap();
    }
}

fn write_config(dir: &Path, fid_upper: f64) -> std::path::PathBuf {
    let path = dir.join("simet.yaml");
    let yaml = format!(
        r#"
seed: 5
real:  {{ path: real }}
synth: {{ path: synth }}
feature_extractor: {{ type: identity, dim: 4 }}
restraints:
  - {{ type: fid, lower_bound: 0.0, upper_bound: {fid_upper} }}
  - {{ type: precision_recall, lower_bound: [0.0, 0.0], upper_bound: [1.0, 1.0], k: 3 }}
"#
    );
    fs::write(&path, yaml).unwrap();
    path
}

fn simet(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_simet"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn setup(fid_upper: f64) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    write_population(&dir.path().join("real"), 40, 0.0);
    write_population(&dir.path().join("synth"), 40, 0.1);
    let config = write_config(dir.path(), fid_upper);
    (dir, config.to_string_lossy().into_owned())
}

#[test]
fn test_passing_run_exits_zero() {
    let (_dir, config) = setup(1000.0);
    let output = simet(&["run", "--config", &config]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("fid"));
    assert!(stdout.contains("precision_recall"));
    assert!(stdout.contains("2/2 restraints passed"));
}

#[test]
fn test_failing_bound_exits_one() {
    let (_dir, config) = setup(0.0);
    let output = simet(&["run", "--config", &config, "--execution", "sequential"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("FAIL"));
}

#[test]
fn test_json_report() {
    let (_dir, config) = setup(1000.0);
    let output = simet(&["run", "--config", &config, "--format", "json"]);

    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["passed"], serde_json::Value::Bool(true));
    assert_eq!(report["results"][0]["name"], "fid");
}

#[test]
fn test_log_dir_receives_run_log() {
    let (dir, config) = setup(1000.0);
    let logs = dir.path().join("logs");
    let output = simet(&["run", "--config", &config, "--log-dir", &logs.to_string_lossy()]);

    assert_eq!(output.status.code(), Some(0));
    let log = fs::read_to_string(logs.join("simet.log")).unwrap();
    assert!(!log.is_empty());
    assert!(log.contains("Starting simet"));
}

#[test]
fn test_log_dir_from_config_file() {
    let (dir, _) = setup(1000.0);
    let path = dir.path().join("with_logs.yaml");
    let yaml = fs::read_to_string(dir.path().join("simet.yaml")).unwrap();
    fs::write(&path, format!("log_dir: run_logs\n{yaml}")).unwrap();

    let output = simet(&["run", "--config", &path.to_string_lossy()]);

    assert_eq!(output.status.code(), Some(0));
    let log = fs::read_to_string(dir.path().join("run_logs/simet.log")).unwrap();
    assert!(log.contains("Configuration loaded"));
}

#[test]
fn test_validate_skips_extractor_weights() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("simet.yaml");
    let yaml = r#"
real:  { path: real }
synth: { path: synth }
feature_extractor:
  type: linear
  weights: { source: local, path: missing.safetensors }
restraints:
  - { type: roc_auc, lower_bound: 0.4, upper_bound: 0.6 }
"#;
    fs::write(&path, yaml).unwrap();

    let output = simet(&["validate", "--config", &path.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("- roc_auc [0.4, 0.6] (lower is better)"));
}

#[test]
fn test_missing_config_exits_two() {
    let output = simet(&["run", "--config", "/no/such/simet.yaml"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read config file"));
}

#[test]
fn test_missing_data_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), 1000.0);
    let output = simet(&["run", "--config", &config.to_string_lossy()]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("load"));
}

#[test]
fn test_validate_lists_restraints() {
    let (_dir, config) = setup(30.0);
    let output = simet(&["validate", "--config", &config]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("- fid [0, 30] (lower is better)"));
    assert!(stdout.contains("- precision_recall [[0, 0], [1, 1]] (higher is better)"));
}
