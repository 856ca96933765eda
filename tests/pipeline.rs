//! End-to-end runs of the `transfer` binary and the library pipeline on CSV files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use cmj_transfer::app::pipeline::{run_batch, run_projection};
use cmj_transfer::domain::{AnalysisConfig, BootstrapOptions, Level, ProjectionRequest};
use cmj_transfer::error::AppError;

const HEADER: &str = "athlete_uid,playing_level,jump_height_(imp-mom)_[cm]_mean_cmj,bat_speed_mph";
const JITTER: [f64; 10] = [1.8, -2.1, 0.4, 3.0, -0.7, -2.6, 1.1, 0.0, -1.5, 2.2];

fn transfer(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_transfer"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to spawn transfer")
}

/// 25 athletes per level around a level-specific line, plus a few bad rows.
fn sample_csv() -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    let levels = [
        ("High School", 25.0, 0.7, 42.0),
        ("College", 30.0, 0.6, 50.0),
        ("Pro", 35.0, 0.5, 58.0),
    ];
    for (li, (label, cmj0, slope, intercept)) in levels.iter().enumerate() {
        for i in 0..25 {
            let cmj = cmj0 + 0.5 * i as f64;
            let bat = slope * cmj + intercept + JITTER[(i + li) % JITTER.len()];
            out.push_str(&format!("{label}-{i},{label},{cmj:.2},{bat:.2}\n"));
        }
    }
    out.push_str("slow,College,33.0,31.5\n");
    out.push_str("nojump,College,,70.0\n");
    out.push_str("indy,Independent,33.0,70.0\n");
    out
}

fn write_input(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("input.csv");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn report_writes_all_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &sample_csv());
    let out_dir = dir.path().join("reports");
    let json = dir.path().join("run.json");

    let out = transfer(&[
        "--input",
        input.to_str().unwrap(),
        "--id-col",
        "athlete_uid",
        "--out-dir",
        out_dir.to_str().unwrap(),
        "--export-json",
        json.to_str().unwrap(),
        "--top",
        "3",
    ]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    // Logs go to a pipe here, so they carry no colour codes.
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("skipped row"), "{stderr}");
    assert!(!stderr.contains('\u{1b}'), "{stderr}");

    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("Level models:"));
    assert!(stdout.contains("Bat speed column: bat_speed_mph\n"));
    assert!(stdout.contains("College: top over-performers"));
    assert!(stdout.contains("Plot: cmj="));
    assert!(stdout.contains("- All levels "), "{stdout}");
    assert!(stdout.contains("n=75 "), "{stdout}");

    let html = fs::read_to_string(out_dir.join("transfer_report.html")).unwrap();
    assert!(html.contains("<h3>High School</h3>"));
    assert!(html.contains("<h3>Professional</h3>"));
    assert!(html.contains("<h2>All levels pooled</h2>"));

    let counts = fs::read_to_string(out_dir.join("filter_counts.csv")).unwrap();
    assert!(counts.contains("College,27,1,1,0,25"), "{counts}");

    for slug in ["high_school", "college", "professional"] {
        let csv = fs::read_to_string(out_dir.join(format!("residuals_{slug}.csv"))).unwrap();
        assert_eq!(csv.lines().count(), 26, "{slug}");
    }

    let run: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(run["rows_skipped"], 1);
    assert_eq!(run["levels"].as_array().unwrap().len(), 3);
    assert_eq!(run["levels"][1]["rankings"]["over"].as_array().unwrap().len(), 3);
    assert_eq!(run["pooled"]["level"], "all");
    assert_eq!(run["pooled"]["n_samples"], 75);

    let leftovers: Vec<_> = fs::read_dir(&out_dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn no_files_prints_only() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &sample_csv());
    let out_dir = dir.path().join("reports");

    let out = transfer(&[
        "report",
        "--input",
        input.to_str().unwrap(),
        "--out-dir",
        out_dir.to_str().unwrap(),
        "--no-files",
        "--no-plot",
    ]);
    assert!(out.status.success());
    assert!(!String::from_utf8(out.stdout).unwrap().contains("Plot: cmj="));
    assert!(!out_dir.exists());
}

#[test]
fn seeded_projection_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &sample_csv());
    let a = dir.path().join("a.json");
    let b = dir.path().join("b.json");

    for path in [&a, &b] {
        let out = transfer(&[
            "--input",
            input.to_str().unwrap(),
            "--level",
            "college",
            "--athlete_cmj",
            "36",
            "--seed",
            "42",
            "--bootstrap",
            "400",
            "--export-json",
            path.to_str().unwrap(),
        ]);
        assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
        let stdout = String::from_utf8(out.stdout).unwrap();
        assert!(stdout.contains("=== Projection: College ==="));
        assert!(stdout.contains("95% CI: ["));
    }

    assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
    let run: serde_json::Value = serde_json::from_str(&fs::read_to_string(&a).unwrap()).unwrap();
    assert_eq!(run["projection"]["bootstrap_samples"], 400);
    assert_eq!(run["projection"]["extrapolated"], false);
}

#[test]
fn projection_defaults_to_all_levels_pooled() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &sample_csv());
    let json = dir.path().join("all.json");

    let out = transfer(&[
        "--input",
        input.to_str().unwrap(),
        "--athlete_cmj",
        "36",
        "--seed",
        "7",
        "--bootstrap",
        "300",
        "--export-json",
        json.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8(out.stdout).unwrap().contains("=== Projection: All levels ==="));

    let run: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(run["projection"]["level"], "all");
    assert_eq!(run["model"]["n_samples"], 75);
    assert_eq!(run["counts"]["rows_retained"], 75);
}

#[test]
fn failed_write_leaves_no_partial_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &sample_csv());
    let out_dir = dir.path().join("reports");
    let json = dir.path().join("run.json");
    // A directory where the last residuals file should go makes its rename fail.
    fs::create_dir_all(out_dir.join("residuals_professional.csv")).unwrap();

    let out = transfer(&[
        "--input",
        input.to_str().unwrap(),
        "--out-dir",
        out_dir.to_str().unwrap(),
        "--export-json",
        json.to_str().unwrap(),
        "--no-plot",
    ]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8(out.stderr).unwrap().contains("Output error"));

    let mut names: Vec<String> = fs::read_dir(&out_dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["residuals_professional.csv"]);
    assert!(out_dir.join("residuals_professional.csv").is_dir());
    assert!(!json.exists());
}

#[test]
fn metrics_command_writes_force_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("jump.csv");
    let mut csv = String::from("time_s,force_n\n");
    for i in 0..600 {
        let t = i as f64 / 1000.0;
        let force = if i < 300 { 820.0 } else { 820.0 + 4.0 * (i - 300) as f64 };
        csv.push_str(&format!("{t:.3},{force:.1}\n"));
    }
    fs::write(&input, csv).unwrap();
    let out_dir = dir.path().join("reports");
    let json = dir.path().join("metrics.json");

    let out = transfer(&[
        "--input",
        input.to_str().unwrap(),
        "--athlete",
        "Jo Doe",
        "--sampling_rate",
        "1000",
        "--out_dir",
        out_dir.to_str().unwrap(),
        "--export-json",
        json.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("=== CMJ Metrics ==="));
    assert!(stdout.contains("Peak Force (N)"));

    let html = fs::read_to_string(out_dir.join("Jo_Doe_report.html")).unwrap();
    assert!(html.contains("<title>Jo Doe CMJ Report</title>"));
    assert!(html.contains("<svg"));

    let run: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(run["samples"], 600);
    assert_eq!(run["metrics"]["peak_force_n"], 2016.0);
    assert_eq!(run["metrics"]["bw_n"], 820.0);
}

#[test]
fn metrics_command_rejects_bad_trace() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("jump.csv");
    fs::write(&input, "time_s,force_n\n0.000,800\n0.001,oops\n").unwrap();
    let out_dir = dir.path().join("reports");

    let out = transfer(&[
        "metrics",
        "--input",
        input.to_str().unwrap(),
        "--sampling-rate",
        "1000",
        "--out-dir",
        out_dir.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8(out.stderr).unwrap().contains("line 3"));
    assert!(!out_dir.exists());
}

#[test]
fn unknown_level_exits_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &sample_csv());
    let out = transfer(&[
        "project",
        "--input",
        input.to_str().unwrap(),
        "--level",
        "Minors",
        "--athlete-cmj",
        "36",
    ]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("Unknown level 'Minors'"), "{stderr}");
    assert!(stderr.contains("High School, College, Professional"), "{stderr}");
}

#[test]
fn missing_column_exits_with_code_2_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "playing_level,bat_speed_mph\nCollege,70\n");
    let out_dir = dir.path().join("reports");
    let out = transfer(&["--input", input.to_str().unwrap(), "--out-dir", out_dir.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8(out.stderr).unwrap().contains("jump_height_(imp-mom)_[cm]_mean_cmj"));
    assert!(!out_dir.exists());
}

#[test]
fn insufficient_and_degenerate_data_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("reports");

    let input = write_input(dir.path(), &format!("{HEADER}\na,College,30,70\n"));
    let out = transfer(&["--input", input.to_str().unwrap(), "--out-dir", out_dir.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(3));

    let input = write_input(dir.path(), &format!("{HEADER}\na,College,30,70\nb,College,30,72\nc,College,30,75\n"));
    let out = transfer(&["--input", input.to_str().unwrap(), "--out-dir", out_dir.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(4));
    assert!(!out_dir.exists());
}

#[test]
fn perfect_college_line_through_library() {
    let dir = tempfile::tempdir().unwrap();
    let mut csv = format!("{HEADER}\n");
    for c in 30..40 {
        csv.push_str(&format!("c{c},College,{c},{}\n", 2 * c + 20));
    }
    let input = write_input(dir.path(), &csv);
    let config = AnalysisConfig::new(&input);

    let run = run_batch(&config).unwrap();
    let college = run.level(Level::College).unwrap();
    assert!((college.model.slope - 2.0).abs() < 1e-9);
    assert!((college.model.intercept - 20.0).abs() < 1e-9);
    assert!((college.model.r - 1.0).abs() < 1e-9);
    assert!(college.analysis.records.iter().all(|r| r.residual.abs() < 1e-9));

    let request = |cmj: f64| ProjectionRequest {
        level: "College".to_string(),
        athlete_cmj: cmj,
        bootstrap: BootstrapOptions {
            seed: Some(1),
            iterations: 100,
            ..BootstrapOptions::default()
        },
    };
    assert!(!run_projection(&config, &request(39.0)).unwrap().projection.extrapolated);
    assert!(run_projection(&config, &request(49.0)).unwrap().projection.extrapolated);

    let err = run_projection(&config, &ProjectionRequest { level: "Pro".to_string(), ..request(35.0) }).unwrap_err();
    assert!(matches!(err, AppError::UnknownLevel { .. }));
}
