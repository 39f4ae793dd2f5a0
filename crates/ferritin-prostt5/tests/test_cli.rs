use assert_cmd::Command;
use std::path::PathBuf;

fn cli() -> Command {
    Command::cargo_bin("ferritin-prostt5").unwrap()
}

#[test]
fn test_devices_lists_cpu() {
    let output = cli().arg("devices").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.lines().any(|line| line.starts_with("CPU")));
}

#[test]
fn test_predict_requires_sequences() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = cli();
    cmd.arg("predict").arg("--model").arg(dir.path());
    cmd.assert().failure();
}

#[test]
fn test_predict_requires_model() {
    let mut cmd = cli();
    cmd.arg("predict").arg("--sequence").arg("MKV");
    cmd.assert().failure();
}

#[test]
fn test_predict_missing_model_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = cli();
    cmd.arg("predict")
        .arg("--model")
        .arg(dir.path().join("absent"))
        .arg("--sequence")
        .arg("MKV");
    cmd.assert().failure();
}

#[test]
fn test_predict_missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = cli();
    cmd.arg("predict")
        .arg("--model")
        .arg(dir.path())
        .arg("--input")
        .arg(dir.path().join("absent.fasta"));
    cmd.assert().failure();
}

/// Needs converted ProstT5 weights: set PROSTT5_MODEL_DIR and run with
/// `cargo test -- --ignored`.
#[test]
#[ignore]
fn test_predict_real_model() {
    let model_dir = PathBuf::from(std::env::var("PROSTT5_MODEL_DIR").unwrap());
    let dir = tempfile::tempdir().unwrap();
    let fasta = dir.path().join("input.fasta");
    std::fs::write(&fasta, ">ubiquitin\nMQIFVKTLTGKTITLEVEPSDTIENVKAKIQDKEGIPPDQQRLIFAGKQLEDGRTLSDYNIQKESTLHLVLRLRGG\n").unwrap();

    let output = cli()
        .arg("predict")
        .arg("--model")
        .arg(&model_dir)
        .arg("--input")
        .arg(&fasta)
        .arg("--sequence")
        .arg("mkv")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], ">ubiquitin");
    assert_eq!(lines[1].len(), 76);
    assert_eq!(lines[2], ">sequence_1");
    assert_eq!(lines[3].len(), 3);
}
