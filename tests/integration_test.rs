use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn cargo_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_allotment-pdf"))
}

fn output_dir(name: &str) -> PathBuf {
    Path::new("tests/output").join(name)
}

fn setup(name: &str) -> PathBuf {
    let dir = output_dir(name);
    if dir.exists() {
        fs::remove_dir_all(&dir).ok();
    }
    fs::create_dir_all(&dir).expect("Failed to create output directory");
    dir
}

fn page_count(path: &Path) -> usize {
    lopdf::Document::load(path)
        .expect("Generated file is not a readable PDF")
        .get_pages()
        .len()
}

fn assert_pdf(path: &Path, pages: usize) {
    assert!(path.exists(), "PDF file was not created: {}", path.display());
    let metadata = fs::metadata(path).expect("Failed to get file metadata");
    assert!(metadata.len() > 1000, "PDF file is too small, likely empty or corrupt");
    assert_eq!(page_count(path), pages);
}

#[test]
fn test_costs_breakdown() {
    let output = cargo_bin()
        .args(["costs", "--area", "200"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("4,00,000.00"), "{stdout}");
    assert!(stdout.contains("4,60,000.00"), "{stdout}");
    assert!(stdout.contains("46,000.00"), "{stdout}");
}

#[test]
fn test_costs_at_ticket_rates() {
    let output = cargo_bin()
        .args(["costs", "--area", "200", "--bsp", "2200"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("4,40,000.00"), "{stdout}");
    assert!(stdout.contains("5,00,000.00"), "{stdout}");
    assert!(stdout.contains("50,000.00"), "{stdout}");
}

#[test]
fn test_letter_at_ticket_rates() {
    let dir = setup("letter-rates");

    let output = cargo_bin()
        .args([
            "letter",
            "--ticket-file", "tests/fixtures/finalized.json",
            "--bsp", "2200",
            "-d", "2025-03-05",
            "-o", dir.to_str().expect("utf-8 path"),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command failed: {:?}", output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("differs from the finalized total"), "{stderr}");
    assert_pdf(&dir.join("Allotment-Letter-Amit-Sharma.pdf"), 2);
}

#[test]
fn test_letter_from_ticket_file() {
    let dir = setup("letter");

    let output = cargo_bin()
        .args([
            "letter",
            "--ticket-file", "tests/fixtures/finalized.json",
            "-d", "2025-03-05",
            "-o", dir.to_str().expect("utf-8 path"),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert_pdf(&dir.join("Allotment-Letter-Amit-Sharma.pdf"), 2);
}

#[test]
fn test_receipt_from_ticket_file() {
    let dir = setup("receipt");

    let output = cargo_bin()
        .args([
            "receipt",
            "--ticket-file", "tests/fixtures/finalized.json",
            "-d", "2025-03-05",
            "-o", dir.to_str().expect("utf-8 path"),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert_pdf(&dir.join("Payment-Receipt-NN05032025A01.pdf"), 1);
}

#[test]
fn test_sign_produces_signed_agreement() {
    let dir = setup("sign");

    let output = cargo_bin()
        .args([
            "sign",
            "--ticket-file", "tests/fixtures/finalized.json",
            "--strokes", "tests/fixtures/strokes.json",
            "-d", "2025-03-05",
            "-o", dir.to_str().expect("utf-8 path"),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Signed pages: 1, 2, 3"), "{stdout}");
    assert_pdf(&dir.join("Agreement-1042.pdf"), 3);
}

#[test]
fn test_sign_refuses_already_signed_ticket() {
    let dir = setup("sign-twice");

    let output = cargo_bin()
        .args([
            "sign",
            "--ticket-file", "tests/fixtures/signed.json",
            "--strokes", "tests/fixtures/strokes.json",
            "-o", dir.to_str().expect("utf-8 path"),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Signing twice should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Cannot mark signed a ticket that is signed"), "{stderr}");
    assert!(!dir.join("Agreement-1042.pdf").exists());
}

#[test]
fn test_agreement_for_signed_ticket() {
    let dir = setup("agreement");

    let output = cargo_bin()
        .args([
            "agreement",
            "--ticket-file", "tests/fixtures/signed.json",
            "--strokes", "tests/fixtures/strokes.json",
            "-o", dir.to_str().expect("utf-8 path"),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert_pdf(&dir.join("Agreement-1042.pdf"), 3);
}

#[test]
fn test_allot_with_empty_unit_fails_before_any_request() {
    // Nothing listens on this port; validation must fail first.
    let output = cargo_bin()
        .args([
            "--api", "http://127.0.0.1:9",
            "allot", "1042",
            "--unit", "",
            "--gift", "Gold Coin",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Command should have failed for empty unit");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unit code is required"), "{stderr}");
}

#[test]
fn test_invalid_ticket_file() {
    let output = cargo_bin()
        .args([
            "letter",
            "--ticket-file", "nonexistent.json",
            "-o", "tests/output/should-not-exist",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Command should have failed for missing ticket file");
}

#[test]
fn test_invalid_date_format() {
    let output = cargo_bin()
        .args([
            "receipt",
            "--ticket-file", "tests/fixtures/finalized.json",
            "-d", "not-a-date",
            "-o", "tests/output/should-not-exist",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Command should have failed for invalid date");
    assert!(!Path::new("tests/output/should-not-exist").exists());
}
