//! CLI integration tests for mediasearch-cli.
//!
//! These tests run the actual binary against generated images and check
//! outputs and exit codes.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the mediasearch binary.
fn mediasearch() -> Command {
    Command::cargo_bin("mediasearch").unwrap()
}

fn create_test_image(width: u32, height: u32) -> RgbImage {
    let mut img = ImageBuffer::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let r = ((x as f32 / width as f32) * 255.0) as u8;
        let g = ((y as f32 / height as f32) * 255.0) as u8;
        let b = (((x + y) as f32 / (width + height) as f32) * 200.0) as u8;
        let pattern = if (x / 20 + y / 20) % 2 == 0 { 30 } else { 0 };
        *pixel = Rgb([r.saturating_add(pattern), g, b]);
    }
    img
}

/// Writes `a.png`, its resized copy `b.png` and the inverted `c.png`.
fn media_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let original = DynamicImage::ImageRgb8(create_test_image(256, 256));
    original.save(dir.path().join("a.png")).unwrap();
    original
        .resize_exact(200, 200, image::imageops::FilterType::Lanczos3)
        .save(dir.path().join("b.png"))
        .unwrap();
    let mut inverted = original;
    inverted.invert();
    inverted.save(dir.path().join("c.png")).unwrap();
    dir
}

fn path(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_str().unwrap().to_string()
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    mediasearch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Perceptual fingerprints"))
        .stdout(predicate::str::contains("hash"))
        .stdout(predicate::str::contains("compare"));
}

#[test]
fn test_version_displays_version() {
    mediasearch()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mediasearch"));
}

#[test]
fn test_help_shows_exit_codes() {
    mediasearch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("66"));
}

#[test]
fn test_compare_help_shows_options() {
    mediasearch()
        .args(["compare", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dims"))
        .stdout(predicate::str::contains("--check"))
        .stdout(predicate::str::contains("--json"));
}

// ============================================================================
// Hash Tests
// ============================================================================

#[test]
fn test_hash_prints_every_method_and_dimension() {
    let dir = media_dir();
    mediasearch()
        .args(["hash", &path(&dir, "a.png")])
        .assert()
        .success()
        .stdout(predicate::str::contains("dhash/8"))
        .stdout(predicate::str::contains("dhash/16"))
        .stdout(predicate::str::contains("phash/8"))
        .stdout(predicate::str::contains("phash/16"));
}

#[test]
fn test_hash_json_with_custom_dims() {
    let dir = media_dir();
    let output = mediasearch()
        .args(["hash", "--json", "--dims", "8", &path(&dir, "a.png")])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = json["fingerprints"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    for entry in entries {
        assert_eq!(entry["dim"], 8);
        // 64 bits, 16 hex digits
        assert_eq!(entry["repr"].as_str().unwrap().len(), 16);
    }
}

#[test]
fn test_hash_resolves_relative_paths_and_file_urls() {
    let dir = media_dir();
    let relative = mediasearch()
        .current_dir(dir.path())
        .args(["hash", "--json", "a.png"])
        .output()
        .unwrap();
    let url = mediasearch()
        .args(["hash", "--json", &format!("file://{}", path(&dir, "a.png"))])
        .output()
        .unwrap();
    assert!(relative.status.success());
    assert!(url.status.success());

    let fingerprints = |out: &[u8]| -> serde_json::Value {
        serde_json::from_slice::<serde_json::Value>(out).unwrap()["fingerprints"].clone()
    };
    assert_eq!(fingerprints(&relative.stdout), fingerprints(&url.stdout));
}

// ============================================================================
// Compare Tests
// ============================================================================

#[test]
fn test_compare_resized_copy_is_alike() {
    let dir = media_dir();
    mediasearch()
        .args(["compare", "--check", &path(&dir, "a.png"), &path(&dir, "b.png")])
        .assert()
        .success()
        .stdout(predicate::str::contains("ALIKE"))
        .stdout(predicate::str::contains("NOT ALIKE").not());
}

#[test]
fn test_compare_inverted_image_is_not_alike() {
    let dir = media_dir();
    mediasearch()
        .args(["compare", &path(&dir, "a.png"), &path(&dir, "c.png")])
        .assert()
        .success()
        .stdout(predicate::str::contains("NOT ALIKE"));

    // Exit code 3 = NOT_ALIKE
    mediasearch()
        .args(["compare", "--check", &path(&dir, "a.png"), &path(&dir, "c.png")])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("are not alike"));
}

#[test]
fn test_compare_json_reports_identical_images() {
    let dir = media_dir();
    let output = mediasearch()
        .args(["compare", "--json", &path(&dir, "a.png"), &path(&dir, "a.png")])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["alike"], true);
    let evals = json["evals"].as_array().unwrap();
    assert_eq!(evals.len(), 4);
    assert!(evals.iter().all(|e| e["diff"] == 0 && e["dist"] == 0.0));
}

// ============================================================================
// Exit Code Tests
// ============================================================================

#[test]
fn test_missing_file_returns_input_error() {
    // Exit code 66 = EX_NOINPUT
    mediasearch()
        .args(["hash", "/nonexistent/missing.png"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to load"));
}

#[test]
fn test_undecodable_file_returns_hash_error() {
    let dir = TempDir::new().unwrap();
    let junk = dir.path().join("junk.png");
    fs::write(&junk, b"not an image").unwrap();

    // Exit code 65 = EX_DATAERR
    mediasearch()
        .args(["hash", junk.to_str().unwrap()])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Failed to fingerprint"));
}

#[test]
fn test_unsupported_scheme_returns_usage_error() {
    mediasearch()
        .args(["hash", "ftp://example.com/a.png"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("unsupported url scheme"));
}

#[test]
fn test_dimension_below_two_is_rejected() {
    mediasearch()
        .args(["hash", "--dims", "1", "a.png"])
        .assert()
        .code(2);
}

#[test]
fn test_compare_missing_second_file() {
    let dir = media_dir();
    let missing = Path::new("/nonexistent/other.png");
    mediasearch()
        .args(["compare", &path(&dir, "a.png"), missing.to_str().unwrap()])
        .assert()
        .code(66);
}
