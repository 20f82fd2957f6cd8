//! End-to-end CLI tests driving the built binary.

use std::fs;
use std::process::Command;

fn packarc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_packarc"))
}

#[test]
fn compress_decompress_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.txt");
    let body = b"compress me through the CLI, compress me through the CLI".repeat(50);
    fs::write(&input, &body).unwrap();

    let status = packarc()
        .args(["compress", input.to_str().unwrap()])
        .status()
        .unwrap();
    assert!(status.success());
    let packed = dir.path().join("sample.txt.lzma");
    assert!(packed.exists());
    assert!(fs::metadata(&packed).unwrap().len() < body.len() as u64);

    let restored = dir.path().join("restored.txt");
    let status = packarc()
        .args([
            "decompress",
            packed.to_str().unwrap(),
            "--output",
            restored.to_str().unwrap(),
        ])
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(fs::read(&restored).unwrap(), body);
}

#[test]
fn gzip_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("page.html");
    let body = b"<html><body>hello hello hello</body></html>".repeat(20);
    fs::write(&input, &body).unwrap();

    let status = packarc()
        .args(["compress", input.to_str().unwrap(), "--format", "gzip"])
        .status()
        .unwrap();
    assert!(status.success());

    let packed = dir.path().join("page.html.gz");
    let restored = dir.path().join("page.out");
    let status = packarc()
        .args([
            "decompress",
            packed.to_str().unwrap(),
            "--output",
            restored.to_str().unwrap(),
        ])
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(fs::read(&restored).unwrap(), body);
}

#[test]
fn tar_create_list_extract() {
    let dir = tempfile::tempdir().unwrap();
    let file_a = dir.path().join("a.txt");
    let file_b = dir.path().join("b.bin");
    fs::write(&file_a, b"alpha").unwrap();
    fs::write(&file_b, vec![9u8; 1000]).unwrap();

    let archive = dir.path().join("bundle.tar");
    let status = packarc()
        .args([
            "create",
            archive.to_str().unwrap(),
            file_a.to_str().unwrap(),
            file_b.to_str().unwrap(),
        ])
        .status()
        .unwrap();
    assert!(status.success());

    let output = packarc()
        .args(["list", archive.to_str().unwrap(), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let out_dir = tempfile::tempdir().unwrap();
    let status = packarc()
        .args([
            "extract",
            archive.to_str().unwrap(),
            "--dir",
            out_dir.path().to_str().unwrap(),
        ])
        .status()
        .unwrap();
    assert!(status.success());
}

#[test]
fn rejects_unknown_format() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("x");
    fs::write(&input, b"data").unwrap();
    let status = packarc()
        .args(["compress", input.to_str().unwrap(), "--format", "zip"])
        .status()
        .unwrap();
    assert!(!status.success());
}
