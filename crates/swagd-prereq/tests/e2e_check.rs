use std::path::{Path, PathBuf};
use std::process::Command;

use uuid::Uuid;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_file(path: &Path, content: &str) {
    std::fs::write(path, content)
        .unwrap_or_else(|e| panic!("write {} failed: {e}", path.display()));
}

const MANIFEST: &str = r#"
{
  "product_name": "TestSuite",
  "version": "0.0.0",
  "inventory": { "scopes": ["machine64"], "version_field": "packed" },
  "requirements": [
    {
      "id": "gdal",
      "display_name": "GDAL Core",
      "pattern": "gdal",
      "min_version": 16777216,
      "remediation": { "prompt_message": "GDAL missing", "download_url": "http://example.invalid/core.msi" }
    },
    {
      "id": "gdal-mrsid",
      "display_name": "GDAL MrSID",
      "pattern": "gdal.*mrsid",
      "min_version": 16777216,
      "remediation": { "prompt_message": "MrSID missing", "download_url": "http://example.invalid/mrsid.msi" }
    }
  ],
  "environment": []
}
"#;

const INVENTORY: &str = r#"
{
  "machine64": [
    { "name": "GDAL 111 (MSVC 2010 Win64)", "version": 17498113 },
    { "name": "Some Other Tool", "version": 1 },
    { "version": 5 }
  ]
}
"#;

#[test]
fn e2e_check_reports_each_requirement() {
    let dir = unique_temp_dir("swagd-prereq-check");
    let _cleanup = CleanupDir(dir.clone());

    let manifest_path = dir.join("prereq-manifest.json");
    let inventory_path = dir.join("inventory.json");
    write_file(&manifest_path, MANIFEST);
    write_file(&inventory_path, INVENTORY);

    let exe = env!("CARGO_BIN_EXE_swagd-prereq");
    let out = Command::new(exe)
        .arg("--manifest")
        .arg(&manifest_path)
        .arg("--inventory-snapshot")
        .arg(&inventory_path)
        .arg("check")
        .output()
        .expect("run swagd-prereq check");

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(
        out.status.code(),
        Some(1),
        "stdout={stdout}, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(stdout.contains("GDAL Core (gdal) = satisfied"), "stdout: {stdout}");
    assert!(stdout.contains("GDAL MrSID (gdal-mrsid) = missing"), "stdout: {stdout}");
}

#[test]
fn e2e_check_json_is_machine_readable() {
    let dir = unique_temp_dir("swagd-prereq-check-json");
    let _cleanup = CleanupDir(dir.clone());

    let manifest_path = dir.join("prereq-manifest.json");
    let inventory_path = dir.join("inventory.json");
    write_file(&manifest_path, MANIFEST);
    write_file(&inventory_path, INVENTORY);

    let exe = env!("CARGO_BIN_EXE_swagd-prereq");
    let out = Command::new(exe)
        .arg("--manifest")
        .arg(&manifest_path)
        .arg("--inventory-snapshot")
        .arg(&inventory_path)
        .arg("check")
        .arg("--json")
        .output()
        .expect("run swagd-prereq check --json");

    let doc: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout is json");
    assert_eq!(doc["satisfied"], false);
    assert_eq!(doc["result"]["satisfied"][0]["requirement_id"], "gdal");
    assert_eq!(doc["result"]["unsatisfied"][0]["requirement_id"], "gdal-mrsid");
    assert_eq!(doc["result"]["unsatisfied"][0]["prompt_message"], "MrSID missing");
}

#[test]
fn e2e_check_fails_on_invalid_manifest() {
    let dir = unique_temp_dir("swagd-prereq-check-invalid");
    let _cleanup = CleanupDir(dir.clone());

    let manifest_path = dir.join("prereq-manifest.json");
    write_file(
        &manifest_path,
        r#"{ "product_name": "x", "requirements": [
            { "id": "bad", "pattern": "(", "min_version": 1,
              "remediation": { "prompt_message": "m" } } ] }"#,
    );

    let exe = env!("CARGO_BIN_EXE_swagd-prereq");
    let out = Command::new(exe)
        .arg("--manifest")
        .arg(&manifest_path)
        .arg("check")
        .output()
        .expect("run swagd-prereq check");
    assert_eq!(out.status.code(), Some(2));
}

struct CleanupDir(PathBuf);

impl Drop for CleanupDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
