use std::path::PathBuf;

use swagd_core::inventory::{InventoryScope, VersionField};
use swagd_core::manifest::{EnvMode, MatchRule, PrereqManifest};
use swagd_core::version::VersionValue;

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

#[test]
fn parse_real_prereq_manifest_json() {
    let manifest_path = repo_root().join("prereq-manifest.json");
    let bytes = std::fs::read(&manifest_path)
        .unwrap_or_else(|e| panic!("read {} failed: {e}", manifest_path.display()));
    let manifest: PrereqManifest = serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("parse {} failed: {e}", manifest_path.display()));

    manifest.validate().expect("prereq-manifest.json should validate");
    assert!(!manifest.product_name.trim().is_empty());
    assert_eq!(manifest.inventory.version_field, VersionField::Packed);
    assert_eq!(manifest.inventory.scopes, vec![InventoryScope::Machine64]);

    let ids: Vec<_> = manifest.requirements.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["gdal", "gdal-mrsid", "java8"], "declaration order drives prompting");

    let mrsid = &manifest.requirements[1];
    assert_eq!(mrsid.match_rule, MatchRule::Regex);
    assert_eq!(mrsid.min_version, VersionValue::Packed(16777216));

    let gdal = &manifest.requirements[0];
    let alt = gdal.alternate.as_ref().expect("gdal should carry a 32-bit alternate");
    assert_eq!(alt.scopes, vec![InventoryScope::Machine32]);

    assert!(manifest
        .environment
        .iter()
        .any(|e| e.variable == "GDAL_DATA" && e.mode == EnvMode::SetIfAbsent));
    assert_eq!(
        manifest
            .environment
            .iter()
            .filter(|e| e.mode == EnvMode::AppendToPathIfMissing)
            .count(),
        2
    );
}
