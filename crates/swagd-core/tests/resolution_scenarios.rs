use anyhow::{anyhow, Result};
use swagd_core::env::{EnvError, EnvOutcome, EnvStore, MemoryEnvStore};
use swagd_core::flow::{self, BlockReason, FixedAnswer, FlowContext, FlowError, FlowOutcome, Launcher, PromptAnswer, Prompter};
use swagd_core::inventory::{InventoryScope, RawEntry, SnapshotSource};
use swagd_core::manifest::{EnvMode, EnvSpec, PrereqManifest};
use swagd_core::resolve::ResolutionPolicy;
use swagd_core::version::VersionValue;

fn manifest_display(requirements: &str) -> PrereqManifest {
    let json = format!(
        r#"{{
          "product_name": "SWAGD",
          "inventory": {{ "scopes": ["machine64"], "version_field": "display" }},
          "requirements": {requirements},
          "environment": [
            {{ "variable": "GDAL_DATA", "value": "{{ProgramFiles}}\\Swagd\\RGISuite\\lib\\data", "mode": "set_if_absent" }},
            {{ "variable": "PATH", "value": "{{ProgramFiles}}\\Swagd\\lib", "mode": "append_to_path_if_missing" }}
          ]
        }}"#
    );
    let m: PrereqManifest = serde_json::from_str(&json).expect("parse manifest");
    m.validate().expect("validate manifest");
    m
}

fn gdal_inventory() -> SnapshotSource {
    SnapshotSource::new().with_entry(
        InventoryScope::Machine64,
        RawEntry::new(
            "gdal 111 (msvc 2010 win64)",
            VersionValue::Dotted("1.11.1".to_string()),
        ),
    )
}

fn lookup(name: &str) -> Option<String> {
    (name == "ProgramFiles").then(|| r"C:\Program Files".to_string())
}

#[derive(Default)]
struct RecordingPrompter {
    answer: Option<PromptAnswer>,
    messages: Vec<String>,
}

impl Prompter for RecordingPrompter {
    fn confirm(&mut self, _title: &str, message: &str) -> Result<PromptAnswer> {
        self.messages.push(message.to_string());
        self.answer.ok_or_else(|| anyhow!("no answer configured"))
    }
}

#[derive(Default)]
struct RecordingLauncher {
    launched: Vec<String>,
}

impl Launcher for RecordingLauncher {
    fn launch(&mut self, download_url: &str) -> Result<()> {
        self.launched.push(download_url.to_string());
        Ok(())
    }
}

#[test]
fn gdal_regex_is_satisfied_by_versioned_record() {
    let m = manifest_display(
        r#"[{ "id": "gdal", "pattern": "gdal", "min_version": "1.0.0",
              "remediation": { "prompt_message": "install gdal" } }]"#,
    );
    let r = flow::resolve_requirements(&m, &gdal_inventory(), ResolutionPolicy::FirstUnmet).unwrap();
    assert!(r.is_satisfied());
    assert_eq!(r.satisfied()[0].record_name, "gdal 111 (msvc 2010 win64)");
}

#[test]
fn mrsid_regex_needs_both_tokens() {
    let m = manifest_display(
        r#"[{ "id": "mrsid", "pattern": "gdal.*mrsid", "min_version": "1.0.0",
              "remediation": { "prompt_message": "install mrsid" } }]"#,
    );
    let r = flow::resolve_requirements(&m, &gdal_inventory(), ResolutionPolicy::FirstUnmet).unwrap();
    assert!(!r.is_satisfied());
    assert_eq!(r.unsatisfied()[0].requirement_id, "mrsid");
}

#[test]
fn only_first_unmet_requirement_is_prompted() {
    let m = manifest_display(
        r#"[
          { "id": "a", "pattern": "mrsid", "min_version": "1.0",
            "remediation": { "prompt_message": "install A", "download_url": "http://example.invalid/a.msi" } },
          { "id": "b", "pattern": "gdal", "min_version": "1.0",
            "remediation": { "prompt_message": "install B", "download_url": "http://example.invalid/b.msi" } }
        ]"#,
    );
    let src = gdal_inventory();
    let mut prompter = RecordingPrompter {
        answer: Some(PromptAnswer::Accepted),
        ..Default::default()
    };
    let mut launcher = RecordingLauncher::default();
    let mut store = MemoryEnvStore::new();

    let outcome = flow::run(
        &m,
        FlowContext {
            source: &src,
            prompter: &mut prompter,
            launcher: &mut launcher,
            store: &mut store,
            lookup,
        },
    )
    .unwrap();

    assert!(matches!(
        outcome,
        FlowOutcome::Blocked(BlockReason::PendingExternalInstall { ref requirement_id, launched: true })
            if requirement_id == "a"
    ));
    assert_eq!(prompter.messages, ["install A"]);
    assert_eq!(launcher.launched, ["http://example.invalid/a.msi"]);
    assert!(store.get("PATH").unwrap().is_none(), "blocked runs must not touch the environment");
}

#[test]
fn declined_prompt_blocks_without_launching() {
    let m = manifest_display(
        r#"[{ "id": "java8", "pattern": "java 8", "min_version": "8.0",
              "remediation": { "prompt_message": "install java", "download_url": "http://example.invalid/jre.exe" } }]"#,
    );
    let src = gdal_inventory();
    let mut prompter = FixedAnswer(PromptAnswer::Declined);
    let mut launcher = RecordingLauncher::default();
    let mut store = MemoryEnvStore::new();
    let outcome = flow::run(
        &m,
        FlowContext {
            source: &src,
            prompter: &mut prompter,
            launcher: &mut launcher,
            store: &mut store,
            lookup,
        },
    )
    .unwrap();
    assert!(matches!(
        outcome,
        FlowOutcome::Blocked(BlockReason::UserDeclined { .. })
    ));
    assert!(launcher.launched.is_empty());
}

#[test]
fn accepted_prompt_without_download_url_is_not_launched() {
    let m = manifest_display(
        r#"[{ "id": "java8", "pattern": "java 8", "min_version": "8.0",
              "remediation": { "prompt_message": "install java", "download_url": "" } }]"#,
    );
    let mut launcher = RecordingLauncher::default();
    let outcome = flow::run(
        &m,
        FlowContext {
            source: &gdal_inventory(),
            prompter: &mut FixedAnswer(PromptAnswer::Accepted),
            launcher: &mut launcher,
            store: &mut MemoryEnvStore::new(),
            lookup,
        },
    )
    .unwrap();
    assert!(matches!(
        outcome,
        FlowOutcome::Blocked(BlockReason::PendingExternalInstall { launched: false, .. })
    ));
    assert!(launcher.launched.is_empty());
}

#[test]
fn satisfied_run_configures_environment_idempotently() {
    let m = manifest_display(
        r#"[{ "id": "gdal", "pattern": "gdal", "min_version": "1.0.0",
              "remediation": { "prompt_message": "install gdal" } }]"#,
    );
    let src = gdal_inventory();
    let mut store = MemoryEnvStore::new().with_var("PATH", r"C:\Windows");

    for expected in [EnvOutcome::Appended, EnvOutcome::AlreadyPresent] {
        let outcome = flow::run(
            &m,
            FlowContext {
                source: &src,
                prompter: &mut FixedAnswer(PromptAnswer::Declined),
                launcher: &mut RecordingLauncher::default(),
                store: &mut store,
                lookup,
            },
        )
        .unwrap();
        let FlowOutcome::Success { environment } = outcome else {
            panic!("expected success");
        };
        assert_eq!(environment[1].outcome, expected);
    }

    assert_eq!(
        store.get("PATH").unwrap().as_deref(),
        Some(r"C:\Windows;C:\Program Files\Swagd\lib")
    );
    assert_eq!(
        store.get("GDAL_DATA").unwrap().as_deref(),
        Some(r"C:\Program Files\Swagd\RGISuite\lib\data")
    );
}

struct DeniedStore;

impl EnvStore for DeniedStore {
    fn get(&self, _name: &str) -> Result<Option<String>, EnvError> {
        Ok(None)
    }

    fn set(&mut self, name: &str, _value: &str) -> Result<(), EnvError> {
        Err(EnvError::Persist {
            name: name.to_string(),
            reason: "access denied".to_string(),
        })
    }
}

#[test]
fn persist_failure_is_an_error_not_a_block() {
    let m = manifest_display(
        r#"[{ "id": "gdal", "pattern": "gdal", "min_version": "1.0.0",
              "remediation": { "prompt_message": "install gdal" } }]"#,
    );
    let err = flow::run(
        &m,
        FlowContext {
            source: &gdal_inventory(),
            prompter: &mut FixedAnswer(PromptAnswer::Accepted),
            launcher: &mut RecordingLauncher::default(),
            store: &mut DeniedStore,
            lookup,
        },
    )
    .unwrap_err();
    assert!(matches!(err, FlowError::Persist(EnvError::Persist { .. })));
}

#[test]
fn missing_inventory_source_counts_as_unsatisfied() {
    let m = manifest_display(
        r#"[{ "id": "gdal", "pattern": "gdal", "min_version": "1.0.0",
              "remediation": { "prompt_message": "install gdal" } }]"#,
    );
    let empty = SnapshotSource::new();
    let r = flow::resolve_requirements(&m, &empty, ResolutionPolicy::FirstUnmet).unwrap();
    assert_eq!(r.unsatisfied().len(), 1);
}

#[test]
fn unknown_placeholder_writes_nothing() {
    let specs = [
        EnvSpec {
            variable: "GDAL_DATA".to_string(),
            value: r"{ProgramFiles}\Swagd\data".to_string(),
            mode: EnvMode::SetIfAbsent,
        },
        EnvSpec {
            variable: "PATH".to_string(),
            value: r"{Nope}\Swagd\lib".to_string(),
            mode: EnvMode::AppendToPathIfMissing,
        },
    ];
    let mut store = MemoryEnvStore::new().with_var("PATH", r"C:\Windows");

    let err = flow::configure_environment(&specs, lookup, &mut store).unwrap_err();

    assert!(matches!(err, FlowError::Placeholder { ref variable, .. } if variable == "PATH"));
    assert_eq!(store.get("GDAL_DATA").unwrap(), None);
    assert_eq!(store.get("PATH").unwrap().as_deref(), Some(r"C:\Windows"));
    assert_eq!(store.vars().count(), 1);
}
