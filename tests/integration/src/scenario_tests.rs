//! End-to-end scenarios over the whole pipeline
//!
//! Each test builds a workspace on disk (manifests, registry index, maybe
//! existing build files) and drives `Engine` the way the CLI does.

use std::collections::BTreeMap;
use std::sync::Arc;

use depsync_core::{ChangeKind, EXIT_DRIFT, Engine, FileAction, Mode, Report};
use depsync_resolve::{InMemoryRegistry, PackageMetadata};
use depsync_test_utils::TestWorkspace;
use pretty_assertions::assert_eq;

/// A workspace exercising features, platform-conditional dependencies,
/// native shims and platform variants:
///
/// ```text
/// app -> serde{derive} -> serde-derive (optional, via feature)
///     -> net -> sys (windows only, native + windows variant)
/// tool -> net
/// ```
fn rich_workspace() -> TestWorkspace {
    let ws = TestWorkspace::new();
    ws.manifest("", "[workspace]\nmembers = [\"apps/*\"]\n")
        .manifest(
            "apps/app",
            r#"[package]
name = "app"
version = "0.3.0"
srcs = ["src/main.rs"]

[dependencies]
serde = { version = "^1.0", features = ["derive"] }
net = ">=0.2"
"#,
        )
        .manifest(
            "apps/tool",
            r#"[package]
name = "tool"
version = "0.1.0"
native = ["shim/tool.c"]

[dependencies]
net = "~0.2.1"
"#,
        )
        .registry_versions(
            "serde",
            &[
                ("1.0.190", ""),
                (
                    "1.0.200",
                    r#"features = { default = ["std"], std = [], derive = ["dep:serde-derive"] }

[[versions.dependencies]]
name = "serde-derive"
version = "=1.0.200"
optional = true
"#,
                ),
            ],
        )
        .registry_package("serde-derive", "1.0.200", "")
        .registry_versions(
            "net",
            &[
                ("0.2.1", ""),
                (
                    "0.2.4",
                    r#"[[versions.dependencies]]
name = "sys"
version = "^0.5"
platform = "cfg(windows)"
"#,
                ),
                ("0.3.0-beta.1", ""),
            ],
        )
        .registry_package(
            "sys",
            "0.5.2",
            r#"native = ["native/sys.c"]

[versions.platform.windows]
srcs = ["src/windows.rs"]
native = ["native/win.c"]
"#,
        );
    ws
}

fn engine(ws: &TestWorkspace) -> Engine {
    Engine::from_root(ws.root()).unwrap()
}

async fn run(ws: &TestWorkspace, mode: Mode) -> Report {
    engine(ws).run(mode).await.unwrap()
}

fn build_files(ws: &TestWorkspace) -> BTreeMap<String, String> {
    ws.snapshot()
        .into_iter()
        .filter(|(path, _)| path.ends_with("/BUCK") || path == "BUCK")
        .collect()
}

#[tokio::test]
async fn rich_workspace_resolves_as_expected() {
    let ws = rich_workspace();
    let report = run(&ws, Mode::Sync).await;

    let versions: BTreeMap<&str, &str> = report
        .packages
        .iter()
        .map(|p| (p.name.as_str(), p.version.as_str()))
        .collect();
    assert_eq!(
        versions,
        BTreeMap::from([
            ("app", "0.3.0"),
            ("net", "0.2.4"),
            ("serde", "1.0.200"),
            ("serde-derive", "1.0.200"),
            ("sys", "0.5.2"),
            ("tool", "0.1.0"),
        ])
    );

    let serde = ws.read("third-party/serde/BUCK");
    assert!(serde.contains("        \"default\",\n        \"derive\",\n        \"std\",\n"));
    assert!(serde.contains("\"//third-party/serde-derive:serde-derive\","));

    let sys = ws.read("third-party/sys/BUCK");
    assert!(sys.contains("cxx_library(\n    name = \"sys-native\","));
    assert!(sys.contains("name = \"sys-windows\","));
    assert!(sys.contains("cxx_library(\n    name = \"sys-windows-native\","));
    assert!(!sys.contains("\"linux\""));

    let net = ws.read("third-party/net/BUCK");
    assert!(net.contains("\"//third-party/sys:sys\","));

    let tool = ws.read("apps/tool/BUCK");
    assert!(tool.contains("\"//apps/tool:tool-native\","));
    assert!(tool.contains("\"//third-party/net:net\","));
}

#[tokio::test]
async fn second_run_produces_empty_plan() {
    let ws = rich_workspace();
    run(&ws, Mode::Sync).await;
    let written = ws.snapshot();

    let planned = engine(&ws).plan().await.unwrap();
    assert!(planned.plan.is_empty());
    assert!(planned.plan.changes().next().is_none());

    let report = run(&ws, Mode::Sync).await;
    assert!(!report.has_drift());
    assert_eq!(ws.snapshot(), written);
}

#[tokio::test]
async fn identical_workspaces_give_identical_bytes() {
    let first = rich_workspace();
    let second = rich_workspace();
    // Same members, listed literally instead of by glob.
    second.manifest("", "[workspace]\nmembers = [\"apps/tool\", \"apps/app\"]\n");

    run(&first, Mode::Sync).await;
    run(&second, Mode::Sync).await;

    assert_eq!(build_files(&first), build_files(&second));
}

#[tokio::test]
async fn bytes_outside_region_are_preserved() {
    let ws = rich_workspace();
    let before = "# Hand-written rules for the app.\nload(\"//defs.bzl\", \"test_suite\")\n\n";
    let after = "\ntest_suite(\n    name = \"tests\",\n)\n";
    ws.write(
        "apps/app/BUCK",
        &format!(
            "{before}# depsync:begin managed region, generated, do not edit\n# depsync:end\n{after}"
        ),
    );

    run(&ws, Mode::Sync).await;
    let content = ws.read("apps/app/BUCK");
    assert!(content.starts_with(before));
    assert!(content.ends_with(after));
    assert!(content.contains("name = \"app\","));

    // The generated file without hand-written content has nothing around it.
    let net = ws.read("third-party/net/BUCK");
    assert!(net.starts_with("# depsync:begin"));
    assert!(net.ends_with("# depsync:end\n"));
}

#[tokio::test]
async fn version_bump_touches_only_that_package() {
    let ws = rich_workspace();
    run(&ws, Mode::Sync).await;

    ws.registry_package(
        "sys",
        "0.5.3",
        r#"native = ["native/sys.c"]

[versions.platform.windows]
srcs = ["src/windows.rs"]
native = ["native/win.c"]
"#,
    );
    let report = run(&ws, Mode::Sync).await;

    let touched: Vec<&str> = report
        .files
        .iter()
        .filter(|f| f.action != FileAction::Unchanged)
        .map(|f| f.path.as_str())
        .collect();
    assert_eq!(touched, vec!["third-party/sys/BUCK"]);
    assert!(report.targets.iter().all(|t| t.kind == ChangeKind::Modified));
    assert!(report.targets.iter().all(|t| t.label.starts_with("//third-party/sys:")));
}

#[tokio::test]
async fn dropped_feature_removes_optional_dependency() {
    let ws = rich_workspace();
    run(&ws, Mode::Sync).await;

    ws.manifest(
        "apps/app",
        r#"[package]
name = "app"
version = "0.3.0"
srcs = ["src/main.rs"]

[dependencies]
serde = "^1.0"
net = ">=0.2"
"#,
    );
    let report = run(&ws, Mode::Sync).await;

    let changes: BTreeMap<&str, ChangeKind> = report
        .targets
        .iter()
        .map(|t| (t.label.as_str(), t.kind))
        .collect();
    assert_eq!(
        changes,
        BTreeMap::from([
            ("//third-party/serde-derive:serde-derive", ChangeKind::Removed),
            ("//third-party/serde:serde", ChangeKind::FeaturesChanged),
        ])
    );
    ws.assert_file_not_exists("third-party/serde-derive/BUCK");
}

#[tokio::test]
async fn removing_dependency_deletes_generated_file() {
    let ws = rich_workspace();
    run(&ws, Mode::Sync).await;
    ws.assert_file_exists("third-party/sys/BUCK");
    ws.write(
        "third-party/net/BUCK",
        &format!("# vendored notes\n\n{}", ws.read("third-party/net/BUCK")),
    );

    // Drop `net` from both members: `net` keeps its hand-written text,
    // `sys` had nothing else and goes away.
    ws.manifest(
        "apps/app",
        "[package]\nname = \"app\"\nversion = \"0.3.0\"\nsrcs = [\"src/main.rs\"]\n\n[dependencies]\nserde = { version = \"^1.0\", features = [\"derive\"] }\n",
    )
    .manifest(
        "apps/tool",
        "[package]\nname = \"tool\"\nversion = \"0.1.0\"\nnative = [\"shim/tool.c\"]\n",
    );
    let report = run(&ws, Mode::Sync).await;

    ws.assert_file_not_exists("third-party/sys/BUCK");
    assert_eq!(
        ws.read("third-party/net/BUCK"),
        "# vendored notes\n\n# depsync:begin managed region, generated, do not edit\n# depsync:end\n"
    );
    assert_eq!(report.counts.deleted, 1);
    assert!(
        report
            .targets
            .iter()
            .any(|t| t.label == "//third-party/net:net" && t.kind == ChangeKind::Removed)
    );

    // Emptied regions stay put on the next run.
    let again = run(&ws, Mode::Check).await;
    assert!(!again.has_drift());
}

#[tokio::test]
async fn removed_workspace_member_drifts_then_loses_its_build_file() {
    let ws = TestWorkspace::new();
    ws.manifest("", "[workspace]\nmembers = [\"libs/*\"]\n")
        .package("libs/x", "x", "0.1.0", &[])
        .package("libs/y", "y", "0.1.0", &[]);
    run(&ws, Mode::Sync).await;
    ws.assert_file_exists("libs/x/BUCK");

    ws.remove("libs/x/depsync-manifest.toml");
    let before = ws.snapshot();
    let check = run(&ws, Mode::Check).await;
    assert!(check.has_drift());
    assert_eq!(check.exit_code(), EXIT_DRIFT);
    assert!(
        check
            .targets
            .iter()
            .any(|t| t.label == "//libs/x:x" && t.kind == ChangeKind::Removed)
    );
    assert_eq!(ws.snapshot(), before);

    let report = run(&ws, Mode::Sync).await;
    assert_eq!(report.counts.deleted, 1);
    ws.assert_file_not_exists("libs/x/BUCK");
    ws.assert_file_exists("libs/y/BUCK");
    assert!(!run(&ws, Mode::Check).await.has_drift());
}

#[tokio::test]
async fn dry_run_then_sync_applies_the_reported_plan() {
    let ws = rich_workspace();
    run(&ws, Mode::Sync).await;
    ws.manifest(
        "apps/tool",
        "[package]\nname = \"tool\"\nversion = \"0.1.1\"\nnative = [\"shim/tool.c\"]\n\n[dependencies]\nnet = \"~0.2.1\"\nserde = \"^1.0\"\n",
    );
    let before = ws.snapshot();

    let dry = run(&ws, Mode::DryRun).await;
    assert_eq!(dry.exit_code(), EXIT_DRIFT);
    assert_eq!(ws.snapshot(), before);

    let applied = run(&ws, Mode::Sync).await;
    assert_eq!(applied.targets, dry.targets);
    assert_eq!(applied.counts, dry.counts);
    let plan = |r: &Report| {
        r.files
            .iter()
            .map(|f| (f.path.clone(), f.action, f.diff.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(plan(&applied), plan(&dry));
}

#[tokio::test]
async fn transient_registry_failures_are_retried() {
    let ws = TestWorkspace::new();
    ws.package("", "app", "1.0.0", &[("flaky", "*")]).config(
        "[registry]\nmax_retries = 3\ninitial_backoff_ms = 1\nmax_backoff_ms = 2\n",
    );
    let registry = Arc::new(
        InMemoryRegistry::new()
            .with_package(
                PackageMetadata::from_toml("name = \"flaky\"\n[[versions]]\nversion = \"2.0.0\"\n")
                    .unwrap(),
            )
            .fail_times("flaky", 2),
    );

    let report = engine(&ws)
        .with_registry(registry.clone())
        .run(Mode::Sync)
        .await
        .unwrap();
    assert_eq!(report.counts.created, 2);
    assert_eq!(registry.calls("flaky"), 3);

    let exhausted = TestWorkspace::new();
    exhausted
        .package("", "app", "1.0.0", &[("flaky", "*")])
        .config("[registry]\nmax_retries = 1\ninitial_backoff_ms = 1\nmax_backoff_ms = 1\n");
    let registry = Arc::new(InMemoryRegistry::new().fail_times("flaky", 10));
    let err = engine(&exhausted)
        .with_registry(registry)
        .run(Mode::Sync)
        .await
        .unwrap_err();
    assert_eq!(err.class(), "RegistryUnavailableError");
    exhausted.assert_file_not_exists("BUCK");
}

#[tokio::test]
async fn json_report_round_trips_through_serde() {
    let ws = rich_workspace();
    let report = run(&ws, Mode::Check).await;
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    assert_eq!(json["mode"], "check");
    assert_eq!(json["counts"]["created"], report.counts.created);
    assert_eq!(
        json["files"].as_array().unwrap().len(),
        report.files.len()
    );
}
