mod common;

use std::sync::Arc;

use common::{FakeRenderer, Project};
use xrtest::config::Mode;
use xrtest::fs::OsFilesystem;
use xrtest::harness::{Harness, Outputs, RunResult};
use xrtest::verify::{CaseVerdict, Failure};
use xrtest::HarnessError;

async fn run(project: &Project, mode: Mode) -> Result<Outputs, HarnessError> {
    Harness::new(
        project.config(mode),
        Arc::new(OsFilesystem),
        Arc::new(FakeRenderer),
    )
    .run()
    .await
}

fn two_cases() -> Project {
    let project = Project::new();
    project.add_case("alpha", "alpha");
    project.add_case("nested/beta", "beta");
    project
}

#[tokio::test]
async fn record_writes_one_baseline_per_case() {
    let project = two_cases();
    let outputs = run(&project, Mode::Record).await.unwrap();

    assert_eq!(
        outputs.test_dirs,
        vec![project.path("tests/alpha"), project.path("tests/nested/beta")]
    );
    assert_eq!(
        outputs.result,
        RunResult::Recorded(vec![
            project.path("tests/alpha/expected.yaml"),
            project.path("tests/nested/beta/expected.yaml"),
        ])
    );

    let baseline = project.read("tests/alpha/expected.yaml");
    assert!(baseline.starts_with("apiVersion: example.org/v1\nkind: XBucket\n"));
    assert!(baseline.contains("name: alpha-bucket"));
    assert!(baseline.contains("name: alpha-policy"));

    let dev_functions = project.read("dev-functions.yaml");
    assert!(dev_functions.contains("name: acme-function-patch-and-transform"));
    assert!(dev_functions.contains("xpkg.example.io/acme/function-patch-and-transform:v0.9.1"));
    assert!(!dev_functions.contains("provider-aws-s3"));
}

#[tokio::test]
async fn recording_twice_is_byte_identical() {
    let project = two_cases();
    run(&project, Mode::Record).await.unwrap();
    let first = project.read("tests/nested/beta/expected.yaml");
    run(&project, Mode::Record).await.unwrap();
    assert_eq!(project.read("tests/nested/beta/expected.yaml"), first);
}

#[tokio::test]
async fn one_matching_and_one_incomplete_baseline() {
    let project = two_cases();
    run(&project, Mode::Record).await.unwrap();

    // Drop the last composed resource from beta's baseline.
    let baseline = project.read("tests/nested/beta/expected.yaml");
    let (kept, _) = baseline.rsplit_once("---\n").unwrap();
    project.write("tests/nested/beta/expected.yaml", kept);

    let outputs = run(&project, Mode::Compare).await.unwrap();
    let RunResult::Compared(report) = &outputs.result else {
        panic!("expected a comparison, got {:?}", outputs.result);
    };
    assert_eq!(report.pass_count(), 1);
    assert_eq!(report.fail_count(), 1);
    assert_eq!(
        report.verdicts[0],
        CaseVerdict::Pass {
            dir: project.path("tests/alpha")
        }
    );
    match &report.verdicts[1] {
        CaseVerdict::Fail {
            failure: Failure::Differences(diffs),
            ..
        } => {
            assert_eq!(diffs.len(), 1);
            assert!(diffs[0].is_addition());
            assert!(diffs[0].document.ends_with("BucketPolicy/beta-policy"));
        }
        other => panic!("unexpected verdict: {other:?}"),
    }
    assert!(matches!(
        outputs.ensure_passed(),
        Err(HarnessError::VerificationFailed { failed: 1, compared: 2 })
    ));
}

#[tokio::test]
async fn missing_baseline_is_skipped() {
    let project = two_cases();
    run(&project, Mode::Record).await.unwrap();
    std::fs::remove_file(project.path("tests/alpha/expected.yaml")).unwrap();

    let outputs = run(&project, Mode::Compare).await.unwrap();
    let RunResult::Compared(report) = &outputs.result else {
        panic!("expected a comparison");
    };
    assert!(matches!(report.verdicts[0], CaseVerdict::Skipped { .. }));
    assert!(matches!(report.verdicts[1], CaseVerdict::Pass { .. }));
    assert!(outputs.ensure_passed().is_ok());
}

#[tokio::test]
async fn functions_file_replaces_synthesis() {
    let project = two_cases();
    project.write(
        "functions.yaml",
        "apiVersion: pkg.crossplane.io/v1beta1\nkind: Function\nmetadata:\n  name: function-local\nspec:\n  package: xpkg.example.io/acme/function-local:v0.1.0\n",
    );
    std::fs::remove_file(project.path("apis/package.yaml")).unwrap();

    let mut config = project.config(Mode::Record);
    config.functions_file = Some(project.path("functions.yaml"));
    let outputs = Harness::new(config, Arc::new(OsFilesystem), Arc::new(FakeRenderer))
        .run()
        .await
        .unwrap();

    assert_eq!(outputs.functions, vec!["function-local"]);
    assert!(!project.path("dev-functions.yaml").exists());
}

#[tokio::test]
async fn render_failure_names_first_failing_case() {
    let project = two_cases();
    project.write(
        "tests/zeta/composite-resource.yaml",
        "kind: XBucket\nmetadata:\n  name: zeta\nspec:\n  crossplane:\n    compositionRef:\n      name: missing\n",
    );
    project.write(
        "tests/gamma/composite-resource.yaml",
        "kind: XBucket\nmetadata:\n  name: gamma\nspec: {}\n",
    );

    let err = run(&project, Mode::Record).await.unwrap_err();
    match err {
        HarnessError::Case { dir, .. } => assert_eq!(dir, project.path("tests/gamma")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!project.path("tests/alpha/expected.yaml").exists());
}

#[tokio::test]
async fn empty_test_directory_records_nothing() {
    let project = Project::new();
    std::fs::create_dir_all(project.path("tests")).unwrap();
    let outputs = run(&project, Mode::Record).await.unwrap();
    assert!(outputs.test_dirs.is_empty());
    assert_eq!(outputs.result, RunResult::Recorded(vec![]));
}
