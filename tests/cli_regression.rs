// CLI regression tests: exit status, result lines and miette error reports.

mod common;

use assert_cmd::Command;
use common::Project;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

fn xrtest() -> Command {
    let mut cmd = Command::cargo_bin("xrtest").unwrap();
    cmd.env_remove("XRTEST_LOG");
    cmd
}

#[test]
fn help_lists_test_subcommand() {
    xrtest()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("test"));
    xrtest()
        .args(["test", "--help"])
        .assert()
        .success()
        .stdout(contains("--compare").and(contains("--functions-file")));
}

#[test]
fn missing_package_file_fails_with_diagnostic() {
    let project = Project::new();
    project.add_case("alpha", "alpha");
    let missing = project.path("apis/missing.yaml");

    xrtest()
        .arg("test")
        .arg(project.path("tests"))
        .arg("--package-file")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(contains("missing.yaml"));
}

#[cfg(unix)]
mod with_render_script {
    use super::*;
    use assert_cmd::assert::Assert;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Installs a render engine that echoes the composite resource back.
    fn install_renderer(project: &Project) -> PathBuf {
        project.write(
            "bin/render.sh",
            "#!/bin/sh\n# render XR COMPOSITION FUNCTIONS [flags]\ncat \"$2\"\n",
        );
        let path = project.path("bin/render.sh");
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn run(project: &Project, renderer: &Path, compare: bool) -> Assert {
        let mut cmd = xrtest();
        cmd.arg("test")
            .arg(project.path("tests"))
            .arg("--package-file")
            .arg(project.path("apis/package.yaml"))
            .arg("--search-root")
            .arg(project.path("apis"))
            .arg("--renderer")
            .arg(renderer)
            .current_dir(project.root());
        if compare {
            cmd.arg("--compare");
        }
        cmd.assert()
    }

    #[test]
    fn record_then_compare_round_trip() {
        let project = Project::new();
        project.add_case("alpha", "alpha");
        let renderer = install_renderer(&project);

        run(&project, &renderer, false)
            .success()
            .stdout(contains("Found 1 test case(s)").and(contains("WROTE")));
        assert!(project.read("tests/alpha/expected.yaml").contains("name: alpha"));
        assert!(project.path("dev-functions.yaml").exists());

        run(&project, &renderer, true)
            .success()
            .stdout(contains("PASS").and(contains("1 passed, 0 failed, 0 skipped")));
    }

    #[test]
    fn found_directories_are_printed_when_rendering_fails() {
        let project = Project::new();
        project.add_case("alpha", "alpha");
        project.write(
            "bin/render.sh",
            "#!/bin/sh\necho 'engine exploded' >&2\nexit 3\n",
        );
        let renderer = project.path("bin/render.sh");
        let mut perms = std::fs::metadata(&renderer).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&renderer, perms).unwrap();

        run(&project, &renderer, false)
            .failure()
            .stdout(contains("Found 1 test case(s)").and(contains("WROTE").not()))
            .stderr(contains("engine exploded"));
        assert!(!project.path("tests/alpha/expected.yaml").exists());
    }

    #[test]
    fn changed_baseline_fails_compare() {
        let project = Project::new();
        project.add_case("alpha", "alpha");
        let renderer = install_renderer(&project);
        run(&project, &renderer, false).success();

        let baseline = project.read("tests/alpha/expected.yaml");
        project.write(
            "tests/alpha/expected.yaml",
            &baseline.replace("xbuckets.example.org", "xbuckets.other.org"),
        );

        run(&project, &renderer, true)
            .failure()
            .stdout(contains("FAIL").and(contains("spec.crossplane.compositionRef.name")))
            .stderr(contains("differences found"));
    }
}
