// Copyright 2022 The slsa-builder Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integration tests for the workflow policy validator: one test per rule,
//! each driven by an inline workflow document.

use slsa_builder::errors::BuilderError;
use slsa_builder::workflow::Workflow;

fn validate(yaml: &str) -> Result<(), BuilderError> {
    Workflow::from_slice(yaml.as_bytes())?.validate()
}

const TRUSTED: &str =
    "slsa-framework/slsa-github-generator-go/.github/workflows/builder.yml@refs/tags/v1.0.0";

/// Conforming workflow: one trusted job, one plain job, read-only
/// permissions everywhere.
fn valid_workflow() -> String {
    format!(
        r#"
name: SLSA Release
on: [push]
permissions: read-all
jobs:
  build:
    permissions:
      id-token: write
      contents: read
    uses: {TRUSTED}
  upload:
    runs-on: ubuntu-latest
    steps:
      - run: ./upload.sh
"#
    )
}

#[test]
fn accepts_conforming_workflow() {
    validate(&valid_workflow()).unwrap();
}

// =============== Top-level rules ================ //

#[test]
fn rejects_top_level_defaults() {
    let yaml = valid_workflow() + "defaults:\n  run:\n    shell: bash\n";
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::DeclaredDefaults(ctx) if ctx == "top level"
    ));
}

#[test]
fn rejects_top_level_env_with_variables() {
    let yaml = valid_workflow() + "env:\n  SOMETHING: value\n";
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::DeclaredEnv(ctx) if ctx == "top level"
    ));
}

#[test]
fn accepts_top_level_env_without_variables() {
    let yaml = valid_workflow() + "env: {}\n";
    validate(&yaml).unwrap();
}

#[test]
fn rejects_self_hosted_runner() {
    let yaml = valid_workflow().replace("runs-on: ubuntu-latest", "runs-on: self-hosted");
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::SelfHostedRunner { label, .. } if label == "self-hosted"
    ));
}

#[test]
fn rejects_self_hosted_label_in_list() {
    let yaml =
        valid_workflow().replace("runs-on: ubuntu-latest", "runs-on: [ubuntu-latest, macos-12]");
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::SelfHostedRunner { label, .. } if label == "macos-12"
    ));
}

#[test]
fn accepts_all_allowed_runners() {
    for runner in ["ubuntu-latest", "ubuntu-20.04", "ubuntu-18.04"] {
        let yaml = valid_workflow().replace("ubuntu-latest", runner);
        validate(&yaml).unwrap_or_else(|e| panic!("{runner}: {e}"));
    }
}

#[test]
fn rejects_missing_top_level_permissions() {
    let yaml = valid_workflow().replace("permissions: read-all\n", "");
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::PermissionsDefaultWrite
    ));
}

#[test]
fn rejects_write_all_permissions() {
    let yaml = valid_workflow().replace("permissions: read-all", "permissions: write-all");
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::PermissionsNotReadAll
    ));
}

#[test]
fn read_all_comparison_is_case_insensitive() {
    let yaml = valid_workflow().replace("permissions: read-all", "permissions: READ-ALL");
    validate(&yaml).unwrap();
}

#[test]
fn rejects_dangerous_top_level_scope_write() {
    for scope in ["contents", "id-token", "actions"] {
        let yaml = valid_workflow().replace(
            "permissions: read-all",
            &format!("permissions:\n  {scope}: write"),
        );
        assert!(
            matches!(
                validate(&yaml).unwrap_err(),
                BuilderError::PermissionWrite(ref s) if s == scope
            ),
            "scope {scope} must be rejected"
        );
    }
}

#[test]
fn accepts_non_dangerous_top_level_scope_write() {
    let yaml = valid_workflow().replace(
        "permissions: read-all",
        "permissions:\n  packages: write",
    );
    validate(&yaml).unwrap();
}

#[test]
fn accepts_dangerous_scope_read_none_or_empty() {
    for value in ["read", "none", ""] {
        let yaml = valid_workflow().replace(
            "permissions: read-all",
            &format!("permissions:\n  contents: {value}"),
        );
        validate(&yaml).unwrap_or_else(|e| panic!("contents: {value:?}: {e}"));
    }
}

// =============== Untrusted job rules ================ //

#[test]
fn rejects_untrusted_job_dangerous_write() {
    let yaml = valid_workflow().replace(
        "    runs-on: ubuntu-latest",
        "    runs-on: ubuntu-latest\n    permissions:\n      id-token: write",
    );
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::PermissionWrite(_)
    ));
}

#[test]
fn accepts_untrusted_job_with_read_permissions() {
    let yaml = valid_workflow().replace(
        "    runs-on: ubuntu-latest",
        "    runs-on: ubuntu-latest\n    permissions:\n      contents: read",
    );
    validate(&yaml).unwrap();
}

// =============== Trusted job discovery ================ //

#[test]
fn rejects_unpinned_reusable_workflow() {
    let yaml = valid_workflow().replace(&format!("uses: {TRUSTED}"), &format!(
        "uses: {}",
        TRUSTED.split('@').next().unwrap()
    ));
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::InvalidReUsableWorkflow { .. }
    ));
}

#[test]
fn rejects_workflow_without_trusted_job() {
    let yaml = valid_workflow().replace(
        &format!("uses: {TRUSTED}"),
        "uses: other/repo/.github/workflows/build.yml@v1",
    );
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::NoTrustedJobFound
    ));
}

#[test]
fn rejects_two_trusted_jobs() {
    let yaml = valid_workflow()
        + &format!(
            r#"  build2:
    permissions:
      id-token: write
      contents: read
    uses: {TRUSTED}
"#
        );
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::MultipleJobsUseTrustedBuilder { first, second }
            if first == "build" && second == "build2"
    ));
}

// =============== Trusted job rules ================ //

/// Rewrites the trusted job of the valid workflow.
fn with_trusted_job(job_body: &str) -> String {
    format!(
        r#"
name: SLSA Release
on: [push]
permissions: read-all
jobs:
  build:
{job_body}
    uses: {TRUSTED}
  upload:
    runs-on: ubuntu-latest
    steps:
      - run: ./upload.sh
"#
    )
}

#[test]
fn rejects_trusted_job_env() {
    let yaml = with_trusted_job(
        r#"    permissions:
      id-token: write
      contents: read
    env:
      FOO: bar"#,
    );
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::DeclaredEnv(ctx) if ctx == "job build"
    ));
}

#[test]
fn rejects_trusted_job_defaults() {
    let yaml = with_trusted_job(
        r#"    permissions:
      id-token: write
      contents: read
    defaults:
      run:
        shell: bash"#,
    );
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::DeclaredDefaults(ctx) if ctx == "job build"
    ));
}

#[test]
fn rejects_trusted_job_steps() {
    let yaml = with_trusted_job(
        r#"    permissions:
      id-token: write
      contents: read
    steps:
      - run: echo extra"#,
    );
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::DeclaredStep(ctx) if ctx == "job build"
    ));
}

#[test]
fn rejects_trusted_job_without_permissions() {
    let yaml = with_trusted_job("    name: build");
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::PermissionNotSet(_)
    ));
}

#[test]
fn rejects_trusted_job_map_wide_permissions() {
    let yaml = with_trusted_job("    permissions: read-all");
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::PermissionAllSet(value) if value == "read-all"
    ));
}

#[test]
fn rejects_trusted_job_extra_scope() {
    let yaml = with_trusted_job(
        r#"    permissions:
      id-token: write
      contents: read
      packages: read"#,
    );
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::PermissionScopeTooMany(3)
    ));
}

#[test]
fn rejects_trusted_job_missing_required_scope() {
    let yaml = with_trusted_job(
        r#"    permissions:
      id-token: write
      packages: read"#,
    );
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::PermissionNotSet(scope) if scope == "contents"
    ));
}

#[test]
fn rejects_trusted_job_wrong_scope_value() {
    let yaml = with_trusted_job(
        r#"    permissions:
      id-token: read
      contents: read"#,
    );
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::InvalidPermission(_)
    ));
}

#[test]
fn trusted_scope_values_compare_case_insensitively() {
    let yaml = with_trusted_job(
        r#"    permissions:
      id-token: WRITE
      contents: READ"#,
    );
    validate(&yaml).unwrap();
}

// =============== Parsing ================ //

#[test]
fn rejects_malformed_yaml() {
    assert!(matches!(
        validate("jobs: [whatever: {").unwrap_err(),
        BuilderError::InvalidGitHubWorkflow(_)
    ));
}

#[test]
fn error_uses_job_name_when_present() {
    let yaml = valid_workflow().replace(
        "  upload:\n    runs-on: ubuntu-latest",
        "  upload:\n    name: Upload artifacts\n    runs-on: self-hosted",
    );
    assert!(matches!(
        validate(&yaml).unwrap_err(),
        BuilderError::SelfHostedRunner { job, .. } if job == "Upload artifacts"
    ));
}
