//
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

//! Workflow policy validator.
//!
//! Proves structurally that a calling workflow delegates to the trusted
//! re-usable builder workflow, and to nothing else that could tamper
//! with it. Exactly one job must call the trusted workflow, under a narrow
//! permission policy; everything the workflow could use to widen its
//! privileges (top-level env, defaults, write-able dangerous permissions,
//! self-hosted runners) is rejected.
//!
//! Each rule is a small pure predicate over the parsed AST; the validator
//! performs no I/O and holds no state.

pub mod ast;

use ast::{env_var_count, Job, Permissions, WorkflowFile};

use crate::errors::{BuilderError, Result};

/// Canonical path of the trusted re-usable builder workflow. A job is
/// trusted iff its `uses` reference equals this path (case-insensitively,
/// before the `@`).
pub const TRUSTED_BUILDER_WORKFLOW: &str =
    "slsa-framework/slsa-github-generator-go/.github/workflows/builder.yml";

/// GitHub-hosted runner labels a job may request. Anything else is treated
/// as self-hosted.
/// <https://docs.github.com/en/actions/using-workflows/workflow-syntax-for-github-actions#choosing-github-hosted-runners>
const ALLOWED_RUNNERS: &[&str] = &["ubuntu-latest", "ubuntu-20.04", "ubuntu-18.04"];

const PERMISSION_ID_TOKEN: &str = "id-token";
const PERMISSION_CONTENTS: &str = "contents";
const PERMISSION_ACTIONS: &str = "actions";

/// Scopes whose `write` value could exfiltrate credentials, push code, or
/// trigger further workflows. Other scopes (e.g. `packages`) may be set
/// freely by the caller.
const DANGEROUS_PERMISSIONS: &[&str] =
    &[PERMISSION_CONTENTS, PERMISSION_ID_TOKEN, PERMISSION_ACTIONS];

#[derive(Debug)]
pub struct Workflow {
    file: WorkflowFile,
}

impl Workflow {
    /// Parses a workflow document. Any YAML-level failure is surfaced as
    /// [`BuilderError::InvalidGitHubWorkflow`].
    pub fn from_slice(content: &[u8]) -> Result<Self> {
        let file: WorkflowFile = serde_yaml::from_slice(content)
            .map_err(|e| BuilderError::InvalidGitHubWorkflow(e.to_string()))?;
        Ok(Workflow { file })
    }

    /// Runs the complete rule set, failing on the first violation.
    pub fn validate(&self) -> Result<()> {
        self.validate_top_level_definitions()?;
        self.validate_job_level_definitions()
    }

    fn validate_top_level_definitions(&self) -> Result<()> {
        // Defaults and env are not inherited by a re-usable workflow, but a
        // workflow that declares them is not the shape we audit for.
        validate_defaults(self.file.defaults.as_ref(), "top level")?;
        validate_env(self.file.env.as_ref(), "top level")?;

        // Runners, for every job. Not strictly necessary for the trusted
        // job, which runs in its own VM.
        for (id, job) in &self.file.jobs {
            validate_job_runner(id, job)?;
        }

        // Token permissions. This one is load-bearing: an undeclared
        // permission block means write-all by default.
        match &self.file.permissions {
            None => Err(BuilderError::PermissionsDefaultWrite),
            Some(permissions) => validate_untrusted_permissions(permissions),
        }
    }

    fn validate_job_level_definitions(&self) -> Result<()> {
        self.validate_trusted_job_definitions()?;
        self.validate_untrusted_job_definitions()
    }

    fn validate_trusted_job_definitions(&self) -> Result<()> {
        let (id, job) = self.unique_trusted_job()?;
        let identity = job.identity(id);

        validate_job_runner(id, job)?;
        validate_defaults(job.defaults.as_ref(), &format!("job {identity}"))?;
        validate_env(job.env.as_ref(), &format!("job {identity}"))?;

        // Re-usable workflow calls accept no steps from the caller.
        if job.steps.as_ref().is_some_and(|steps| !steps.is_empty()) {
            return Err(BuilderError::DeclaredStep(format!("job {identity}")));
        }

        validate_trusted_permissions(job)
    }

    fn validate_untrusted_job_definitions(&self) -> Result<()> {
        for (id, job) in &self.file.jobs {
            if self.is_trusted_reusable_call(id, job)? {
                continue;
            }

            validate_job_runner(id, job)?;

            // A job without its own permissions inherits the top-level
            // block, which is validated separately.
            if let Some(permissions) = &job.permissions {
                validate_untrusted_permissions(permissions)
                    .map_err(|e| match e {
                        BuilderError::PermissionWrite(scope) => {
                            BuilderError::PermissionWrite(format!("{}: {scope}", job.identity(id)))
                        }
                        other => other,
                    })?;
            }
        }
        Ok(())
    }

    /// Finds the single job whose `uses` targets the trusted builder.
    /// Zero or multiple candidates invalidate the workflow.
    fn unique_trusted_job(&self) -> Result<(&str, &Job)> {
        let mut found: Option<(&str, &Job)> = None;
        for (id, job) in &self.file.jobs {
            if !self.is_trusted_reusable_call(id, job)? {
                continue;
            }
            if let Some((first_id, first)) = found {
                return Err(BuilderError::MultipleJobsUseTrustedBuilder {
                    first: first.identity(first_id).to_string(),
                    second: job.identity(id).to_string(),
                });
            }
            found = Some((id.as_str(), job));
        }
        found.ok_or(BuilderError::NoTrustedJobFound)
    }

    /// Whether this job calls the trusted re-usable workflow. Any `uses`
    /// reference that is not of the form `PATH@REF` is rejected outright,
    /// trusted or not.
    fn is_trusted_reusable_call(&self, id: &str, job: &Job) -> Result<bool> {
        let Some(uses) = &job.uses else {
            return Ok(false);
        };

        let parts: Vec<&str> = uses.split('@').collect();
        if parts.len() != 2 {
            return Err(BuilderError::InvalidReUsableWorkflow {
                job: job.identity(id).to_string(),
                uses: uses.clone(),
            });
        }
        Ok(parts[0].eq_ignore_ascii_case(TRUSTED_BUILDER_WORKFLOW))
    }
}

fn validate_defaults(defaults: Option<&serde_yaml::Value>, context: &str) -> Result<()> {
    if defaults.is_some() {
        return Err(BuilderError::DeclaredDefaults(context.to_string()));
    }
    Ok(())
}

fn validate_env(env: Option<&serde_yaml::Value>, context: &str) -> Result<()> {
    if env.is_some_and(|e| env_var_count(e) > 0) {
        return Err(BuilderError::DeclaredEnv(context.to_string()));
    }
    Ok(())
}

fn validate_job_runner(id: &str, job: &Job) -> Result<()> {
    let Some(runner) = &job.runs_on else {
        // Re-usable workflow calls carry no runner of their own.
        return Ok(());
    };

    for label in runner.labels() {
        if !ALLOWED_RUNNERS.contains(&label.as_str()) {
            return Err(BuilderError::SelfHostedRunner {
                job: job.identity(id).to_string(),
                label: label.clone(),
            });
        }
    }
    Ok(())
}

/// Permission policy for the top level and for untrusted jobs: the
/// map-wide form must be read-only, and every dangerous scope must be
/// `read`, `none` or empty.
fn validate_untrusted_permissions(permissions: &Permissions) -> Result<()> {
    match permissions {
        Permissions::All(value) => {
            if !value.is_empty() && !value.eq_ignore_ascii_case("read-all") {
                return Err(BuilderError::PermissionsNotReadAll);
            }
        }
        Permissions::Scopes(scopes) => {
            for (name, value) in scopes {
                let value = value.as_deref().unwrap_or("");
                if DANGEROUS_PERMISSIONS.contains(&name.as_str())
                    && !value.is_empty()
                    && !value.eq_ignore_ascii_case("read")
                    && !value.eq_ignore_ascii_case("none")
                {
                    return Err(BuilderError::PermissionWrite(name.clone()));
                }
            }
        }
    }
    Ok(())
}

/// Permission policy for the trusted job: exactly `id-token: write` and
/// `contents: read`, declared explicitly, never via the map-wide form.
fn validate_trusted_permissions(job: &Job) -> Result<()> {
    let Some(permissions) = &job.permissions else {
        return Err(BuilderError::PermissionNotSet("permissions".to_string()));
    };

    let scopes = match permissions {
        Permissions::All(value) => {
            return Err(BuilderError::PermissionAllSet(value.clone()));
        }
        Permissions::Scopes(scopes) => scopes,
    };

    if scopes.len() != 2 {
        return Err(BuilderError::PermissionScopeTooMany(scopes.len()));
    }

    validate_trusted_scope(scopes, PERMISSION_ID_TOKEN, "write")?;
    validate_trusted_scope(scopes, PERMISSION_CONTENTS, "read")
}

fn validate_trusted_scope(
    scopes: &std::collections::BTreeMap<String, Option<String>>,
    name: &str,
    expected: &str,
) -> Result<()> {
    let Some(value) = scopes.get(name) else {
        return Err(BuilderError::PermissionNotSet(name.to_string()));
    };

    match value.as_deref() {
        Some(v) if v.eq_ignore_ascii_case(expected) => Ok(()),
        other => Err(BuilderError::InvalidPermission(format!(
            "scope of {name} is set to '{}'",
            other.unwrap_or("")
        ))),
    }
}
