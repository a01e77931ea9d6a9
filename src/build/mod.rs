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

//! Sanitizing build driver.
//!
//! Composes a fully-determined compiler invocation from a validated
//! [`BuildConfig`] and then replaces the current process image with the
//! compiler. Process replacement is the point: once the policy checks have
//! passed, no wrapper code runs between validation and compilation, so
//! nothing can alter the argv or envp after the fact.
//!
//! The caller-supplied argument environment (`K1:V1,K2:V2`) is used solely
//! to resolve `{{ .Env.NAME }}` placeholders inside ldflags templates. It is
//! never exported to the compiler's environment.

pub mod sanitize;

use std::collections::BTreeMap;
use std::os::unix::process::CommandExt;
use std::process::Command;

use tracing::{debug, info};

use crate::config::BuildConfig;
use crate::errors::{BuilderError, Result};
use crate::github;
use sanitize::{allowed_build_flag, allowed_env_name, parse_arg_env};

/// Name of the trusted environment variable carrying the final binary name.
/// It is set by the trusted re-usable workflow, never by untrusted config.
const OUTPUT_BINARY_ENV: &str = "OUTPUT_BINARY";

/// The fully-composed compiler invocation. Constructed once and immediately
/// consumed by process replacement; never persisted.
#[derive(Debug)]
pub struct BuildPlan {
    /// `[compiler, "build", "-mod=vendor", ...flags, "-ldflags=...", "-o", name]`
    pub argv: Vec<String>,
    /// Variables appended to the inherited environment snapshot.
    pub env_additions: Vec<(String, String)>,
    /// Output name derived from the `binary` template (dry-run channel only;
    /// the `-o` argument uses the trusted `OUTPUT_BINARY` value).
    pub output_name: String,
}

pub struct GoBuild {
    goc: String,
    cfg: BuildConfig,
    arg_env: BTreeMap<String, String>,
}

impl GoBuild {
    pub fn new(goc: impl Into<String>, cfg: BuildConfig) -> Self {
        GoBuild {
            goc: goc.into(),
            cfg,
            arg_env: BTreeMap::new(),
        }
    }

    /// Parses and stores the caller-supplied argument environment.
    pub fn set_arg_env(&mut self, s: &str) -> Result<()> {
        self.arg_env = parse_arg_env(s)?;
        Ok(())
    }

    /// Composes `[compiler, "build", "-mod=vendor", ...]`, admitting each
    /// configured flag only if it passes the allow-list.
    pub fn generate_flags(&self) -> Result<Vec<String>> {
        let mut argv = vec![self.goc.clone(), "build".to_string(), "-mod=vendor".to_string()];
        for flag in &self.cfg.flags {
            if !allowed_build_flag(flag) {
                return Err(BuilderError::UnsupportedArgument(flag.clone()));
            }
            argv.push(flag.clone());
        }
        Ok(argv)
    }

    /// Variables appended to the environment snapshot: `GOOS`, `GOARCH`
    /// (both required) and each allow-listed config entry, in sorted order.
    pub fn generate_env_additions(&self) -> Result<Vec<(String, String)>> {
        if self.cfg.goos.is_empty() {
            return Err(BuilderError::EnvVariableNameEmpty("GOOS".to_string()));
        }
        if self.cfg.goarch.is_empty() {
            return Err(BuilderError::EnvVariableNameEmpty("GOARCH".to_string()));
        }

        let mut additions = vec![
            ("GOOS".to_string(), self.cfg.goos.clone()),
            ("GOARCH".to_string(), self.cfg.goarch.clone()),
        ];
        for (name, value) in &self.cfg.env {
            if !allowed_env_name(name) {
                return Err(BuilderError::EnvVariableNameNotAllowed(name.clone()));
            }
            additions.push((name.clone(), value.clone()));
        }
        Ok(additions)
    }

    /// Resolves every ldflags template and joins the results with a single
    /// space. Returns the empty string when no templates are configured.
    pub fn generate_ldflags(&self) -> Result<String> {
        let resolved = self
            .cfg
            .ldflags
            .iter()
            .map(|t| self.resolve_env_template(t))
            .collect::<Result<Vec<_>>>()?;
        Ok(resolved.join(" "))
    }

    /// Left-to-right scanner over one template entry. Non-template text is
    /// preserved verbatim; each `{{ .Env.NAME }}` placeholder is substituted
    /// from the argument environment (never from the process environment).
    fn resolve_env_template(&self, template: &str) -> Result<String> {
        const OPEN: &str = "{{ .Env.";
        const CLOSE: &str = "}}";

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start + OPEN.len()..];
            let end = after
                .find(CLOSE)
                .ok_or_else(|| BuilderError::InvalidEnvArgument(template.to_string()))?;
            let name = after[..end].trim();
            if name.is_empty() {
                return Err(BuilderError::EnvVariableNameEmpty(template.to_string()));
            }
            let value = self
                .arg_env
                .get(name)
                .ok_or_else(|| BuilderError::EnvVariableNameEmpty(name.to_string()))?;
            out.push_str(value);
            rest = &after[end + CLOSE.len()..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Expands the `binary` template. `{{ .OS }}` and `{{ .Arch }}` are the
    /// only recognized placeholders; anything else survives substitution and
    /// fails the character check below.
    pub fn generate_output_name(&self) -> Result<String> {
        let mut name = self.cfg.binary.clone();

        if name.contains("{{ .OS }}") {
            if self.cfg.goos.is_empty() {
                return Err(BuilderError::EnvVariableNameEmpty("goos".to_string()));
            }
            name = name.replace("{{ .OS }}", &self.cfg.goos);
        }
        if name.contains("{{ .Arch }}") {
            if self.cfg.goarch.is_empty() {
                return Err(BuilderError::EnvVariableNameEmpty("goarch".to_string()));
            }
            name = name.replace("{{ .Arch }}", &self.cfg.goarch);
        }

        if name.is_empty() {
            return Err(BuilderError::EmptyFilename);
        }
        if let Some(found) = name
            .chars()
            .find(|&c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        {
            return Err(BuilderError::InvalidFilename { found, name });
        }
        Ok(name)
    }

    /// Composes the full plan. The `-o` value comes from the trusted
    /// `OUTPUT_BINARY` variable supplied by the re-usable workflow.
    fn plan(&self, output_binary: String) -> Result<BuildPlan> {
        let output_name = self.generate_output_name()?;
        let mut argv = self.generate_flags()?;

        let ldflags = self.generate_ldflags()?;
        if !ldflags.is_empty() {
            argv.push(format!("-ldflags={ldflags}"));
        }
        argv.push("-o".to_string());
        argv.push(output_binary);

        Ok(BuildPlan {
            argv,
            env_additions: self.generate_env_additions()?,
            output_name,
        })
    }

    /// Validates everything, then either describes the invocation (dry run)
    /// or replaces the current process image with the compiler.
    ///
    /// On the real path this function does not return: `exec` only hands
    /// control back on failure, and that failure is propagated.
    pub fn run(&self, dry: bool) -> Result<()> {
        let output_binary = std::env::var(OUTPUT_BINARY_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| BuilderError::EnvVariableNameEmpty(OUTPUT_BINARY_ENV.to_string()))?;

        let plan = self.plan(output_binary)?;
        debug!(argv = ?plan.argv, "composed build plan");

        if dry {
            github::set_output("go-binary-name", &plan.output_name);
            println!(
                "dry run: argv: {:?} env additions: {:?}",
                plan.argv, plan.env_additions
            );
            return Ok(());
        }

        // Snapshot the process environment and append to the snapshot; the
        // live environment is never mutated.
        let mut envp: Vec<(String, String)> = std::env::vars().collect();
        envp.extend(plan.env_additions);

        info!(compiler = %plan.argv[0], "handing off to compiler");
        let err = Command::new(&plan.argv[0])
            .args(&plan.argv[1..])
            .env_clear()
            .envs(envp)
            .exec();
        // exec only returns on failure.
        Err(err.into())
    }
}
