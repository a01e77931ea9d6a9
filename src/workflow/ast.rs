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

//! Serde model of the GitHub Actions workflow subset the policy validator
//! cares about. Unknown fields are ignored; jobs are keyed in a `BTreeMap`
//! so every walk over them is in stable (sorted) order.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::Value;

#[derive(Debug, Deserialize)]
pub struct WorkflowFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub defaults: Option<Value>,
    #[serde(default)]
    pub env: Option<Value>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
    #[serde(default)]
    pub jobs: BTreeMap<String, Job>,
}

#[derive(Debug, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "runs-on")]
    pub runs_on: Option<RunsOn>,
    #[serde(default)]
    pub defaults: Option<Value>,
    #[serde(default)]
    pub env: Option<Value>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
    #[serde(default)]
    pub steps: Option<Vec<Value>>,
    #[serde(default)]
    pub uses: Option<String>,
}

impl Job {
    /// Display identity used in policy errors: the human name when set,
    /// the job ID otherwise.
    pub fn identity<'a>(&'a self, id: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(id)
    }
}

/// `runs-on` accepts a single label or a list of labels.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RunsOn {
    Label(String),
    Labels(Vec<String>),
}

impl RunsOn {
    pub fn labels(&self) -> &[String] {
        match self {
            RunsOn::Label(l) => std::slice::from_ref(l),
            RunsOn::Labels(ls) => ls,
        }
    }
}

/// `permissions` is either the map-wide shorthand (`read-all`,
/// `write-all`, ...) or a map of scope name to access value. A scope with
/// no value (`contents:`) means `none`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Permissions {
    All(String),
    Scopes(BTreeMap<String, Option<String>>),
}

/// Number of variables declared by an `env` node. A scalar expression
/// (`env: ${{ ... }}`) counts as a declaration.
pub fn env_var_count(env: &Value) -> usize {
    match env {
        Value::Null => 0,
        Value::Mapping(m) => m.len(),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reusable_call_job() {
        let yaml = r#"
name: release
on: [push]
permissions: read-all
jobs:
  build:
    permissions:
      id-token: write
      contents: read
    uses: org/repo/.github/workflows/builder.yml@v1
"#;
        let wf: WorkflowFile = serde_yaml::from_str(yaml).unwrap();
        let job = &wf.jobs["build"];
        assert_eq!(
            job.uses.as_deref(),
            Some("org/repo/.github/workflows/builder.yml@v1")
        );
        assert!(matches!(wf.permissions, Some(Permissions::All(ref s)) if s == "read-all"));
        match &job.permissions {
            Some(Permissions::Scopes(scopes)) => {
                assert_eq!(scopes["id-token"].as_deref(), Some("write"));
                assert_eq!(scopes["contents"].as_deref(), Some("read"));
            }
            other => panic!("unexpected permissions: {other:?}"),
        }
    }

    #[test]
    fn runs_on_single_and_list() {
        let single: Job = serde_yaml::from_str("runs-on: ubuntu-latest").unwrap();
        assert_eq!(single.runs_on.unwrap().labels(), ["ubuntu-latest"]);

        let list: Job = serde_yaml::from_str("runs-on: [self-hosted, linux]").unwrap();
        assert_eq!(list.runs_on.unwrap().labels(), ["self-hosted", "linux"]);
    }

    #[test]
    fn scope_without_value_is_none() {
        let job: Job = serde_yaml::from_str("permissions:\n  contents:\n").unwrap();
        match job.permissions {
            Some(Permissions::Scopes(scopes)) => assert!(scopes["contents"].is_none()),
            other => panic!("unexpected permissions: {other:?}"),
        }
    }

    #[test]
    fn env_counting() {
        assert_eq!(env_var_count(&Value::Null), 0);
        let empty: Value = serde_yaml::from_str("{}").unwrap();
        assert_eq!(env_var_count(&empty), 0);
        let two: Value = serde_yaml::from_str("A: 1\nB: 2").unwrap();
        assert_eq!(env_var_count(&two), 2);
    }
}
