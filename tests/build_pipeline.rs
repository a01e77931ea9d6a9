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

//! End-to-end composition tests for the build path: manifest in, validated
//! compiler invocation out.

use slsa_builder::build::GoBuild;
use slsa_builder::config::BuildConfig;
use slsa_builder::errors::BuilderError;

fn gobuild(manifest: &str, arg_env: &str) -> GoBuild {
    let cfg = BuildConfig::from_slice(manifest.as_bytes()).unwrap();
    let mut b = GoBuild::new("go", cfg);
    b.set_arg_env(arg_env).unwrap();
    b
}

#[test]
fn release_manifest_composes_expected_invocation() {
    let b = gobuild(
        r#"
version: 1
goos: linux
goarch: amd64
binary: "app-{{ .OS }}-{{ .Arch }}"
flags:
  - -trimpath
  - -race
ldflags:
  - "-X main.Ver={{ .Env.VERSION }}"
"#,
        "VERSION:1.2.3",
    );

    assert_eq!(b.generate_output_name().unwrap(), "app-linux-amd64");
    assert_eq!(
        b.generate_ldflags().unwrap(),
        "-X main.Ver=1.2.3"
    );
    assert_eq!(
        b.generate_flags().unwrap(),
        vec!["go", "build", "-mod=vendor", "-trimpath", "-race"]
    );
    assert_eq!(
        b.generate_env_additions().unwrap(),
        vec![
            ("GOOS".to_string(), "linux".to_string()),
            ("GOARCH".to_string(), "amd64".to_string()),
        ]
    );
}

#[test]
fn output_redirection_flag_is_rejected() {
    let b = gobuild(
        r#"
version: 1
goos: linux
goarch: amd64
binary: app
flags:
  - -o=/tmp/x
"#,
        "",
    );
    assert!(matches!(
        b.generate_flags().unwrap_err(),
        BuilderError::UnsupportedArgument(flag) if flag == "-o=/tmp/x"
    ));
}

#[test]
fn loader_injection_env_is_rejected() {
    let b = gobuild(
        r#"
version: 1
goos: linux
goarch: amd64
binary: app
env:
  - LD_PRELOAD=/x.so
"#,
        "",
    );
    assert!(matches!(
        b.generate_env_additions().unwrap_err(),
        BuilderError::EnvVariableNameNotAllowed(name) if name == "LD_PRELOAD"
    ));
}

#[test]
fn ldflags_template_missing_from_arg_env() {
    let b = gobuild(
        r#"
version: 1
goos: linux
goarch: amd64
binary: app
ldflags:
  - "{{ .Env.MISSING }}"
"#,
        "",
    );
    assert!(matches!(
        b.generate_ldflags().unwrap_err(),
        BuilderError::EnvVariableNameEmpty(name) if name == "MISSING"
    ));
}

#[test]
fn manifest_version_gate_applies_before_driver() {
    let err = BuildConfig::from_slice(b"version: 3\nbinary: app\n").unwrap_err();
    assert!(matches!(err, BuilderError::UnsupportedVersion(3)));
}
