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

//! Allow-list predicates for everything the calling workflow feeds into the
//! compiler invocation. These are total, pure functions: every policy
//! decision on the build path reduces to one of them.

use std::collections::BTreeMap;

use crate::errors::{BuilderError, Result};

/// Compiler flags the caller may pass through, matched by prefix so that
/// `-tags=netgo` is accepted alongside bare `-tags`.
///
/// Deliberately excluded: `-o`, `-toolexec`, `-mod`, `-asmflags`, `-n`,
/// `-installsuffix`, `-modfile`, `-workfile`, `-overlay`, `-pkgdir`,
/// `-modcacherw`, `-work`: they change the output path, invoke external
/// tools, or disable vendoring.
const ALLOWED_BUILD_FLAGS: &[&str] = &[
    "-a",
    "-race",
    "-msan",
    "-asan",
    "-v",
    "-x",
    "-buildinfo",
    "-buildmode",
    "-buildvcs",
    "-compiler",
    "-gccgoflags",
    "-gcflags",
    "-ldflags",
    "-linkshared",
    "-tags",
    "-trimpath",
];

/// Returns true iff `arg` starts with one of the allow-listed flag
/// prefixes. Leading whitespace or any other character before the prefix
/// disqualifies the argument.
pub fn allowed_build_flag(arg: &str) -> bool {
    ALLOWED_BUILD_FLAGS.iter().any(|p| arg.starts_with(p))
}

/// Returns true iff `name` is a toolchain knob (`GO*` or `CGO_*`).
/// Everything else (`LD_PRELOAD`, `PATH`, ...) is injection surface.
pub fn allowed_env_name(name: &str) -> bool {
    name.starts_with("GO") || name.starts_with("CGO_")
}

/// Returns true iff every character of `s` is in `[a-z0-9_-]`,
/// case-insensitively. Path separators, `$`, `.` and template residue all
/// fail this check.
pub fn valid_output_name(s: &str) -> bool {
    s.chars().all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-'
    })
}

/// Parses the caller-supplied argument environment, a single
/// `K1:V1,K2:V2` string used only to resolve ldflags templates.
///
/// Empty input yields an empty mapping. Each comma-separated element must
/// split on `:` into exactly two parts after trimming spaces. Duplicate
/// keys: last writer wins.
pub fn parse_arg_env(s: &str) -> Result<BTreeMap<String, String>> {
    let mut env = BTreeMap::new();
    if s.is_empty() {
        return Ok(env);
    }

    for entry in s.split(',') {
        let parts: Vec<&str> = entry.trim().split(':').collect();
        if parts.len() != 2 {
            return Err(BuilderError::InvalidEnvArgument(entry.to_string()));
        }
        env.insert(parts[0].trim().to_string(), parts[1].trim().to_string());
    }
    Ok(env)
}
