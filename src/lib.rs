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

//! Trusted builder and provenance verifier for SLSA attestations produced
//! on GitHub-hosted runners.
//!
//! Two coupled security-critical engines plus the attestation plumbing
//! around them:
//!
//! - [`build`]: the sanitizing build driver. Validates every
//!   caller-supplied input against strict allow-lists, composes a
//!   fully-determined compiler invocation, and replaces the process image
//!   with the compiler so nothing can tamper with it afterwards.
//! - [`workflow`]: the workflow policy validator. Proves that exactly one
//!   job of a calling workflow delegates to the trusted re-usable builder
//!   under a narrow permission/runner/step policy.
//! - [`provenance`]: assembles, signs and log-anchors the SLSA statement,
//!   and verifies such statements end to end.

#![forbid(unsafe_code)]

pub mod build;
pub mod config;
pub mod crypto;
pub mod dsse;
pub mod errors;
pub mod fulcio;
pub mod github;
pub mod oidc;
pub mod provenance;
pub mod rekor;
pub mod trust;
pub mod workflow;

pub use errors::{BuilderError, Result};
