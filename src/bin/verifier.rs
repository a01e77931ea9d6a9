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

//! Provenance verifier entry point.
//!
//! `verifier --provenance <path> --binary <path>` hashes the binary,
//! verifies the signed provenance against the transparency log and the
//! root of trust, checks the calling workflow against the policy
//! validator, and prints the authenticated workflow identity.

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use sha2::{Digest, Sha256};

use slsa_builder::errors::Result;
use slsa_builder::github::GitHubContentsClient;
use slsa_builder::provenance;
use slsa_builder::rekor::RekorClient;
use slsa_builder::trust::ManualTrustRoot;

/// Outer deadline for all network calls on the verify path.
const NETWORK_DEADLINE: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(name = "verifier")]
#[command(about = "Verifies signed SLSA provenance against a binary", version)]
struct Cli {
    /// Path to the signed provenance envelope.
    #[arg(long)]
    provenance: PathBuf,

    /// Path to the binary the provenance should describe.
    #[arg(long)]
    binary: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let envelope = std::fs::read(&cli.provenance)?;
    let artifact_digest = sha256_file(&cli.binary)?;

    let trust = ManualTrustRoot::from_env()?;
    let http = reqwest::Client::builder().timeout(NETWORK_DEADLINE).build()?;
    let rekor = RekorClient::new(http.clone())?;
    let source = GitHubContentsClient::new(http)?;

    let identity = tokio::time::timeout(
        NETWORK_DEADLINE,
        provenance::verify(&envelope, &artifact_digest, &rekor, &trust, &source),
    )
    .await
    .map_err(|_| {
        slsa_builder::BuilderError::Unexpected("provenance verification timed out".to_string())
    })??;

    println!(
        "verified SLSA provenance produced at\n{}",
        serde_json::to_string_pretty(&identity)?
    );
    println!("successfully verified SLSA provenance");
    Ok(())
}

fn sha256_file(path: &PathBuf) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
