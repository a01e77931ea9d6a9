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

//! Trusted builder entry point.
//!
//! `builder build [--dry] <config.yml> [<K1:V1,K2:V2>]` validates the
//! manifest and either describes the compiler invocation (dry run) or
//! replaces this process with the compiler.
//!
//! `builder provenance --binary-name <NAME> --digest <HEX64>` produces a
//! signed, log-anchored attestation for the artifact and writes it to
//! `<NAME>.intoto.sig`.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use slsa_builder::build::GoBuild;
use slsa_builder::config::BuildConfig;
use slsa_builder::errors::Result;
use slsa_builder::fulcio::FulcioClient;
use slsa_builder::github::{self, GitHubContext};
use slsa_builder::provenance;
use slsa_builder::rekor::RekorClient;

/// Outer deadline for all network calls on the provenance path.
const NETWORK_DEADLINE: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(name = "builder")]
#[command(about = "Trusted SLSA builder for GitHub-hosted runners", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the build manifest and hand off to the compiler.
    Build {
        /// Describe the invocation instead of running the compiler.
        #[arg(long)]
        dry: bool,

        /// Path to the build manifest.
        config: PathBuf,

        /// Argument environment (`K1:V1,K2:V2`) for ldflags templates.
        #[arg(default_value = "")]
        arg_env: String,
    },

    /// Generate signed provenance for a built artifact.
    Provenance {
        /// Name of the artifact, as resolved by the dry run.
        #[arg(long = "binary-name")]
        binary_name: String,

        /// SHA-256 digest of the artifact, 64 lowercase hex characters.
        #[arg(long)]
        digest: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Build {
            dry,
            config,
            arg_env,
        } => run_build(dry, &config, &arg_env),
        Commands::Provenance {
            binary_name,
            digest,
        } => run_provenance(&binary_name, &digest).await,
    };

    if let Err(e) = outcome {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run_build(dry: bool, config: &PathBuf, arg_env: &str) -> Result<()> {
    let cfg = BuildConfig::from_file(config)?;

    // The compiler is resolved through PATH at exec time.
    let mut gobuild = GoBuild::new("go", cfg);
    gobuild.set_arg_env(arg_env)?;
    gobuild.run(dry)
}

async fn run_provenance(binary_name: &str, digest: &str) -> Result<()> {
    let ctx = GitHubContext::from_env()?;

    let http = reqwest::Client::builder().timeout(NETWORK_DEADLINE).build()?;
    let fulcio = FulcioClient::new(http.clone())?;
    let rekor = RekorClient::new(http.clone())?;

    let envelope = tokio::time::timeout(
        NETWORK_DEADLINE,
        provenance::generate(binary_name, digest, &ctx, &http, &fulcio, &rekor),
    )
    .await
    .map_err(|_| {
        slsa_builder::BuilderError::Unexpected("provenance generation timed out".to_string())
    })??;

    let filename = format!("{binary_name}.intoto.sig");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&filename)?;
    file.write_all(&envelope)?;

    github::set_output("signed-provenance-name", &filename);
    Ok(())
}
