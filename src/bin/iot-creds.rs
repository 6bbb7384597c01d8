// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
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

//! IoT Credentials Command-Line Tool
//!
//! Provision a device certificate, exchange it for temporary credentials and
//! call a protected API with them.
//!
//! # Usage
//!
//! ```text
//! iot-creds [OPTIONS] <COMMAND>
//!
//! Commands:
//!   provision    Request a device certificate and store it
//!   credentials  Fetch temporary credentials for a stored device
//!   call         Make a signed request to the protected API
//!   status       Show the stored identity for a device
//!
//! Options:
//!   -c, --config <PATH>   Path to settings file
//!   -v, --verbose         Enable verbose output
//!   -q, --quiet           Suppress non-error output
//!   -h, --help            Print help
//!   -V, --version         Print version
//! ```
//!
//! # Examples
//!
//! ```bash
//! # First run: obtain and store a certificate
//! iot-creds provision --serial SN-0001 --pin 123456
//!
//! # Fetch credentials
//! iot-creds credentials --serial SN-0001
//!
//! # Fetch credentials and keep them next to the certificate
//! iot-creds credentials --serial SN-0001 --write
//!
//! # Call the configured API
//! iot-creds call --serial SN-0001
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use der::Decode;
use time::OffsetDateTime;
use x509_cert::time::Time;
use x509_cert::Certificate;

use iot_credential_provider::settings::{Settings, SettingsLoader};
use iot_credential_provider::tls::parse_pem_certificates;
use iot_credential_provider::{
    CertificateStore, CredentialEndpointClient, ExpiringCredentialCache, ProvisioningClient,
    SigV4Signer, SignedClient, TrustAnchorSet,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// IoT Credentials Command-Line Tool
#[derive(Parser)]
#[command(name = "iot-creds")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Exchange a device certificate for temporary credentials", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to settings file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a device certificate and store it
    Provision {
        /// Device serial number
        #[arg(long, value_name = "SN")]
        serial: String,

        /// Device PIN
        #[arg(long, value_name = "PIN")]
        pin: String,

        /// Replace an already stored certificate
        #[arg(short, long)]
        force: bool,
    },

    /// Fetch temporary credentials for a stored device
    Credentials {
        /// Device serial number
        #[arg(long, value_name = "SN")]
        serial: String,

        /// Print the secret access key and session token
        #[arg(long)]
        show_secrets: bool,

        /// Also write the credentials to the store as 0600 key files
        #[arg(short, long)]
        write: bool,
    },

    /// Make a signed request to the protected API
    Call {
        /// Device serial number
        #[arg(long, value_name = "SN")]
        serial: String,

        /// Override the API URL
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },

    /// Show the stored identity for a device
    Status {
        /// Device serial number
        #[arg(long, value_name = "SN")]
        serial: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        tracing::Level::ERROR
    } else if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run_command(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_command(cli: Cli) -> CliResult<()> {
    match &cli.command {
        Commands::Provision { serial, pin, force } => cmd_provision(&cli, serial, pin, *force).await,
        Commands::Credentials {
            serial,
            show_secrets,
            write,
        } => cmd_credentials(&cli, serial, *show_secrets, *write).await,
        Commands::Call { serial, url } => cmd_call(&cli, serial, url.as_deref()).await,
        Commands::Status { serial } => cmd_status(&cli, serial),
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut loader = SettingsLoader::new();
    if let Some(ref path) = cli.config {
        loader = loader.with_path(path);
    }
    Ok(loader.load()?)
}

fn build_cache(
    settings: &Settings,
    serial: &str,
) -> CliResult<ExpiringCredentialCache<CredentialEndpointClient>> {
    let store = CertificateStore::new(&settings.storage.directory);
    let identity = store.load(serial)?;
    let trust_anchors = TrustAnchorSet::from_file(&settings.trust.root_ca)?;
    let config = settings.to_provider_config()?;

    Ok(ExpiringCredentialCache::from_config(
        config,
        &identity,
        &trust_anchors,
    )?)
}

async fn cmd_provision(
    cli: &Cli,
    serial: &str,
    pin: &str,
    force: bool,
) -> CliResult<()> {
    let settings = load_settings(cli)?;
    let provisioning = settings
        .provisioning
        .as_ref()
        .ok_or("No [provisioning] section in settings")?;

    let store = CertificateStore::new(&settings.storage.directory);
    if store.exists(serial) && !force {
        return Err(format!(
            "A certificate for {} is already stored in {}. Use --force to replace it.",
            serial,
            store.dir().display()
        )
        .into());
    }

    let client = ProvisioningClient::new(&provisioning.url, provisioning.timeout())?;
    let issued = client.provision(serial, pin).await?;

    store.save(
        serial,
        issued.certificate_pem.as_bytes(),
        issued.key_pair.private_key.as_bytes(),
    )?;

    if !cli.quiet {
        println!("Provisioned {}", serial);
        if !issued.certificate_id.is_empty() {
            println!("  Certificate ID: {}", issued.certificate_id);
        }
        println!("  Certificate: {}", store.cert_path(serial)?.display());
        println!("  Private key: {}", store.key_path(serial)?.display());
    }

    Ok(())
}

async fn cmd_credentials(
    cli: &Cli,
    serial: &str,
    show_secrets: bool,
    write: bool,
) -> CliResult<()> {
    let settings = load_settings(cli)?;
    let cache = build_cache(&settings, serial)?;
    let credentials = cache.get_credentials().await?;

    if write {
        let store = CertificateStore::new(&settings.storage.directory);
        for path in store.save_credentials(serial, &credentials)? {
            if !cli.quiet {
                println!("Wrote {}", path.display());
            }
        }
    }

    println!("Access Key ID: {}", credentials.access_key_id);
    if show_secrets {
        println!("Secret Access Key: {}", credentials.secret_access_key);
        println!("Session Token: {}", credentials.session_token);
    }
    println!("Expiration: {}", credentials.expiration);
    if let Some(remaining) = credentials.time_remaining(OffsetDateTime::now_utc()) {
        println!("Valid For: {} minutes", remaining.as_secs() / 60);
    }

    Ok(())
}

async fn cmd_call(
    cli: &Cli,
    serial: &str,
    url: Option<&str>,
) -> CliResult<()> {
    let settings = load_settings(cli)?;
    let api = settings
        .api
        .as_ref()
        .ok_or("No [api] section in settings")?;
    let url = url.unwrap_or(&api.url);

    let cache = Arc::new(build_cache(&settings, serial)?);
    let signer = SigV4Signer::new(&api.region, &api.service);
    let client = SignedClient::new(cache, signer, Duration::from_secs(api.timeout_seconds))?;

    let response = client.get(url).await?;
    let status = response.status();
    let body = response.text().await?;

    if !cli.quiet {
        println!("Status: {}", status);
    }
    println!("{}", body);

    Ok(())
}

fn cmd_status(cli: &Cli, serial: &str) -> CliResult<()> {
    let settings = load_settings(cli)?;
    let store = CertificateStore::new(&settings.storage.directory);

    println!("Device: {}", serial);
    println!("Store: {}", store.dir().display());

    if !store.exists(serial) {
        println!("Identity: Not provisioned");
        return Ok(());
    }

    let identity = store.load(serial)?;
    let certs = parse_pem_certificates(identity.cert_pem())?;
    let leaf = certs.first().ok_or("Certificate file holds no certificates")?;
    let cert = Certificate::from_der(leaf.as_ref())?;

    let validity = &cert.tbs_certificate.validity;
    let not_before = unix_time(&validity.not_before)?;
    let not_after = unix_time(&validity.not_after)?;
    let now = OffsetDateTime::now_utc();

    println!("Identity: Provisioned");
    println!("  Subject: {}", cert.tbs_certificate.subject);
    println!("  Issuer: {}", cert.tbs_certificate.issuer);
    println!("  Not Before: {}", not_before);
    println!("  Not After: {}", not_after);

    if now > not_after {
        println!("  State: Expired");
    } else if now < not_before {
        println!("  State: Not yet valid");
    } else {
        println!("  State: Valid ({} days left)", (not_after - now).whole_days());
    }

    Ok(())
}

fn unix_time(time: &Time) -> CliResult<OffsetDateTime> {
    let since_epoch = match time {
        Time::UtcTime(utc) => utc.to_unix_duration(),
        Time::GeneralTime(general) => general.to_unix_duration(),
    };
    let seconds = i64::try_from(since_epoch.as_secs())?;
    Ok(OffsetDateTime::from_unix_timestamp(seconds)?)
}
