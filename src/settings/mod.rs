// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Settings file for the `iot-creds` command line tool.
//!
//! The library itself is configured programmatically through
//! [`ProviderConfig::builder`](crate::ProviderConfig::builder). This module
//! provides the TOML file model used by the CLI and the discovery rules for
//! finding it.
//!
//! # Example Settings
//!
//! ```toml
//! [endpoint]
//! host = "c2example.credentials.iot.us-east-1.amazonaws.com"
//! role_alias = "DeviceRole"
//! safety_window_seconds = 300
//!
//! [trust]
//! root_ca = "/etc/iot-creds/AmazonRootCA1.pem"
//!
//! [provisioning]
//! url = "https://provisioning.example.com/LATEST/getcert"
//!
//! [storage]
//! directory = "/var/lib/iot-creds"
//!
//! [api]
//! url = "https://api.example.com/Prod/hello"
//! region = "us-east-1"
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use iot_credential_provider::settings::SettingsLoader;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = SettingsLoader::new().load()?;
//! let provider_config = settings.to_provider_config()?;
//! # Ok(())
//! # }
//! ```

mod config;
mod loader;

pub use config::*;
pub use loader::SettingsLoader;
