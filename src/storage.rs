//! Local persistence of device certificates and private keys.
//!
//! Each device owns two raw PEM files in the store directory, keyed by
//! serial number: `{serial}cer.pem` and `{serial}pri.pem`. Temporary
//! credentials can be written alongside as `{serial}access.key`,
//! `{serial}session.key` and `{serial}secret.key`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::DeviceIdentity;
use crate::error::{CredentialError, Result};
use crate::types::TemporaryCredentials;

const CERT_SUFFIX: &str = "cer.pem";
const KEY_SUFFIX: &str = "pri.pem";

const CERT_MODE: u32 = 0o644;
const KEY_MODE: u32 = 0o600;

/// Directory-backed store of device identities.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    dir: PathBuf,
}

impl CertificateStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the certificate file for a serial number.
    pub fn cert_path(&self, serial_number: &str) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}{}", check_serial(serial_number)?, CERT_SUFFIX)))
    }

    /// Path of the private key file for a serial number.
    pub fn key_path(&self, serial_number: &str) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}{}", check_serial(serial_number)?, KEY_SUFFIX)))
    }

    /// Returns true if both files exist for the serial number.
    pub fn exists(&self, serial_number: &str) -> bool {
        match (self.cert_path(serial_number), self.key_path(serial_number)) {
            (Ok(cert), Ok(key)) => cert.is_file() && key.is_file(),
            _ => false,
        }
    }

    /// Persist a certificate and private key, replacing any previous pair.
    ///
    /// Both files are written to temporaries in the store directory and only
    /// renamed into place once both writes have succeeded. The key file is
    /// created with mode 0600 on Unix.
    pub fn save(&self, serial_number: &str, cert_pem: &[u8], key_pem: &[u8]) -> Result<()> {
        let cert_path = self.cert_path(serial_number)?;
        let key_path = self.key_path(serial_number)?;

        fs::create_dir_all(&self.dir).map_err(|e| {
            CredentialError::storage(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        replace_files(&[
            (cert_path, cert_pem, CERT_MODE),
            (key_path, key_pem, KEY_MODE),
        ])?;

        tracing::info!("Stored identity for {} in {}", serial_number, self.dir.display());
        Ok(())
    }

    /// Path of a credential value file, e.g. `{serial}access.key`.
    pub fn credential_path(&self, serial_number: &str, kind: &str) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}{}.key", check_serial(serial_number)?, kind)))
    }

    /// Write the access key id, session token and secret access key as
    /// `{serial}access.key`, `{serial}session.key` and `{serial}secret.key`.
    ///
    /// Every file is created with mode 0600 on Unix. Returns the paths in
    /// that order.
    pub fn save_credentials(
        &self,
        serial_number: &str,
        credentials: &TemporaryCredentials,
    ) -> Result<Vec<PathBuf>> {
        let access_path = self.credential_path(serial_number, "access")?;
        let session_path = self.credential_path(serial_number, "session")?;
        let secret_path = self.credential_path(serial_number, "secret")?;

        fs::create_dir_all(&self.dir).map_err(|e| {
            CredentialError::storage(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        replace_files(&[
            (access_path.clone(), credentials.access_key_id.as_bytes(), KEY_MODE),
            (session_path.clone(), credentials.session_token.as_bytes(), KEY_MODE),
            (secret_path.clone(), credentials.secret_access_key.as_bytes(), KEY_MODE),
        ])?;

        tracing::debug!("Stored credentials for {} in {}", serial_number, self.dir.display());
        Ok(vec![access_path, session_path, secret_path])
    }

    /// Load the identity for a serial number. The serial number doubles as
    /// the thing name.
    pub fn load(&self, serial_number: &str) -> Result<DeviceIdentity> {
        let cert_pem = read_file(&self.cert_path(serial_number)?)?;
        let key_pem = read_file(&self.key_path(serial_number)?)?;
        Ok(DeviceIdentity::new(cert_pem, key_pem, serial_number))
    }
}

fn check_serial(serial_number: &str) -> Result<&str> {
    let invalid = serial_number.is_empty()
        || serial_number.contains(|c| c == '/' || c == '\\')
        || serial_number == "."
        || serial_number == "..";
    if invalid {
        return Err(CredentialError::config(format!(
            "invalid serial number: {:?}",
            serial_number
        )));
    }
    Ok(serial_number)
}

/// Write every file to a temporary next to its target, then rename them all
/// into place. Nothing is renamed unless every write succeeded.
fn replace_files(files: &[(PathBuf, &[u8], u32)]) -> Result<()> {
    let temps: Vec<PathBuf> = files.iter().map(|(path, _, _)| temp_path(path)).collect();

    let result = files
        .iter()
        .zip(&temps)
        .try_for_each(|((_, contents, mode), tmp)| write_new_file(tmp, contents, *mode))
        .and_then(|()| {
            files
                .iter()
                .zip(&temps)
                .try_for_each(|((path, _, _), tmp)| rename(tmp, path))
        });

    if result.is_err() {
        for tmp in &temps {
            let _ = fs::remove_file(tmp);
        }
    }
    result
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Create `path` afresh with `mode` and write `contents` to it.
fn write_new_file(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    // A leftover temporary from an interrupted save may carry other permissions
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(CredentialError::storage(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            )))
        }
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    set_mode(&mut options, mode);

    let write = || -> std::io::Result<()> {
        let mut file = options.open(path)?;
        file.write_all(contents)?;
        file.sync_all()
    };
    write().map_err(|e| {
        CredentialError::storage(format!("Failed to write {}: {}", path.display(), e))
    })
}

#[cfg(unix)]
fn set_mode(options: &mut fs::OpenOptions, mode: u32) {
    use std::os::unix::fs::OpenOptionsExt;

    options.mode(mode);
}

#[cfg(not(unix))]
fn set_mode(_options: &mut fs::OpenOptions, _mode: u32) {}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| {
        CredentialError::storage(format!("Failed to move {} into place: {}", to.display(), e))
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CredentialError::storage(format!("{} does not exist", path.display()))
        } else {
            CredentialError::storage(format!("Failed to read {}: {}", path.display(), e))
        }
    })
}
