// src/config/signing.rs

//! Signing strategies
//!
//! The `[signing]` table is internally tagged by `type`:
//!
//! ```toml
//! [signing]
//! type = "rotate"
//! lineage = "/keys/lineage.bin"
//!
//! [[signing.signers]]
//! type = "key"
//! key = "/keys/old.pk8"
//! cert = "/keys/old.pem"
//!
//! [[signing.signers]]
//! type = "password"
//! keystore = "/keys/new.jks"
//! password_file = "/keys/new.pass"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One signer as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignerSection {
    Key { key: PathBuf, cert: PathBuf },
    Password { keystore: PathBuf, password_file: PathBuf },
}

/// The `[signing]` table as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SigningSection {
    Key {
        key: PathBuf,
        cert: PathBuf,
    },
    Password {
        keystore: PathBuf,
        password_file: PathBuf,
    },
    Rotate {
        lineage: PathBuf,
        #[serde(default)]
        signers: Vec<SignerSection>,
    },
}

/// Keystore password, kept out of debug output
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// A resolved signer: files checked, password read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signer {
    /// PKCS#8 key and PEM certificate
    Key { key: PathBuf, cert: PathBuf },
    /// Password-protected keystore
    Password { keystore: PathBuf, password: Password },
}

/// How the aligned package gets signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningInfo {
    Key { key: PathBuf, cert: PathBuf },
    Password { keystore: PathBuf, password: Password },
    /// V3 key rotation over a lineage made with `apksigner rotate`
    Rotate { lineage: PathBuf, signers: Vec<Signer> },
}

impl SignerSection {
    fn resolve(&self, section: &str) -> Result<Signer> {
        match self {
            Self::Key { key, cert } => Ok(Signer::Key {
                key: existing_file(key, section, "key")?,
                cert: existing_file(cert, section, "cert")?,
            }),
            Self::Password {
                keystore,
                password_file,
            } => Ok(Signer::Password {
                keystore: existing_file(keystore, section, "keystore")?,
                password: read_password(password_file, section)?,
            }),
        }
    }
}

impl SigningSection {
    /// Check the referenced files and read passwords
    pub fn resolve(&self) -> Result<SigningInfo> {
        match self {
            Self::Key { key, cert } => Ok(SigningInfo::Key {
                key: existing_file(key, "signing", "key")?,
                cert: existing_file(cert, "signing", "cert")?,
            }),
            Self::Password {
                keystore,
                password_file,
            } => Ok(SigningInfo::Password {
                keystore: existing_file(keystore, "signing", "keystore")?,
                password: read_password(password_file, "signing")?,
            }),
            Self::Rotate { lineage, signers } => {
                if signers.is_empty() {
                    return Err(Error::Config(
                        "No signers found for rotate signing. Add them as [[signing.signers]] tables"
                            .to_string(),
                    ));
                }
                let signers = signers
                    .iter()
                    .enumerate()
                    .map(|(i, s)| s.resolve(&format!("signing.signers[{}]", i)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(SigningInfo::Rotate {
                    lineage: existing_file(lineage, "signing", "lineage")?,
                    signers,
                })
            }
        }
    }
}

fn existing_file(path: &Path, section: &str, key: &str) -> Result<PathBuf> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "{} in [{}]: {} does not exist",
            key,
            section,
            path.display()
        )));
    }
    if path.is_dir() {
        return Err(Error::Config(format!(
            "{} in [{}]: {} is a directory, expected a file",
            key,
            section,
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

/// Passwords are stored alone in a file; a trailing line break is not part of it
fn read_password(path: &Path, section: &str) -> Result<Password> {
    let path = existing_file(path, section, "password_file")?;
    let text = std::fs::read_to_string(&path).map_err(|e| Error::io_at(&path, e))?;
    Ok(Password::new(text.trim_end_matches(['\r', '\n'])))
}
