//! Signer Identity
//!
//! A node's own BLS key material. Created once and persisted as JSON next
//! to the node; only the registration status changes afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::aggregate::SignatureResult;
use crate::bls::{BlsSecretKey, G1Point, G2Point};
use crate::eip2537::{decode_g1_hex, encode_g1_hex, to_hex};
use crate::error::{SignerError, SignerResult};

/// On-chain registration state of a signer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    #[default]
    Pending,
    Registered,
    Failed,
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationStatus::Pending => write!(f, "pending"),
            RegistrationStatus::Registered => write!(f, "registered"),
            RegistrationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Persisted form
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityFile {
    node_id: String,
    private_key: String,
    public_key: String,
    registration_status: RegistrationStatus,
    created_at: DateTime<Utc>,
}

impl Drop for IdentityFile {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

/// Node key material and registration state
#[derive(Debug, Clone)]
pub struct SignerIdentity {
    node_id: String,
    secret_key: BlsSecretKey,
    public_key: G1Point,
    registration_status: RegistrationStatus,
    created_at: DateTime<Utc>,
    path: Option<PathBuf>,
}

impl SignerIdentity {
    /// Fresh in-memory identity. Without an explicit id the node id is
    /// derived from the public key.
    pub fn generate(node_id: Option<String>) -> Self {
        let secret_key = BlsSecretKey::generate();
        Self::from_secret_key(secret_key, node_id)
    }

    pub fn from_secret_key(secret_key: BlsSecretKey, node_id: Option<String>) -> Self {
        let public_key = secret_key.public_key();
        let node_id = node_id.unwrap_or_else(|| derive_node_id(&public_key));
        Self {
            node_id,
            secret_key,
            public_key,
            registration_status: RegistrationStatus::Pending,
            created_at: Utc::now(),
            path: None,
        }
    }

    /// Load the identity at `path`, or create and persist a new one.
    ///
    /// A configured `node_id` overrides the stored one.
    pub fn load_or_create(path: impl AsRef<Path>, node_id: Option<String>) -> SignerResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            let mut identity = Self::load(path)?;
            if let Some(id) = node_id {
                if id != identity.node_id {
                    warn!(stored = %identity.node_id, configured = %id, "Configured node id overrides stored identity");
                    identity.node_id = id;
                    identity.save()?;
                }
            }
            info!(node_id = %identity.node_id, path = %path.display(), "Loaded signer identity");
            return Ok(identity);
        }

        let mut identity = Self::generate(node_id);
        identity.path = Some(path.to_path_buf());
        identity.save()?;
        info!(node_id = %identity.node_id, path = %path.display(), "Created signer identity");
        Ok(identity)
    }

    /// Load an existing identity file
    pub fn load(path: impl AsRef<Path>) -> SignerResult<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| SignerError::Storage(format!("{}: {}", path.display(), e)))?;
        let file: IdentityFile = serde_json::from_str(&data)?;

        let secret_key = BlsSecretKey::from_hex(&file.private_key)?;
        let public_key = secret_key.public_key();
        let stored = decode_g1_hex(&file.public_key)?;
        if stored != public_key {
            return Err(SignerError::Storage(format!(
                "{}: public key does not match private key",
                path.display()
            )));
        }

        Ok(Self {
            node_id: file.node_id.clone(),
            secret_key,
            public_key,
            registration_status: file.registration_status,
            created_at: file.created_at,
            path: Some(path.to_path_buf()),
        })
    }

    /// Write the identity to its file (no-op for in-memory identities)
    pub fn save(&self) -> SignerResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let file = IdentityFile {
            node_id: self.node_id.clone(),
            private_key: to_hex(&self.secret_key.to_bytes()),
            public_key: encode_g1_hex(&self.public_key),
            registration_status: self.registration_status,
            created_at: self.created_at,
        };
        let data = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| SignerError::Storage(format!("{}: {}", parent.display(), e)))?;
        }
        write_private(path, data.as_bytes())
            .map_err(|e| SignerError::Storage(format!("{}: {}", path.display(), e)))
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn public_key(&self) -> &G1Point {
        &self.public_key
    }

    /// EIP-2537 hex of the public key
    pub fn public_key_hex(&self) -> String {
        encode_g1_hex(&self.public_key)
    }

    pub fn registration_status(&self) -> RegistrationStatus {
        self.registration_status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Update and persist the registration status
    pub fn set_registration_status(&mut self, status: RegistrationStatus) -> SignerResult<()> {
        self.registration_status = status;
        self.save()
    }

    /// Hash `message` with `dst` and sign it
    pub fn sign(&self, message: &[u8], dst: &str) -> SignatureResult {
        let signature: G2Point = self.secret_key.sign_message(message, dst);
        SignatureResult::new(self.node_id.clone(), &signature, &self.public_key)
    }
}

/// Write `data` to a fresh owner-only file next to `path`, then rename it
/// over `path`. The key is never readable by others, not even briefly.
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    // A leftover from an interrupted save may carry looser permissions
    let _ = fs::remove_file(&tmp);

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let result = options.open(&tmp).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)
}

/// `node-` followed by the first 8 bytes of the compressed public key
pub fn derive_node_id(public_key: &G1Point) -> String {
    format!("node-{}", hex::encode(&public_key.to_compressed()[..8]))
}
