//! Ed25519 node identity.
//!
//! A node is identified on the network by the libp2p `PeerId` derived from its
//! Ed25519 public key. By default a fresh key is generated on every run; when a
//! key file is configured the same peer ID survives restarts, which keeps
//! scripted benchmark runs pointing at a stable `/p2p/...` address.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ed25519_dalek::SigningKey;
use libp2p::identity::Keypair;
use libp2p::PeerId;
use rand::rngs::OsRng;
use tracing::{debug, info};
use zeroize::Zeroize;

/// Length of a raw Ed25519 secret key on disk.
const SECRET_KEY_LEN: usize = 32;

/// Ed25519 identity for this benchmark node.
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    /// Generate a brand-new random Ed25519 identity.
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        debug!("generated new Ed25519 identity");
        Identity { signing_key }
    }

    /// Load a private key from `path` (raw 32-byte secret key).
    pub fn load(path: &Path) -> Result<Self> {
        let mut bytes = fs::read(path)
            .with_context(|| format!("failed to read identity key from {}", path.display()))?;

        if bytes.len() != SECRET_KEY_LEN {
            let len = bytes.len();
            bytes.zeroize();
            anyhow::bail!("identity key file must be exactly {SECRET_KEY_LEN} bytes, got {len}");
        }

        let mut key_bytes = [0u8; SECRET_KEY_LEN];
        key_bytes.copy_from_slice(&bytes);
        bytes.zeroize();

        let signing_key = SigningKey::from_bytes(&key_bytes);
        key_bytes.zeroize();

        debug!(path = %path.display(), "loaded identity key");
        Ok(Identity { signing_key })
    }

    /// Persist the 32-byte secret key to `path` with mode 0600.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut key_bytes = self.signing_key.to_bytes();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        let written = fs::write(path, key_bytes)
            .with_context(|| format!("failed to write identity key to {}", path.display()));
        key_bytes.zeroize();
        written?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms)
                .with_context(|| format!("failed to set permissions on {}", path.display()))?;
        }

        info!(path = %path.display(), "saved identity key");
        Ok(())
    }

    /// Load an existing identity from `path`, or generate and save a new one.
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!(path = %path.display(), "no identity found, generating new keypair");
            let id = Self::generate();
            id.save(path)?;
            Ok(id)
        }
    }

    /// Resolve the identity from an optional key file.
    pub fn from_key_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_or_generate(path),
            None => Ok(Self::generate()),
        }
    }

    /// Convert into the libp2p keypair used to build the swarm.
    pub fn keypair(&self) -> Result<Keypair> {
        // `ed25519_from_bytes` zeroizes its input.
        Keypair::ed25519_from_bytes(self.signing_key.to_bytes())
            .context("failed to convert Ed25519 key into a libp2p keypair")
    }

    /// Peer ID derived from the public key.
    pub fn peer_id(&self) -> Result<PeerId> {
        Ok(self.keypair()?.public().to_peer_id())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
