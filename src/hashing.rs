// src/hashing.rs
//! Domain-to-key derivation
//!
//! A relayer is identified by a digest of its domain string. The digest is
//! only used as a deterministic key, so the function is a swappable strategy.

use crate::types::RelayerKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

/// Derives a relayer key from a human-readable domain
pub trait DomainHasher: Send + Sync {
    fn relayer_key(&self, domain: &str) -> RelayerKey;
}

/// Keccak-256 over the UTF-8 bytes of the domain.
///
/// Matches `soliditySha3(domain)` for a single string argument, so keys of
/// relayers registered on the EVM deployment stay readable.
#[derive(Debug, Clone, Copy, Default)]
pub struct Keccak256Hasher;

impl DomainHasher for Keccak256Hasher {
    fn relayer_key(&self, domain: &str) -> RelayerKey {
        let mut hasher = Keccak::v256();
        hasher.update(domain.as_bytes());
        let mut out = [0u8; 32];
        hasher.finalize(&mut out);
        RelayerKey(out)
    }
}

/// SHA-256 over the UTF-8 bytes of the domain
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl DomainHasher for Sha256Hasher {
    fn relayer_key(&self, domain: &str) -> RelayerKey {
        let digest = Sha256::digest(domain.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        RelayerKey(out)
    }
}

/// Hasher selection as it appears in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HasherKind {
    #[default]
    Keccak256,
    Sha256,
}

impl HasherKind {
    pub fn build(self) -> Box<dyn DomainHasher> {
        match self {
            HasherKind::Keccak256 => Box::new(Keccak256Hasher),
            HasherKind::Sha256 => Box::new(Sha256Hasher),
        }
    }
}

impl std::str::FromStr for HasherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keccak256" | "keccak" => Ok(HasherKind::Keccak256),
            "sha256" => Ok(HasherKind::Sha256),
            other => Err(format!("Unknown domain hasher: {}", other)),
        }
    }
}
