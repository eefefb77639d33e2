//! Commit-reveal fairness engine.
//!
//! Each game run is backed by a 32-byte server seed and a 16-byte nonce,
//! both generated fresh from the OS entropy source. The commitment is
//! `SHA-256(serverSeed || nonce)`; outcomes are derived from
//! `SHA-256(serverSeed || clientSeed || discriminator)` where the
//! discriminator is the nonce plus a positional suffix, so a single seed
//! pair backs many independent draws without correlating them.
//!
//! Known limitation, preserved on purpose: the commitment hash and the
//! revealed seed ship in the same response, so the scheme proves the
//! outcome was a deterministic function of the published inputs but does
//! not stop the server from picking seeds after seeing the client seed.
//! A two-phase handshake would fix that and is out of scope here.

use commonware_cryptography::{sha256::Sha256, Hasher};
use commonware_utils::hex;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

/// Client seed used when the caller does not provide one.
pub const DEFAULT_CLIENT_SEED: &str = "default";

/// Commitment to a server seed, publishable before the outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairnessCommitment {
    pub server_seed_hash: String,
    pub nonce: String,
}

/// Everything a player needs to recompute a game outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairnessProof {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: String,
    pub combined_hash: String,
}

/// Generate a fresh 32-byte server seed, hex-encoded.
pub fn generate_server_seed() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex(&bytes)
}

/// Generate a fresh 16-byte nonce, hex-encoded.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex(&bytes)
}

/// SHA-256 of a UTF-8 string, hex-encoded.
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex(hasher.finalize().as_ref())
}

/// Create the commitment for a seed/nonce pair.
pub fn commitment(server_seed: &str, nonce: &str) -> FairnessCommitment {
    FairnessCommitment {
        server_seed_hash: sha256_hex(&format!("{server_seed}{nonce}")),
        nonce: nonce.to_string(),
    }
}

/// Derive a uniform value in `[0, 1)` from the seed pair.
///
/// The first four bytes of `SHA-256(serverSeed || clientSeed ||
/// discriminator)` are read as a big-endian u32 and divided by 2^32.
/// Pure: identical inputs always produce the identical output.
pub fn derive_uniform(server_seed: &str, client_seed: &str, discriminator: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(server_seed.as_bytes());
    hasher.update(client_seed.as_bytes());
    hasher.update(discriminator.as_bytes());
    let digest = hasher.finalize();
    let bytes = digest.as_ref();
    let value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    f64::from(value) / 4_294_967_296.0
}

/// Build the full proof revealed alongside a finished game.
pub fn build_proof(server_seed: &str, client_seed: &str, nonce: &str) -> FairnessProof {
    FairnessProof {
        server_seed: server_seed.to_string(),
        server_seed_hash: sha256_hex(&format!("{server_seed}{nonce}")),
        client_seed: client_seed.to_string(),
        nonce: nonce.to_string(),
        combined_hash: sha256_hex(&format!("{server_seed}{client_seed}{nonce}")),
    }
}

/// Check a proof against its own fields.
///
/// Recomputes both hashes; a mismatch in any field yields `false`.
/// Never panics, regardless of how malformed the proof is.
pub fn verify_proof(proof: &FairnessProof) -> bool {
    let expected_hash = sha256_hex(&format!("{}{}", proof.server_seed, proof.nonce));
    if expected_hash != proof.server_seed_hash {
        return false;
    }
    let expected_combined = sha256_hex(&format!(
        "{}{}{}",
        proof.server_seed, proof.client_seed, proof.nonce
    ));
    expected_combined == proof.combined_hash
}
