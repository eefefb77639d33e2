//! On-chain settlement.
//!
//! After a verified on-chain game completes, the result is recorded on
//! the payout contract via `recordGame(address,uint256,bool,uint256)`,
//! signed with the game server's key and submitted as a legacy EIP-155
//! transaction. Settlement is advisory bookkeeping on top of an
//! already-verified wager: failures are reported to the caller, who
//! logs them and moves on, and nothing here deduplicates concurrent
//! attempts for the same game.

use std::time::Duration;

use commonware_utils::{from_hex, hex};
use k256::ecdsa::{signature::hazmat::PrehashSigner, RecoveryId, Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde_json::json;
use thiserror::Error;

use crate::config::PaymentConfig;

use super::onchain::{rpc_call, to_base_units};

const RECORD_GAME_SIGNATURE: &str = "recordGame(address,uint256,bool,uint256)";
const SETTLE_GAS_LIMIT: u64 = 200_000;
const RECEIPT_POLL_ATTEMPTS: u32 = 10;
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum SettleError {
    #[error("server not configured for on-chain settlement")]
    NotConfigured,
    #[error("invalid {field}")]
    InvalidField { field: &'static str },
    #[error("rpc failure: {0}")]
    Rpc(String),
    #[error("signing failure: {0}")]
    Signing(String),
    #[error("settlement transaction reverted: {0}")]
    Reverted(String),
    #[error("timed out waiting for settlement receipt: {0}")]
    ReceiptTimeout(String),
}

/// Record a completed game on the payout contract. Returns the
/// settlement transaction hash once it is mined.
pub async fn record_game(
    client: &reqwest::Client,
    config: &PaymentConfig,
    player: &str,
    bet: f64,
    won: bool,
    payout: f64,
) -> Result<String, SettleError> {
    let (rpc_url, payout_address, private_key) = match (
        config.rpc_url.as_deref(),
        config.payout_address.as_deref(),
        config.game_server_private_key.as_deref(),
    ) {
        (Some(rpc_url), Some(payout_address), Some(private_key)) => {
            (rpc_url, payout_address, private_key)
        }
        _ => return Err(SettleError::NotConfigured),
    };

    let key_bytes = from_hex(private_key.strip_prefix("0x").unwrap_or(private_key)).ok_or(
        SettleError::InvalidField {
            field: "game_server_private_key",
        },
    )?;
    let signing_key = SigningKey::from_slice(&key_bytes)
        .map_err(|err| SettleError::Signing(err.to_string()))?;
    let from = signer_address(&signing_key);

    let calldata = encode_record_game(player, to_base_units(bet), won, to_base_units(payout))?;
    let to = address_bytes(payout_address).ok_or(SettleError::InvalidField {
        field: "payout_address",
    })?;

    let nonce = fetch_quantity(
        client,
        rpc_url,
        "eth_getTransactionCount",
        json!([from, "pending"]),
    )
    .await?;
    let gas_price = fetch_quantity(client, rpc_url, "eth_gasPrice", json!([])).await?;
    let chain_id = fetch_quantity(client, rpc_url, "eth_chainId", json!([])).await?;

    let raw = sign_legacy_transaction(
        &signing_key,
        nonce,
        gas_price,
        SETTLE_GAS_LIMIT,
        &to,
        &calldata,
        chain_id,
    )?;

    let tx_hash = rpc_call(
        client,
        rpc_url,
        "eth_sendRawTransaction",
        json!([format!("0x{}", hex(&raw))]),
    )
    .await
    .map_err(SettleError::Rpc)?;
    let tx_hash = tx_hash
        .as_str()
        .ok_or_else(|| SettleError::Rpc("non-string transaction hash".to_string()))?
        .to_string();

    wait_for_receipt(client, rpc_url, &tx_hash).await?;
    Ok(tx_hash)
}

async fn wait_for_receipt(
    client: &reqwest::Client,
    rpc_url: &str,
    tx_hash: &str,
) -> Result<(), SettleError> {
    for _ in 0..RECEIPT_POLL_ATTEMPTS {
        let receipt = rpc_call(
            client,
            rpc_url,
            "eth_getTransactionReceipt",
            json!([tx_hash]),
        )
        .await
        .map_err(SettleError::Rpc)?;
        if !receipt.is_null() {
            let status = receipt.get("status").and_then(|status| status.as_str());
            if status == Some("0x1") {
                return Ok(());
            }
            return Err(SettleError::Reverted(tx_hash.to_string()));
        }
        tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
    }
    Err(SettleError::ReceiptTimeout(tx_hash.to_string()))
}

async fn fetch_quantity(
    client: &reqwest::Client,
    rpc_url: &str,
    method: &'static str,
    params: serde_json::Value,
) -> Result<u64, SettleError> {
    let value = rpc_call(client, rpc_url, method, params)
        .await
        .map_err(SettleError::Rpc)?;
    let quantity = value
        .as_str()
        .and_then(|raw| u64::from_str_radix(raw.strip_prefix("0x").unwrap_or(raw), 16).ok())
        .ok_or_else(|| SettleError::Rpc(format!("{method} returned a non-quantity: {value}")))?;
    Ok(quantity)
}

/// The 0x-prefixed address controlled by a signing key: the low 20
/// bytes of the Keccak-256 of the uncompressed public key.
fn signer_address(key: &SigningKey) -> String {
    use sha3::{Digest, Keccak256};
    let public = key.verifying_key().to_encoded_point(false);
    let digest = Keccak256::digest(&public.as_bytes()[1..]);
    format!("0x{}", hex(&digest[12..]))
}

fn address_bytes(address: &str) -> Option<Vec<u8>> {
    let stripped = address.strip_prefix("0x")?;
    let bytes = from_hex(stripped)?;
    (bytes.len() == 20).then_some(bytes)
}

/// ABI-encode the `recordGame` call: 4-byte selector plus four 32-byte
/// words (address, uint256, bool, uint256).
fn encode_record_game(
    player: &str,
    bet_units: u64,
    won: bool,
    payout_units: u64,
) -> Result<Vec<u8>, SettleError> {
    use sha3::{Digest, Keccak256};
    let player_bytes = address_bytes(player).ok_or(SettleError::InvalidField {
        field: "player_address",
    })?;
    let selector = Keccak256::digest(RECORD_GAME_SIGNATURE.as_bytes());
    let mut calldata = selector[..4].to_vec();
    calldata.extend_from_slice(&abi_address(&player_bytes));
    calldata.extend_from_slice(&abi_u64(bet_units));
    calldata.extend_from_slice(&abi_bool(won));
    calldata.extend_from_slice(&abi_u64(payout_units));
    Ok(calldata)
}

fn abi_address(address: &[u8]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address);
    word
}

fn abi_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn abi_bool(value: bool) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[31] = u8::from(value);
    word
}

/// Sign an EIP-155 legacy transaction and return the raw RLP bytes for
/// `eth_sendRawTransaction`.
#[allow(clippy::too_many_arguments)]
fn sign_legacy_transaction(
    key: &SigningKey,
    nonce: u64,
    gas_price: u64,
    gas_limit: u64,
    to: &[u8],
    data: &[u8],
    chain_id: u64,
) -> Result<Vec<u8>, SettleError> {
    use sha3::{Digest, Keccak256};

    let unsigned = rlp_list(&[
        rlp_uint(nonce),
        rlp_uint(gas_price),
        rlp_uint(gas_limit),
        rlp_bytes(to),
        rlp_uint(0), // value
        rlp_bytes(data),
        rlp_uint(chain_id),
        rlp_uint(0),
        rlp_uint(0),
    ]);
    let signing_hash = Keccak256::digest(&unsigned);

    let (signature, recovery_id): (Signature, RecoveryId) = key
        .sign_prehash(&signing_hash)
        .map_err(|err| SettleError::Signing(err.to_string()))?;
    // Ethereum requires low-s; flip the recovery parity if we normalize.
    let (signature, recovery_id) = match signature.normalize_s() {
        Some(normalized) => {
            let flipped = RecoveryId::from_byte(recovery_id.to_byte() ^ 1)
                .ok_or_else(|| SettleError::Signing("invalid recovery id".to_string()))?;
            (normalized, flipped)
        }
        None => (signature, recovery_id),
    };

    let v = 35 + chain_id * 2 + u64::from(recovery_id.to_byte());
    let r = signature.r().to_bytes();
    let s = signature.s().to_bytes();

    Ok(rlp_list(&[
        rlp_uint(nonce),
        rlp_uint(gas_price),
        rlp_uint(gas_limit),
        rlp_bytes(to),
        rlp_uint(0),
        rlp_bytes(data),
        rlp_uint(v),
        rlp_uint_be(&r),
        rlp_uint_be(&s),
    ]))
}

// Minimal RLP for the one transaction shape we emit.

fn rlp_length_prefix(len: usize, offset: u8) -> Vec<u8> {
    if len < 56 {
        vec![offset + len as u8]
    } else {
        let len_bytes = trim_leading_zeros(&(len as u64).to_be_bytes());
        let mut out = vec![offset + 55 + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out
    }
}

fn rlp_bytes(payload: &[u8]) -> Vec<u8> {
    if payload.len() == 1 && payload[0] < 0x80 {
        return payload.to_vec();
    }
    let mut out = rlp_length_prefix(payload.len(), 0x80);
    out.extend_from_slice(payload);
    out
}

fn rlp_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: Vec<u8> = items.iter().flatten().copied().collect();
    let mut out = rlp_length_prefix(payload.len(), 0xc0);
    out.extend_from_slice(&payload);
    out
}

fn rlp_uint(value: u64) -> Vec<u8> {
    rlp_uint_be(&value.to_be_bytes())
}

/// RLP-encode a big-endian integer: leading zeros stripped, zero itself
/// encoded as the empty byte string.
fn rlp_uint_be(bytes: &[u8]) -> Vec<u8> {
    rlp_bytes(&trim_leading_zeros(bytes))
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().copied().skip_while(|b| *b == 0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // First dev account of the standard anvil/hardhat mnemonic.
    const ANVIL_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ANVIL_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    #[test]
    fn rlp_canonical_vectors() {
        assert_eq!(rlp_bytes(b""), vec![0x80]);
        assert_eq!(rlp_bytes(b"dog"), vec![0x83, b'd', b'o', b'g']);
        assert_eq!(rlp_bytes(&[0x00]), vec![0x00]);
        assert_eq!(rlp_bytes(&[0x7f]), vec![0x7f]);
        assert_eq!(
            rlp_list(&[rlp_bytes(b"cat"), rlp_bytes(b"dog")]),
            vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );
        assert_eq!(rlp_list(&[]), vec![0xc0]);
        assert_eq!(rlp_uint(0), vec![0x80]);
        assert_eq!(rlp_uint(15), vec![0x0f]);
        assert_eq!(rlp_uint(1024), vec![0x82, 0x04, 0x00]);
    }

    #[test]
    fn rlp_long_string_prefix() {
        let payload = vec![b'a'; 60];
        let encoded = rlp_bytes(&payload);
        assert_eq!(encoded[0], 0xb8);
        assert_eq!(encoded[1], 60);
        assert_eq!(&encoded[2..], payload.as_slice());
    }

    #[test]
    fn record_game_calldata_shape() {
        let calldata = encode_record_game(
            "0x2222222222222222222222222222222222222222",
            500_000,
            true,
            980_000,
        )
        .unwrap();
        // selector + 4 words
        assert_eq!(calldata.len(), 4 + 32 * 4);
        // address word is left-padded
        assert_eq!(&calldata[4..16], &[0u8; 12]);
        assert_eq!(&calldata[16..36], &[0x22u8; 20]);
        // bool word
        assert_eq!(calldata[4 + 32 * 2 + 31], 1);
        // amounts are big-endian right-aligned
        assert_eq!(
            u64::from_be_bytes(calldata[4 + 32 + 24..4 + 32 * 2].try_into().unwrap()),
            500_000
        );
    }

    #[test]
    fn signer_address_matches_known_key() {
        let key_bytes = from_hex(ANVIL_KEY).unwrap();
        let key = SigningKey::from_slice(&key_bytes).unwrap();
        assert_eq!(signer_address(&key), ANVIL_ADDRESS);
    }

    #[test]
    fn signed_transaction_is_decodable_rlp() {
        let key = SigningKey::from_slice(&from_hex(ANVIL_KEY).unwrap()).unwrap();
        let to = address_bytes("0x1111111111111111111111111111111111111111").unwrap();
        let raw =
            sign_legacy_transaction(&key, 0, 1_000_000_000, SETTLE_GAS_LIMIT, &to, &[0xab], 31337)
                .unwrap();
        // A list prefix followed by exactly the declared payload length.
        assert!(raw[0] > 0xc0);
        let (prefix_len, payload_len) = if raw[0] <= 0xf7 {
            (1, usize::from(raw[0] - 0xc0))
        } else {
            let len_of_len = usize::from(raw[0] - 0xf7);
            let mut len = 0usize;
            for byte in &raw[1..1 + len_of_len] {
                len = (len << 8) | usize::from(*byte);
            }
            (1 + len_of_len, len)
        };
        assert_eq!(raw.len(), prefix_len + payload_len);
    }

    #[test]
    fn signing_is_deterministic() {
        let key = SigningKey::from_slice(&from_hex(ANVIL_KEY).unwrap()).unwrap();
        let to = address_bytes("0x1111111111111111111111111111111111111111").unwrap();
        let a = sign_legacy_transaction(&key, 1, 2, 3, &to, b"data", 8453).unwrap();
        let b = sign_legacy_transaction(&key, 1, 2, 3, &to, b"data", 8453).unwrap();
        assert_eq!(a, b);
    }
}
