//! On-chain payment verification.
//!
//! The client pays by transferring the token to the configured payee
//! and presenting the transaction hash in the payment header. We fetch
//! the receipt over JSON-RPC and scan its logs for a qualifying ERC-20
//! `Transfer` to the payee of at least the expected amount. The check
//! is a pure read of ledger state and is safe to repeat concurrently
//! for the same hash.

use commonware_utils::from_hex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::PaymentConfig;

use super::verifier::{VerifyOutcome, TX_HEADER_PREFIX};

/// keccak256("Transfer(address,address,uint256)"), the standard ERC-20
/// transfer event topic.
pub(crate) const TRANSFER_EVENT_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct TransactionReceipt {
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct LogEntry {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

/// Convert a whole-unit amount to the token's 6-decimal base units.
pub(crate) fn to_base_units(amount: f64) -> u64 {
    (amount * 1_000_000.0).round() as u64
}

/// Single JSON-RPC call. Transport failures, timeouts, and RPC error
/// objects all surface as `Err(reason)`.
pub(crate) async fn rpc_call(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Value,
) -> Result<Value, String> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });
    let response = client
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(|err| format!("rpc transport error: {err}"))?;
    let value: Value = response
        .json()
        .await
        .map_err(|err| format!("rpc decode error: {err}"))?;
    if let Some(error) = value.get("error") {
        if !error.is_null() {
            return Err(format!("rpc error: {error}"));
        }
    }
    Ok(value.get("result").cloned().unwrap_or(Value::Null))
}

pub(super) async fn verify(
    client: &reqwest::Client,
    header: &str,
    config: &PaymentConfig,
    expected_amount: f64,
) -> VerifyOutcome {
    let tx_hash = if let Some(rest) = header.strip_prefix(TX_HEADER_PREFIX) {
        rest.to_string()
    } else if header.starts_with("0x") {
        header.to_string()
    } else {
        return VerifyOutcome::rejected(
            "invalid payment header format, expected x402:tx:<txhash>",
        );
    };

    let (rpc_url, usdc_address) = match (config.rpc_url.as_deref(), config.usdc_address.as_deref())
    {
        (Some(rpc_url), Some(usdc_address)) => (rpc_url, usdc_address),
        _ => return VerifyOutcome::rejected("server not configured for on-chain verification"),
    };

    let receipt = match rpc_call(
        client,
        rpc_url,
        "eth_getTransactionReceipt",
        json!([tx_hash]),
    )
    .await
    {
        Ok(receipt) => receipt,
        Err(reason) => return VerifyOutcome::rejected_with_reference(tx_hash, reason),
    };
    if receipt.is_null() {
        return VerifyOutcome::rejected_with_reference(tx_hash, "transaction not found");
    }
    let receipt: TransactionReceipt = match serde_json::from_value(receipt) {
        Ok(receipt) => receipt,
        Err(err) => {
            return VerifyOutcome::rejected_with_reference(
                tx_hash,
                format!("malformed receipt: {err}"),
            )
        }
    };

    let expected_units = to_base_units(expected_amount);
    match evaluate_receipt(&receipt, usdc_address, &config.pay_to, expected_units) {
        Ok(payer) => VerifyOutcome::accepted(tx_hash, Some(payer)),
        Err(reason) => VerifyOutcome::rejected_with_reference(tx_hash, reason),
    }
}

/// Pure half of the check: a mined receipt either proves payment or
/// names the reason it does not.
pub(crate) fn evaluate_receipt(
    receipt: &TransactionReceipt,
    token_address: &str,
    pay_to: &str,
    expected_units: u64,
) -> Result<String, &'static str> {
    if receipt.status.as_deref() != Some("0x1") {
        return Err("transaction reverted");
    }
    find_transfer(receipt, token_address, pay_to, expected_units)
}

/// Scan receipt logs for the first `Transfer` from the token contract
/// that pays the payee at least the expected amount. Returns the sender
/// address on success.
pub(crate) fn find_transfer(
    receipt: &TransactionReceipt,
    token_address: &str,
    pay_to: &str,
    expected_units: u64,
) -> Result<String, &'static str> {
    for log in &receipt.logs {
        if !log.address.eq_ignore_ascii_case(token_address) {
            continue;
        }
        let topic_matches = log
            .topics
            .first()
            .map(|topic| topic.eq_ignore_ascii_case(TRANSFER_EVENT_TOPIC))
            .unwrap_or(false);
        if !topic_matches {
            continue;
        }
        let Some(to) = log.topics.get(2).and_then(|topic| topic_address(topic)) else {
            continue;
        };
        if !to.eq_ignore_ascii_case(pay_to) {
            continue;
        }
        if !word_at_least(&log.data, expected_units) {
            continue;
        }
        let Some(from) = log.topics.get(1).and_then(|topic| topic_address(topic)) else {
            continue;
        };
        return Ok(from);
    }
    Err("no matching transfer found in tx")
}

/// Extract the address from a 32-byte indexed topic.
fn topic_address(topic: &str) -> Option<String> {
    let stripped = topic.strip_prefix("0x")?;
    if stripped.len() != 64 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", &stripped[24..]))
}

/// Compare a hex-encoded big-endian word against an expected amount
/// without going through floats. Values wider than 64 bits trivially
/// qualify.
fn word_at_least(data: &str, expected: u64) -> bool {
    let stripped = data.strip_prefix("0x").unwrap_or(data);
    let Some(bytes) = from_hex(stripped) else {
        return false;
    };
    let significant: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
    if significant.len() > 8 {
        return true;
    }
    let mut value: u64 = 0;
    for byte in significant {
        value = (value << 8) | u64::from(byte);
    }
    value >= expected
}
