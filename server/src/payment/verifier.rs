use commonware_utils::hex;
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;

use crate::config::PaymentConfig;

use super::onchain;

/// Header marker for dev payments: `x402:dev:<reference>`.
pub const DEV_HEADER_PREFIX: &str = "x402:dev:";
/// Header marker for on-chain payments: `x402:tx:<txhash>`.
pub const TX_HEADER_PREFIX: &str = "x402:tx:";

/// Typed verification result. Verifiers never panic and never return a
/// transport error directly; every failure is a `valid: false` outcome
/// with a reason the gate can echo back to the caller.
#[derive(Clone, Debug, Default)]
pub struct VerifyOutcome {
    pub valid: bool,
    pub tx_reference: Option<String>,
    pub payer_address: Option<String>,
    pub error: Option<String>,
}

impl VerifyOutcome {
    pub fn accepted(tx_reference: String, payer_address: Option<String>) -> Self {
        Self {
            valid: true,
            tx_reference: Some(tx_reference),
            payer_address,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            tx_reference: None,
            payer_address: None,
            error: Some(error.into()),
        }
    }

    pub fn rejected_with_reference(tx_reference: String, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            tx_reference: Some(tx_reference),
            payer_address: None,
            error: Some(error.into()),
        }
    }
}

/// The swappable verification strategies behind one contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verifier {
    /// Demo flow: any non-empty header passes.
    HeaderAccept,
    /// Real ledger check against the configured token contract.
    Onchain,
}

impl Verifier {
    pub async fn verify(
        &self,
        client: &reqwest::Client,
        header: &str,
        config: &PaymentConfig,
        expected_amount: f64,
    ) -> VerifyOutcome {
        match self {
            Verifier::HeaderAccept => header_accept(header),
            Verifier::Onchain => onchain::verify(client, header, config, expected_amount).await,
        }
    }
}

/// Demo verifier: exercises the 402 handshake shape without a ledger.
/// A recognized `x402:dev:<ref>` marker yields the embedded reference;
/// any other non-empty header gets a synthesized one.
fn header_accept(header: &str) -> VerifyOutcome {
    if header.is_empty() {
        return VerifyOutcome::rejected("empty payment header");
    }
    if let Some(rest) = header.strip_prefix(DEV_HEADER_PREFIX) {
        let reference = rest.split(':').next().unwrap_or("");
        let reference = if reference.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            reference.to_string()
        };
        return VerifyOutcome::accepted(reference, None);
    }
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    VerifyOutcome::accepted(format!("0x{}", hex(&bytes)), None)
}
