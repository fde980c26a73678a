//! Carrot consensus constants, byte-array aliases, and enote type definitions.
//!
//! Reference: carrot_core/config.h, cryptonote_config.h

use serde::{Deserialize, Serialize};

use crate::TypesError;

// =============================================================================
// Transaction Shape Limits
// =============================================================================

/// Minimum number of outputs in a Carrot transaction.
pub const CARROT_MIN_TX_OUTPUTS: usize = 2;

/// Maximum number of outputs in a Carrot transaction.
pub const CARROT_MAX_TX_OUTPUTS: usize = 8;

/// Minimum number of inputs in a Carrot transaction.
pub const CARROT_MIN_TX_INPUTS: usize = 1;

/// Maximum number of inputs in a Carrot (FCMP++) transaction.
pub const CARROT_MAX_TX_INPUTS: usize = 128;

/// Upper bound on the byte length of `tx.extra`.
pub const MAX_TX_EXTRA_SIZE: usize = 1060;

/// Base fee per unit of weight before the priority multiplier.
pub const DEFAULT_FEE_PER_WEIGHT: u64 = 30;

// =============================================================================
// Sizes
// =============================================================================

pub const KEY_SIZE: usize = 32;
pub const PAYMENT_ID_SIZE: usize = 8;
pub const JANUS_ANCHOR_SIZE: usize = 16;

// =============================================================================
// Byte-array Aliases
// =============================================================================

/// Compressed ed25519 point (spend keys, view keys, one-time addresses).
pub type PublicKey = [u8; KEY_SIZE];

/// Key image of a spent output.
pub type KeyImage = [u8; KEY_SIZE];

/// X25519 (Montgomery u-coordinate) public key, e.g. an enote ephemeral pubkey `D_e`.
pub type X25519PublicKey = [u8; KEY_SIZE];

/// 32-byte ed25519 scalar.
pub type SecretKey = [u8; KEY_SIZE];

/// Cleartext 8-byte payment ID.
pub type PaymentId = [u8; PAYMENT_ID_SIZE];

/// Encrypted 8-byte payment ID (`pid_enc`).
pub type EncryptedPaymentId = [u8; PAYMENT_ID_SIZE];

/// Janus anchor, a.k.a. the per-enote randomness `anchor_norm`.
pub type JanusAnchor = [u8; JANUS_ANCHOR_SIZE];

/// Internal message attached to a self-send enote.
pub type InternalMessage = [u8; KEY_SIZE];

/// The all-zero payment ID, meaning "no payment ID".
pub const NULL_PAYMENT_ID: PaymentId = [0u8; PAYMENT_ID_SIZE];

// =============================================================================
// Enote Types
// =============================================================================

/// Type of a Carrot self-send enote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnoteType {
    Payment,
    Change,
}

impl EnoteType {
    /// The byte committed to inside the amount blinding factor.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Payment => 0,
            Self::Change => 1,
        }
    }
}

impl TryFrom<u8> for EnoteType {
    type Error = TypesError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Payment),
            1 => Ok(Self::Change),
            other => Err(TypesError::UnknownEnoteType(other)),
        }
    }
}

impl std::fmt::Display for EnoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payment => write!(f, "payment"),
            Self::Change => write!(f, "change"),
        }
    }
}

/// Format an atomic-unit amount with 12 decimal places, like `print_money`.
pub fn format_amount(amount: u128) -> String {
    const COIN: u128 = 1_000_000_000_000;
    format!("{}.{:012}", amount / COIN, amount % COIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_limits() {
        assert!(CARROT_MIN_TX_OUTPUTS <= CARROT_MAX_TX_OUTPUTS);
        assert!(CARROT_MIN_TX_INPUTS <= CARROT_MAX_TX_INPUTS);
        assert_eq!(CARROT_MIN_TX_INPUTS, 1);
        assert!(CARROT_MAX_TX_INPUTS >= 2);
    }

    #[test]
    fn test_enote_type_bytes() {
        assert_eq!(EnoteType::Payment.to_u8(), 0);
        assert_eq!(EnoteType::Change.to_u8(), 1);
        assert_eq!(EnoteType::try_from(1).unwrap(), EnoteType::Change);
        assert!(matches!(
            EnoteType::try_from(2),
            Err(TypesError::UnknownEnoteType(2))
        ));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0.000000000000");
        assert_eq!(format_amount(1_500_000_000_000), "1.500000000000");
        assert_eq!(format_amount(369), "0.000000000369");
    }
}
