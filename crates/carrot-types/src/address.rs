//! Carrot destinations and subaddress indices.
//!
//! A destination is the decoded form of a Carrot address as the transaction
//! builder sees it: two public keys, a subaddress bit, and an optional payment
//! ID (non-null only for integrated addresses).

use serde::{Deserialize, Serialize};

use crate::constants::{PaymentId, PublicKey, NULL_PAYMENT_ID};

/// A payment destination (main address, subaddress, or integrated address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CarrotDestination {
    /// Address spend public key (K^j_s).
    pub address_spend_pubkey: PublicKey,
    /// Address view public key (K^j_v).
    pub address_view_pubkey: PublicKey,
    /// Whether the address is a subaddress.
    pub is_subaddress: bool,
    /// Payment ID, [`NULL_PAYMENT_ID`] unless this is an integrated address.
    pub payment_id: PaymentId,
}

impl CarrotDestination {
    /// Main address destination.
    pub fn main_address(address_spend_pubkey: PublicKey, address_view_pubkey: PublicKey) -> Self {
        Self {
            address_spend_pubkey,
            address_view_pubkey,
            is_subaddress: false,
            payment_id: NULL_PAYMENT_ID,
        }
    }

    /// Subaddress destination.
    pub fn subaddress(address_spend_pubkey: PublicKey, address_view_pubkey: PublicKey) -> Self {
        Self {
            address_spend_pubkey,
            address_view_pubkey,
            is_subaddress: true,
            payment_id: NULL_PAYMENT_ID,
        }
    }

    /// Integrated address destination (main address + payment ID).
    pub fn integrated_address(
        address_spend_pubkey: PublicKey,
        address_view_pubkey: PublicKey,
        payment_id: PaymentId,
    ) -> Self {
        Self {
            address_spend_pubkey,
            address_view_pubkey,
            is_subaddress: false,
            payment_id,
        }
    }

    pub fn is_integrated(&self) -> bool {
        self.payment_id != NULL_PAYMENT_ID
    }
}

/// How the keys of a subaddress are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AddressDeriveType {
    /// Pick based on the account type.
    #[default]
    Auto,
    /// Legacy CryptoNote subaddress derivation.
    PreCarrot,
    /// Carrot subaddress derivation.
    Carrot,
}

/// Subaddress index together with its derivation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SubaddressIndexExtended {
    pub major: u32,
    pub minor: u32,
    pub derive_type: AddressDeriveType,
}

impl SubaddressIndexExtended {
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            derive_type: AddressDeriveType::Auto,
        }
    }

    /// Index (0, 0), the main address.
    pub fn main() -> Self {
        Self::default()
    }

    pub fn is_main(&self) -> bool {
        self.major == 0 && self.minor == 0
    }
}
