//! Core types and constants for Carrot transaction construction.
//!
//! This crate provides the foundational types shared by the transaction
//! crates: consensus shape limits, byte-array aliases for keys and key images,
//! enote types, destinations, and subaddress indices.

pub mod address;
pub mod constants;

pub use address::{AddressDeriveType, CarrotDestination, SubaddressIndexExtended};
pub use constants::{
    EncryptedPaymentId, EnoteType, JanusAnchor, KeyImage, PaymentId, PublicKey, X25519PublicKey,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("unknown enote type: {0}")]
    UnknownEnoteType(u8),
}
