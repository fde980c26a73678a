//! Payment proposals and input descriptors.
//!
//! Plain value types handed to the proposal builder: outgoing payments,
//! self-sends, and the inputs the wallet may spend. Also holds the small
//! random generators used when the builder fills in missing components.

use carrot_types::{
    constants::InternalMessage, CarrotDestination, EncryptedPaymentId, EnoteType, JanusAnchor,
    KeyImage, PublicKey, SubaddressIndexExtended, X25519PublicKey,
};
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::montgomery::MontgomeryPoint;
use rand::rngs::StdRng;
use rand::{CryptoRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// An outgoing payment to someone else's address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProposal {
    pub destination: CarrotDestination,
    /// Amount in atomic units.
    pub amount: u64,
    /// Per-enote randomness (`anchor_norm`); must be non-zero and unique.
    pub randomness: JanusAnchor,
}

impl PaymentProposal {
    /// Create a proposal with fresh randomness.
    pub fn new<R: RngCore + CryptoRng>(destination: CarrotDestination, amount: u64, rng: &mut R) -> Self {
        Self {
            destination,
            amount,
            randomness: gen_janus_anchor(rng),
        }
    }
}

/// A payment back to the sender's own wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfSendPaymentProposal {
    /// Spend public key of the receiving (sub)address.
    pub destination_address_spend_pubkey: PublicKey,
    pub amount: u64,
    pub enote_type: EnoteType,
    /// Enote ephemeral pubkey `D_e`; the builder fills it in when unset.
    pub enote_ephemeral_pubkey: Option<X25519PublicKey>,
    pub internal_message: Option<InternalMessage>,
}

impl SelfSendPaymentProposal {
    pub fn new(destination_address_spend_pubkey: PublicKey, amount: u64, enote_type: EnoteType) -> Self {
        Self {
            destination_address_spend_pubkey,
            amount,
            enote_type,
            enote_ephemeral_pubkey: None,
            internal_message: None,
        }
    }
}

/// A self-send together with the subaddress index it pays to, so the wallet
/// can later verify the destination key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiableSelfSendProposal {
    pub proposal: SelfSendPaymentProposal,
    pub subaddr_index: SubaddressIndexExtended,
}

impl VerifiableSelfSendProposal {
    pub fn new(proposal: SelfSendPaymentProposal, subaddr_index: SubaddressIndexExtended) -> Self {
        Self {
            proposal,
            subaddr_index,
        }
    }
}

/// An input chosen for spending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedInput {
    pub amount: u64,
    pub key_image: KeyImage,
}

/// A spendable output known to the wallet, with the metadata input selection
/// needs to rank it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputCandidate {
    pub core: SelectedInput,
    /// Received before the Carrot upgrade (not forward-secret).
    pub is_pre_carrot: bool,
    /// Received from someone else, as opposed to an internal self-send.
    pub is_external: bool,
    /// Block in which the output was received.
    pub block_index: u64,
}

impl InputCandidate {
    pub fn new(
        amount: u64,
        key_image: KeyImage,
        is_pre_carrot: bool,
        is_external: bool,
        block_index: u64,
    ) -> Self {
        Self {
            core: SelectedInput { amount, key_image },
            is_pre_carrot,
            is_external,
            block_index,
        }
    }

    pub fn amount(&self) -> u64 {
        self.core.amount
    }

    pub fn key_image(&self) -> &KeyImage {
        &self.core.key_image
    }
}

// ─── Random components ───────────────────────────────────────────────────────

/// Fresh non-zero Janus anchor.
pub fn gen_janus_anchor<R: RngCore + CryptoRng>(rng: &mut R) -> JanusAnchor {
    let mut anchor = JanusAnchor::default();
    while anchor == JanusAnchor::default() {
        rng.fill_bytes(&mut anchor);
    }
    anchor
}

/// Random encrypted payment ID, used when no integrated address is paid.
pub fn gen_encrypted_payment_id<R: RngCore + CryptoRng>(rng: &mut R) -> EncryptedPaymentId {
    let mut pid = EncryptedPaymentId::default();
    rng.fill_bytes(&mut pid);
    pid
}

/// Random X25519 public key `d * B` for a clamped random scalar `d`.
pub fn gen_x25519_pubkey<R: RngCore + CryptoRng>(rng: &mut R) -> X25519PublicKey {
    let mut scalar = [0u8; 32];
    rng.fill_bytes(&mut scalar);
    MontgomeryPoint::mul_base_clamped(scalar).to_bytes()
}

/// Independent generator seeded from `rng`, for strategies that outlive a
/// single borrow of the caller's generator.
pub(crate) fn child_rng<R: RngCore + CryptoRng>(rng: &mut R) -> StdRng {
    let mut seed = [0u8; 32];
    rng.fill_bytes(&mut seed);
    StdRng::from_seed(seed)
}

/// Random ed25519 public key in the prime-order subgroup.
fn gen_ed25519_pubkey<R: RngCore + CryptoRng>(rng: &mut R) -> PublicKey {
    let mut scalar = [0u8; 32];
    rng.fill_bytes(&mut scalar);
    EdwardsPoint::mul_base_clamped(scalar).compress().to_bytes()
}

/// Random main address, the destination of dummy outputs.
pub fn gen_main_address<R: RngCore + CryptoRng>(rng: &mut R) -> CarrotDestination {
    let spend = gen_ed25519_pubkey(rng);
    let view = gen_ed25519_pubkey(rng);
    CarrotDestination::main_address(spend, view)
}
