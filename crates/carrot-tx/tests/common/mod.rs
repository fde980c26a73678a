//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use carrot_tx::{
    CarrotError, EnoteDeriver, InputCandidate, OutputEnoteProposal, PaymentProposal,
    SelfSendPaymentProposal,
};
use carrot_types::{EncryptedPaymentId, KeyImage, X25519PublicKey};
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::montgomery::MontgomeryPoint;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn hash32(parts: &[&[u8]]) -> [u8; 32] {
    let mut state = blake2b_simd::Params::new().hash_length(32).to_state();
    for part in parts {
        state.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(state.finalize().as_bytes());
    out
}

/// Deterministic stand-in for the wallet's enote derivation: every output
/// field is a hash of the proposal and the first key image, mapped onto the
/// curve.
pub struct MockDeriver;

impl EnoteDeriver for MockDeriver {
    fn derive_normal(
        &self,
        proposal: &PaymentProposal,
        tx_first_key_image: &KeyImage,
    ) -> carrot_tx::Result<(OutputEnoteProposal, EncryptedPaymentId)> {
        let seed = [&proposal.randomness[..], &tx_first_key_image[..]].concat();
        let d_e = MontgomeryPoint::mul_base_clamped(hash32(&[b"d_e", &seed]));
        let k_a = hash32(&[b"k_a", &seed]);
        let k_o = EdwardsPoint::mul_base_clamped(hash32(&[b"k_o", &seed]));
        let mut pid = proposal.destination.payment_id;
        pid.iter_mut().zip(k_a.iter()).for_each(|(p, m)| *p ^= m);
        Ok((
            OutputEnoteProposal {
                onetime_address: k_o.compress().to_bytes(),
                enote_ephemeral_pubkey: d_e.to_bytes(),
                amount_commitment: EdwardsPoint::mul_base_clamped(k_a).compress().to_bytes(),
                amount_blinding_factor: k_a,
                amount: proposal.amount,
            },
            pid,
        ))
    }

    fn derive_selfsend(
        &self,
        proposal: &SelfSendPaymentProposal,
        tx_first_key_image: &KeyImage,
        other_enote_ephemeral_pubkey: Option<&X25519PublicKey>,
    ) -> carrot_tx::Result<OutputEnoteProposal> {
        let d_e = other_enote_ephemeral_pubkey
            .copied()
            .or(proposal.enote_ephemeral_pubkey)
            .ok_or(CarrotError::MissingComponents)?;
        let seed = [
            &proposal.destination_address_spend_pubkey[..],
            &d_e[..],
            &tx_first_key_image[..],
            &proposal.amount.to_le_bytes()[..],
        ]
        .concat();
        let k_a = hash32(&[b"k_a", &seed]);
        let k_o = EdwardsPoint::mul_base_clamped(hash32(&[b"k_o", &seed]));
        Ok(OutputEnoteProposal {
            onetime_address: k_o.compress().to_bytes(),
            enote_ephemeral_pubkey: d_e,
            amount_commitment: EdwardsPoint::mul_base_clamped(k_a).compress().to_bytes(),
            amount_blinding_factor: k_a,
            amount: proposal.amount,
        })
    }
}

pub fn key_image(i: usize) -> KeyImage {
    hash32(&[b"ki", &(i as u64).to_le_bytes()])
}

/// Internal Carrot candidates with the given amounts, aged by position.
pub fn candidates(amounts: &[u64]) -> Vec<InputCandidate> {
    amounts
        .iter()
        .enumerate()
        .map(|(i, &amount)| InputCandidate::new(amount, key_image(i), false, false, 1000 + i as u64))
        .collect()
}

/// Sum of the candidate amounts spent by a proposal.
pub fn spent_amount(candidates: &[InputCandidate], key_images: &[KeyImage]) -> u128 {
    key_images
        .iter()
        .filter_map(|ki| candidates.iter().find(|c| c.key_image() == ki))
        .map(|c| c.amount() as u128)
        .sum()
}
