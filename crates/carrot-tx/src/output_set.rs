//! Output set finalization and enote set assembly.
//!
//! A Carrot transaction needs at least two outputs and at least one
//! self-send. [`get_additional_output_type`] decides which synthetic output,
//! if any, completes a set; [`get_output_enote_proposals`] turns a finished
//! set into sorted output enotes through an [`EnoteDeriver`] and checks the
//! consensus rules on the result.

use std::collections::BTreeSet;

use carrot_types::constants::{SecretKey, CARROT_MIN_TX_OUTPUTS};
use carrot_types::{
    EncryptedPaymentId, EnoteType, JanusAnchor, KeyImage, PublicKey, X25519PublicKey,
};
use curve25519_dalek::edwards::CompressedEdwardsY;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::payment_proposal::{
    gen_janus_anchor, gen_main_address, PaymentProposal, SelfSendPaymentProposal,
};
use crate::{CarrotError, Result};

/// Kind of synthetic output appended to complete an output set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdditionalOutputType {
    /// Self-send of type PAYMENT sharing `D_e` with the other output.
    PaymentShared,
    /// Self-send of type CHANGE sharing `D_e` with the other output.
    ChangeShared,
    /// Self-send of type CHANGE with its own `D_e`.
    ChangeUnique,
    /// Zero-amount payment to a random address.
    Dummy,
}

/// The synthetic output itself, ready to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdditionalOutputProposal {
    None,
    Normal(PaymentProposal),
    SelfSend(SelfSendPaymentProposal),
}

/// Decide which synthetic output, if any, completes an output set.
pub fn get_additional_output_type(
    num_outgoing: usize,
    num_selfsend: usize,
    need_change_output: bool,
    have_payment_type_selfsend: bool,
) -> Result<Option<AdditionalOutputType>> {
    let num_outputs = num_outgoing + num_selfsend;
    let already_completed = num_outputs >= 2 && num_selfsend >= 1 && !need_change_output;

    if num_outputs == 0 {
        return Err(CarrotError::TooFewOutputs);
    }
    if already_completed {
        return Ok(None);
    }

    let output_type = if num_outputs == 1 {
        if num_selfsend == 0 {
            AdditionalOutputType::ChangeShared
        } else if !need_change_output {
            AdditionalOutputType::Dummy
        } else if have_payment_type_selfsend {
            AdditionalOutputType::ChangeShared
        } else {
            AdditionalOutputType::PaymentShared
        }
    } else {
        AdditionalOutputType::ChangeUnique
    };

    Ok(Some(output_type))
}

/// Build the synthetic output for a set, paying any change to
/// `change_address_spend_pubkey`.
pub fn get_additional_output_proposal<R: RngCore + CryptoRng>(
    num_outgoing: usize,
    num_selfsend: usize,
    needed_change_amount: u64,
    have_payment_type_selfsend: bool,
    change_address_spend_pubkey: &PublicKey,
    rng: &mut R,
) -> Result<AdditionalOutputProposal> {
    let output_type = get_additional_output_type(
        num_outgoing,
        num_selfsend,
        needed_change_amount != 0,
        have_payment_type_selfsend,
    )?;

    log::debug!(
        target: "carrot::osf",
        "{} outgoing, {} selfsend, change {}: additional output {:?}",
        num_outgoing,
        num_selfsend,
        needed_change_amount,
        output_type
    );

    let selfsend = |enote_type| {
        AdditionalOutputProposal::SelfSend(SelfSendPaymentProposal::new(
            *change_address_spend_pubkey,
            needed_change_amount,
            enote_type,
        ))
    };

    Ok(match output_type {
        None => AdditionalOutputProposal::None,
        Some(AdditionalOutputType::PaymentShared) => selfsend(EnoteType::Payment),
        Some(AdditionalOutputType::ChangeShared) | Some(AdditionalOutputType::ChangeUnique) => {
            selfsend(EnoteType::Change)
        }
        Some(AdditionalOutputType::Dummy) => AdditionalOutputProposal::Normal(PaymentProposal {
            destination: gen_main_address(rng),
            amount: 0,
            randomness: gen_janus_anchor(rng),
        }),
    })
}

// ===== Enote set assembly =====

/// An output enote before it is serialized into a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEnoteProposal {
    /// One-time address `K_o`.
    pub onetime_address: PublicKey,
    /// Enote ephemeral pubkey `D_e`.
    pub enote_ephemeral_pubkey: X25519PublicKey,
    /// Amount commitment `C_a`.
    pub amount_commitment: PublicKey,
    /// Amount blinding factor `k_a`.
    pub amount_blinding_factor: SecretKey,
    pub amount: u64,
}

/// Which payment proposal an output enote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentProposalRef {
    Normal(usize),
    SelfSend(usize),
}

/// Enote derivation, implemented by the wallet's key devices.
pub trait EnoteDeriver {
    /// Derive a normal enote and its encrypted payment ID.
    fn derive_normal(
        &self,
        proposal: &PaymentProposal,
        tx_first_key_image: &KeyImage,
    ) -> Result<(OutputEnoteProposal, EncryptedPaymentId)>;

    /// Derive a self-send enote. In 2-output sets `other_enote_ephemeral_pubkey`
    /// carries the `D_e` the enote must share.
    fn derive_selfsend(
        &self,
        proposal: &SelfSendPaymentProposal,
        tx_first_key_image: &KeyImage,
        other_enote_ephemeral_pubkey: Option<&X25519PublicKey>,
    ) -> Result<OutputEnoteProposal>;
}

/// Derive and validate the output enotes of a finalized output set.
///
/// Returns the enotes sorted by one-time address, the transaction's encrypted
/// payment ID, and for each enote the proposal it came from.
pub fn get_output_enote_proposals<D: EnoteDeriver + ?Sized>(
    normal_payment_proposals: &[PaymentProposal],
    selfsend_payment_proposals: &[SelfSendPaymentProposal],
    dummy_encrypted_payment_id: Option<EncryptedPaymentId>,
    deriver: &D,
    tx_first_key_image: &KeyImage,
) -> Result<(Vec<OutputEnoteProposal>, EncryptedPaymentId, Vec<PaymentProposalRef>)> {
    let num_selfsend = selfsend_payment_proposals.len();
    let num_proposals = normal_payment_proposals.len() + num_selfsend;
    if num_proposals < CARROT_MIN_TX_OUTPUTS || num_selfsend == 0 {
        return Err(CarrotError::TooFewOutputs);
    }

    let num_integrated = normal_payment_proposals
        .iter()
        .filter(|p| p.destination.is_integrated())
        .count();
    if num_integrated > 1 {
        return Err(CarrotError::BadAddressType);
    }

    let mut randomnesses = BTreeSet::new();
    for proposal in normal_payment_proposals {
        if proposal.randomness == JanusAnchor::default() || !randomnesses.insert(proposal.randomness) {
            return Err(CarrotError::MissingRandomness);
        }
    }

    let mut sortable = Vec::with_capacity(num_proposals);
    let mut other_enote_ephemeral_pubkey = None;
    let mut encrypted_payment_id = None;

    for (i, proposal) in normal_payment_proposals.iter().enumerate() {
        let (enote, pid_enc) = deriver.derive_normal(proposal, tx_first_key_image)?;
        if num_proposals == 2 {
            other_enote_ephemeral_pubkey = Some(enote.enote_ephemeral_pubkey);
        }
        if proposal.destination.is_integrated() {
            encrypted_payment_id = Some(pid_enc);
        }
        sortable.push((enote, PaymentProposalRef::Normal(i)));
    }

    if num_integrated == 0 {
        encrypted_payment_id = Some(dummy_encrypted_payment_id.ok_or(CarrotError::MissingComponents)?);
    }
    let encrypted_payment_id = encrypted_payment_id.ok_or(CarrotError::MissingComponents)?;

    if num_proposals == 2 && num_selfsend == 2 {
        other_enote_ephemeral_pubkey = selfsend_payment_proposals[0]
            .enote_ephemeral_pubkey
            .or(selfsend_payment_proposals[1].enote_ephemeral_pubkey);
    }

    for (i, proposal) in selfsend_payment_proposals.iter().enumerate() {
        let enote = deriver.derive_selfsend(
            proposal,
            tx_first_key_image,
            other_enote_ephemeral_pubkey.as_ref(),
        )?;
        sortable.push((enote, PaymentProposalRef::SelfSend(i)));
    }

    sortable.sort_by(|a, b| a.0.onetime_address.cmp(&b.0.onetime_address));
    let (enotes, order): (Vec<_>, Vec<_>) = sortable.into_iter().unzip();

    check_enote_set(&enotes)?;

    log::debug!(
        target: "carrot::osf",
        "derived {} output enotes ({} integrated)",
        enotes.len(),
        num_integrated
    );

    Ok((enotes, encrypted_payment_id, order))
}

// ─── Internal helpers ────────────────────────────────────────────────────────

/// Consensus checks on a sorted enote set.
fn check_enote_set(enotes: &[OutputEnoteProposal]) -> Result<()> {
    let mut ephemeral_pubkeys = BTreeSet::new();
    for enote in enotes {
        if enote.enote_ephemeral_pubkey == [0u8; 32] {
            return Err(CarrotError::MissingRandomness);
        }
        ephemeral_pubkeys.insert(enote.enote_ephemeral_pubkey);
    }
    let unique_ephemeral_pubkeys = ephemeral_pubkeys.len() == enotes.len();
    if enotes.len() == 2 && unique_ephemeral_pubkeys {
        return Err(CarrotError::ComponentOutOfOrder(
            "2-out set must share its ephemeral pubkey".into(),
        ));
    }
    if enotes.len() != 2 && !unique_ephemeral_pubkeys {
        return Err(CarrotError::MissingRandomness);
    }

    if enotes
        .windows(2)
        .any(|w| w[0].onetime_address >= w[1].onetime_address)
    {
        return Err(CarrotError::ComponentOutOfOrder(
            "duplicate onetime addresses".into(),
        ));
    }

    for enote in enotes {
        let in_main_subgroup = CompressedEdwardsY(enote.onetime_address)
            .decompress()
            .map(|p| p.is_torsion_free())
            .unwrap_or(false);
        if !in_main_subgroup {
            return Err(CarrotError::InvalidPoint(format!(
                "onetime address {}",
                hex::encode(enote.onetime_address)
            )));
        }
    }

    let mut blinding_factors = BTreeSet::new();
    for enote in enotes {
        if enote.amount_blinding_factor == [0u8; 32] {
            return Err(CarrotError::MissingRandomness);
        }
        blinding_factors.insert(enote.amount_blinding_factor);
    }
    if blinding_factors.len() != enotes.len() {
        return Err(CarrotError::MissingRandomness);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrot_types::CarrotDestination;
    use curve25519_dalek::edwards::EdwardsPoint;
    use curve25519_dalek::montgomery::MontgomeryPoint;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::payment_proposal::gen_x25519_pubkey;

    fn hash32(parts: &[&[u8]]) -> [u8; 32] {
        let mut state = blake2b_simd::Params::new().hash_length(32).to_state();
        for part in parts {
            state.update(part);
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(state.finalize().as_bytes());
        out
    }

    /// Hash-based stand-in for the real enote derivation.
    struct MockDeriver;

    impl EnoteDeriver for MockDeriver {
        fn derive_normal(
            &self,
            proposal: &PaymentProposal,
            ki: &KeyImage,
        ) -> Result<(OutputEnoteProposal, EncryptedPaymentId)> {
            let d_e = MontgomeryPoint::mul_base_clamped(hash32(&[b"d_e", &proposal.randomness, ki]));
            let k_a = hash32(&[b"k_a", &proposal.randomness, ki]);
            let k_o = EdwardsPoint::mul_base_clamped(hash32(&[b"k_o", &proposal.randomness, ki]));
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
            ki: &KeyImage,
            other: Option<&X25519PublicKey>,
        ) -> Result<OutputEnoteProposal> {
            let d_e = other
                .copied()
                .or(proposal.enote_ephemeral_pubkey)
                .ok_or(CarrotError::MissingComponents)?;
            let mut seed = Vec::with_capacity(104);
            seed.extend_from_slice(&proposal.destination_address_spend_pubkey);
            seed.extend_from_slice(&d_e);
            seed.extend_from_slice(ki);
            seed.extend_from_slice(&proposal.amount.to_le_bytes());
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

    fn normal(rng: &mut StdRng, amount: u64) -> PaymentProposal {
        PaymentProposal::new(gen_main_address(rng), amount, rng)
    }

    #[test]
    fn test_additional_output_type_table() {
        use AdditionalOutputType::*;
        assert!(matches!(
            get_additional_output_type(0, 0, false, false),
            Err(CarrotError::TooFewOutputs)
        ));
        assert_eq!(get_additional_output_type(1, 0, false, false).unwrap(), Some(ChangeShared));
        assert_eq!(get_additional_output_type(1, 0, true, false).unwrap(), Some(ChangeShared));
        assert_eq!(get_additional_output_type(0, 1, false, false).unwrap(), Some(Dummy));
        assert_eq!(get_additional_output_type(0, 1, true, false).unwrap(), Some(PaymentShared));
        assert_eq!(get_additional_output_type(0, 1, true, true).unwrap(), Some(ChangeShared));
        assert_eq!(get_additional_output_type(1, 1, false, false).unwrap(), None);
        assert_eq!(get_additional_output_type(0, 2, false, true).unwrap(), None);
        assert_eq!(get_additional_output_type(1, 1, true, false).unwrap(), Some(ChangeUnique));
        assert_eq!(get_additional_output_type(2, 0, false, false).unwrap(), Some(ChangeUnique));
        assert_eq!(get_additional_output_type(5, 0, true, false).unwrap(), Some(ChangeUnique));
    }

    #[test]
    fn test_additional_output_proposal_shapes() {
        let mut rng = StdRng::seed_from_u64(7);
        let change_key = [0x33; 32];

        match get_additional_output_proposal(1, 0, 0, false, &change_key, &mut rng).unwrap() {
            AdditionalOutputProposal::SelfSend(p) => {
                assert_eq!(p.enote_type, EnoteType::Change);
                assert_eq!(p.amount, 0);
                assert_eq!(p.destination_address_spend_pubkey, change_key);
                assert!(p.enote_ephemeral_pubkey.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }

        match get_additional_output_proposal(0, 1, 42, false, &change_key, &mut rng).unwrap() {
            AdditionalOutputProposal::SelfSend(p) => {
                assert_eq!(p.enote_type, EnoteType::Payment);
                assert_eq!(p.amount, 42);
            }
            other => panic!("unexpected {:?}", other),
        }

        match get_additional_output_proposal(0, 1, 0, false, &change_key, &mut rng).unwrap() {
            AdditionalOutputProposal::Normal(p) => {
                assert_eq!(p.amount, 0);
                assert_ne!(p.randomness, [0u8; 16]);
                assert!(!p.destination.is_integrated());
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            get_additional_output_proposal(1, 1, 0, false, &change_key, &mut rng).unwrap(),
            AdditionalOutputProposal::None
        );
    }

    #[test]
    fn test_enote_set_two_out_shares_ephemeral_pubkey() {
        let mut rng = StdRng::seed_from_u64(11);
        let normals = vec![normal(&mut rng, 100)];
        let selfsends = vec![SelfSendPaymentProposal::new([0x44; 32], 5, EnoteType::Change)];

        let (enotes, pid, order) =
            get_output_enote_proposals(&normals, &selfsends, Some([9; 8]), &MockDeriver, &[1; 32]).unwrap();

        assert_eq!(enotes.len(), 2);
        assert_eq!(pid, [9; 8]);
        assert_eq!(enotes[0].enote_ephemeral_pubkey, enotes[1].enote_ephemeral_pubkey);
        assert!(enotes[0].onetime_address < enotes[1].onetime_address);
        assert!(order.contains(&PaymentProposalRef::Normal(0)));
        assert!(order.contains(&PaymentProposalRef::SelfSend(0)));
    }

    #[test]
    fn test_enote_set_uses_integrated_payment_id() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut integrated = normal(&mut rng, 100);
        integrated.destination = CarrotDestination::integrated_address(
            integrated.destination.address_spend_pubkey,
            integrated.destination.address_view_pubkey,
            [0xAB; 8],
        );
        let mut change = SelfSendPaymentProposal::new([0x44; 32], 5, EnoteType::Change);
        change.enote_ephemeral_pubkey = Some(gen_x25519_pubkey(&mut rng));
        let normals = vec![integrated, normal(&mut rng, 7)];

        let (enotes, pid, _) =
            get_output_enote_proposals(&normals, &[change], None, &MockDeriver, &[1; 32]).unwrap();
        assert_eq!(enotes.len(), 3);
        assert_ne!(pid, [0xAB; 8]);

        let mut pid_clear = pid;
        let k_a = hash32(&[b"k_a", &integrated.randomness, &[1; 32]]);
        pid_clear.iter_mut().zip(k_a.iter()).for_each(|(p, m)| *p ^= m);
        assert_eq!(pid_clear, [0xAB; 8]);
    }

    #[test]
    fn test_enote_set_rejections() {
        let mut rng = StdRng::seed_from_u64(13);
        let change = SelfSendPaymentProposal::new([0x44; 32], 5, EnoteType::Change);

        // No self-send.
        let normals = vec![normal(&mut rng, 1), normal(&mut rng, 2)];
        assert!(matches!(
            get_output_enote_proposals(&normals, &[], Some([0; 8]), &MockDeriver, &[1; 32]),
            Err(CarrotError::TooFewOutputs)
        ));

        // Two integrated addresses.
        let mut a = normal(&mut rng, 1);
        a.destination.payment_id = [1; 8];
        let mut b = normal(&mut rng, 2);
        b.destination.payment_id = [2; 8];
        assert!(matches!(
            get_output_enote_proposals(&[a, b], &[change], None, &MockDeriver, &[1; 32]),
            Err(CarrotError::BadAddressType)
        ));

        // Duplicate randomness.
        let c = normal(&mut rng, 1);
        let mut d = normal(&mut rng, 2);
        d.randomness = c.randomness;
        assert!(matches!(
            get_output_enote_proposals(&[c, d], &[change], Some([0; 8]), &MockDeriver, &[1; 32]),
            Err(CarrotError::MissingRandomness)
        ));

        // No integrated address and no dummy payment ID.
        let e = normal(&mut rng, 1);
        assert!(matches!(
            get_output_enote_proposals(&[e], &[change], None, &MockDeriver, &[1; 32]),
            Err(CarrotError::MissingComponents)
        ));
    }

    #[test]
    fn test_enote_set_three_out_requires_unique_ephemeral_pubkeys() {
        let mut rng = StdRng::seed_from_u64(14);
        let shared = gen_x25519_pubkey(&mut rng);
        let mut s1 = SelfSendPaymentProposal::new([0x44; 32], 5, EnoteType::Change);
        s1.enote_ephemeral_pubkey = Some(shared);
        let mut s2 = SelfSendPaymentProposal::new([0x45; 32], 6, EnoteType::Payment);
        s2.enote_ephemeral_pubkey = Some(shared);
        let normals = vec![normal(&mut rng, 1)];

        assert!(matches!(
            get_output_enote_proposals(&normals, &[s1, s2], Some([0; 8]), &MockDeriver, &[1; 32]),
            Err(CarrotError::MissingRandomness)
        ));
    }

    #[test]
    fn test_check_enote_set_rejects_torsion() {
        let mut rng = StdRng::seed_from_u64(15);
        let mut enotes = vec![
            OutputEnoteProposal {
                onetime_address: EdwardsPoint::mul_base_clamped([3; 32]).compress().to_bytes(),
                enote_ephemeral_pubkey: gen_x25519_pubkey(&mut rng),
                amount_commitment: [0; 32],
                amount_blinding_factor: [1; 32],
                amount: 0,
            },
        ];
        // Identity point plus an order-2 component: y = -1.
        let mut torsion = [0u8; 32];
        torsion[0] = 0xEC;
        torsion[1..31].fill(0xFF);
        torsion[31] = 0x7F;
        enotes.push(OutputEnoteProposal {
            onetime_address: torsion,
            enote_ephemeral_pubkey: gen_x25519_pubkey(&mut rng),
            amount_commitment: [0; 32],
            amount_blinding_factor: [2; 32],
            amount: 0,
        });
        enotes.push(OutputEnoteProposal {
            onetime_address: EdwardsPoint::mul_base_clamped([4; 32]).compress().to_bytes(),
            enote_ephemeral_pubkey: gen_x25519_pubkey(&mut rng),
            amount_commitment: [0; 32],
            amount_blinding_factor: [3; 32],
            amount: 0,
        });
        enotes.sort_by(|a, b| a.onetime_address.cmp(&b.onetime_address));
        assert!(matches!(check_enote_set(&enotes), Err(CarrotError::InvalidPoint(_))));
    }
}
