//! Transaction proposal construction.
//!
//! [`make_carrot_transaction_proposal_v1`] is the general builder: it
//! completes the output set, fills in missing randomness, prices every input
//! count, and then hands off to an [`InputSelector`] and a [`FeeCarver`].
//! The transfer and sweep variants wrap it with the stock strategies.

use std::collections::{BTreeMap, BTreeSet};

use carrot_types::constants::{format_amount, CARROT_MAX_TX_INPUTS, CARROT_MIN_TX_INPUTS, CARROT_MIN_TX_OUTPUTS};
use carrot_types::{EncryptedPaymentId, EnoteType, KeyImage, PublicKey, SubaddressIndexExtended};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::carve::{FeeCarver, SubtractableFeeCarver, SweepCarver};
use crate::fee::get_fee_by_input_count;
use crate::input_selection::InputSelector;
use crate::output_set::{
    get_additional_output_proposal, get_output_enote_proposals, AdditionalOutputProposal,
    EnoteDeriver, OutputEnoteProposal, PaymentProposalRef,
};
use crate::payment_proposal::{
    gen_encrypted_payment_id, gen_x25519_pubkey, PaymentProposal, SelectedInput,
    SelfSendPaymentProposal, VerifiableSelfSendProposal,
};
use crate::{CarrotError, Result};

/// A balanced transaction, ready for enote derivation and signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionProposal {
    pub normal_payment_proposals: Vec<PaymentProposal>,
    pub selfsend_payment_proposals: Vec<VerifiableSelfSendProposal>,
    /// Used as the encrypted payment ID when no destination is integrated.
    pub dummy_encrypted_payment_id: EncryptedPaymentId,
    pub fee: u64,
    /// Key images of the spent inputs, strictly descending.
    pub key_images_sorted: Vec<KeyImage>,
    pub extra: Vec<u8>,
}

impl TransactionProposal {
    pub fn num_outputs(&self) -> usize {
        self.normal_payment_proposals.len() + self.selfsend_payment_proposals.len()
    }

    pub fn num_inputs(&self) -> usize {
        self.key_images_sorted.len()
    }

    pub fn output_amount_sum(&self) -> u128 {
        let normal: u128 = self.normal_payment_proposals.iter().map(|p| p.amount as u128).sum();
        let selfsend: u128 = self
            .selfsend_payment_proposals
            .iter()
            .map(|p| p.proposal.amount as u128)
            .sum();
        normal + selfsend
    }

    /// Derive the output enotes of this proposal, keyed to its first
    /// (largest) key image.
    pub fn output_enote_proposals<D: EnoteDeriver + ?Sized>(
        &self,
        deriver: &D,
    ) -> Result<(Vec<OutputEnoteProposal>, EncryptedPaymentId, Vec<PaymentProposalRef>)> {
        let tx_first_key_image = self.key_images_sorted.first().ok_or(CarrotError::TooFewInputs)?;
        let selfsends: Vec<SelfSendPaymentProposal> =
            self.selfsend_payment_proposals.iter().map(|p| p.proposal).collect();
        get_output_enote_proposals(
            &self.normal_payment_proposals,
            &selfsends,
            Some(self.dummy_encrypted_payment_id),
            deriver,
            tx_first_key_image,
        )
    }

    /// JSON summary with hex-encoded keys.
    pub fn to_json(&self) -> String {
        let normal: Vec<serde_json::Value> = self
            .normal_payment_proposals
            .iter()
            .map(|p| {
                serde_json::json!({
                    "address_spend_pubkey": hex::encode(p.destination.address_spend_pubkey),
                    "is_subaddress": p.destination.is_subaddress,
                    "is_integrated": p.destination.is_integrated(),
                    "amount": p.amount,
                })
            })
            .collect();
        let selfsend: Vec<serde_json::Value> = self
            .selfsend_payment_proposals
            .iter()
            .map(|p| {
                serde_json::json!({
                    "address_spend_pubkey": hex::encode(p.proposal.destination_address_spend_pubkey),
                    "amount": p.proposal.amount,
                    "enote_type": p.proposal.enote_type.to_string(),
                    "enote_ephemeral_pubkey": p.proposal.enote_ephemeral_pubkey.map(hex::encode),
                    "subaddr_index": [p.subaddr_index.major, p.subaddr_index.minor],
                })
            })
            .collect();

        serde_json::json!({
            "fee": self.fee,
            "key_images": self.key_images_sorted.iter().map(hex::encode).collect::<Vec<_>>(),
            "normal_payment_proposals": normal,
            "selfsend_payment_proposals": selfsend,
            "dummy_encrypted_payment_id": hex::encode(self.dummy_encrypted_payment_id),
            "extra": hex::encode(&self.extra),
        })
        .to_string()
    }
}

// ─── Internal helpers ────────────────────────────────────────────────────────

fn append_additional_payment_proposal_if_necessary<R: RngCore + CryptoRng>(
    normal_payment_proposals: &mut Vec<PaymentProposal>,
    selfsend_payment_proposals: &mut Vec<VerifiableSelfSendProposal>,
    change_address_spend_pubkey: &PublicKey,
    change_address_index: &SubaddressIndexExtended,
    rng: &mut R,
) -> Result<()> {
    let have_payment_type_selfsend = selfsend_payment_proposals
        .iter()
        .any(|p| p.proposal.enote_type == EnoteType::Payment);

    match get_additional_output_proposal(
        normal_payment_proposals.len(),
        selfsend_payment_proposals.len(),
        0,
        have_payment_type_selfsend,
        change_address_spend_pubkey,
        rng,
    )? {
        AdditionalOutputProposal::None => {}
        AdditionalOutputProposal::Normal(p) => normal_payment_proposals.push(p),
        AdditionalOutputProposal::SelfSend(p) => selfsend_payment_proposals
            .push(VerifiableSelfSendProposal::new(p, *change_address_index)),
    }
    Ok(())
}

fn input_output_balance(
    input_amount_sum: u128,
    fee: u64,
    normal_payment_proposals: &[PaymentProposal],
    selfsend_payment_proposals: &[VerifiableSelfSendProposal],
) -> i128 {
    let mut balance = input_amount_sum as i128 - fee as i128;
    balance -= normal_payment_proposals.iter().map(|p| p.amount as i128).sum::<i128>();
    balance -= selfsend_payment_proposals
        .iter()
        .map(|p| p.proposal.amount as i128)
        .sum::<i128>();
    balance
}

// ===== Builders =====

/// Build a balanced transaction proposal.
///
/// The output set is completed to consensus shape, self-send ephemeral keys
/// and the dummy payment ID are generated, and the fee for every input count
/// is computed from `fee_per_weight`. `selector` then chooses the inputs and
/// `carver` adjusts output amounts until inputs equal outputs plus fee.
#[allow(clippy::too_many_arguments)]
pub fn make_carrot_transaction_proposal_v1<S, C, R>(
    normal_payment_proposals: &[PaymentProposal],
    selfsend_payment_proposals: &[VerifiableSelfSendProposal],
    fee_per_weight: u64,
    extra: &[u8],
    selector: &mut S,
    carver: &mut C,
    change_address_spend_pubkey: &PublicKey,
    change_address_index: &SubaddressIndexExtended,
    rng: &mut R,
) -> Result<TransactionProposal>
where
    S: InputSelector + ?Sized,
    C: FeeCarver + ?Sized,
    R: RngCore + CryptoRng,
{
    let mut normal_payment_proposals = normal_payment_proposals.to_vec();
    let mut selfsend_payment_proposals = selfsend_payment_proposals.to_vec();

    append_additional_payment_proposal_if_necessary(
        &mut normal_payment_proposals,
        &mut selfsend_payment_proposals,
        change_address_spend_pubkey,
        change_address_index,
        rng,
    )?;

    let num_outs = normal_payment_proposals.len() + selfsend_payment_proposals.len();
    if num_outs < CARROT_MIN_TX_OUTPUTS {
        return Err(CarrotError::TooFewOutputs);
    }

    // Self-send D_e: always in >2-out sets; in a 2-out all-self-send set only
    // if neither was given. A 2-out set shares the first output's D_e.
    let should_gen_selfsend_ephemeral_pubkeys = num_outs != 2
        || (normal_payment_proposals.is_empty()
            && selfsend_payment_proposals
                .iter()
                .all(|p| p.proposal.enote_ephemeral_pubkey.is_none()));
    if should_gen_selfsend_ephemeral_pubkeys {
        for (i, selfsend) in selfsend_payment_proposals.iter_mut().enumerate() {
            if num_outs == 2 && i == 1 {
                continue;
            }
            if selfsend.proposal.enote_ephemeral_pubkey.is_none() {
                selfsend.proposal.enote_ephemeral_pubkey = Some(gen_x25519_pubkey(rng));
            }
        }
    }

    let dummy_encrypted_payment_id = gen_encrypted_payment_id(rng);

    let fee_by_input_count = get_fee_by_input_count(num_outs, extra.len(), fee_per_weight)?;

    let nominal_output_sum: u128 = normal_payment_proposals
        .iter()
        .map(|p| p.amount as u128)
        .chain(selfsend_payment_proposals.iter().map(|p| p.proposal.amount as u128))
        .sum();

    log::debug!(
        target: "carrot::proposal",
        "building proposal: {} normal, {} selfsend, nominal output sum {}, fee/weight {}",
        normal_payment_proposals.len(),
        selfsend_payment_proposals.len(),
        format_amount(nominal_output_sum),
        fee_per_weight
    );

    let selected_inputs = selector.select_inputs(
        nominal_output_sum,
        &fee_by_input_count,
        normal_payment_proposals.len(),
        selfsend_payment_proposals.len(),
    )?;

    let n_inputs = selected_inputs.len();
    if n_inputs < CARROT_MIN_TX_INPUTS {
        return Err(CarrotError::TooFewInputs);
    }
    if n_inputs > CARROT_MAX_TX_INPUTS {
        return Err(CarrotError::TooManyInputs);
    }
    let fee = *fee_by_input_count.get(&n_inputs).ok_or_else(|| {
        CarrotError::LogicError(format!("fee table has no entry for {} inputs", n_inputs))
    })?;

    let input_amount_sum: u128 = selected_inputs.iter().map(|i| i.amount as u128).sum();

    carver.carve_fees_and_balance(
        input_amount_sum,
        fee,
        &mut normal_payment_proposals,
        &mut selfsend_payment_proposals,
    )?;

    if input_output_balance(
        input_amount_sum,
        fee,
        &normal_payment_proposals,
        &selfsend_payment_proposals,
    ) != 0
    {
        return Err(CarrotError::LogicError(
            "post-carved transaction does not balance".into(),
        ));
    }

    let mut key_images_sorted: Vec<KeyImage> = selected_inputs.iter().map(|i| i.key_image).collect();
    key_images_sorted.sort_unstable_by(|a, b| b.cmp(a));
    if key_images_sorted.windows(2).any(|w| w[0] == w[1]) {
        return Err(CarrotError::ComponentOutOfOrder(
            "duplicate key image in selected inputs".into(),
        ));
    }

    log::debug!(
        target: "carrot::proposal",
        "built proposal: {} inputs ({}), {} outputs, fee {}",
        n_inputs,
        format_amount(input_amount_sum),
        num_outs,
        format_amount(fee as u128)
    );

    Ok(TransactionProposal {
        normal_payment_proposals,
        selfsend_payment_proposals,
        dummy_encrypted_payment_id,
        fee,
        key_images_sorted,
        extra: extra.to_vec(),
    })
}

/// Build a transfer: the given payments plus an implicit change output that
/// absorbs `inputs - outputs`. The fee comes out of the subtractable outputs,
/// or out of the change output if none are named.
#[allow(clippy::too_many_arguments)]
pub fn make_carrot_transaction_proposal_v1_transfer<S, R>(
    normal_payment_proposals: &[PaymentProposal],
    selfsend_payment_proposals: &[VerifiableSelfSendProposal],
    fee_per_weight: u64,
    extra: &[u8],
    selector: &mut S,
    change_address_spend_pubkey: &PublicKey,
    change_address_index: &SubaddressIndexExtended,
    subtractable_normal_payment_proposals: &BTreeSet<usize>,
    subtractable_selfsend_payment_proposals: &BTreeSet<usize>,
    rng: &mut R,
) -> Result<TransactionProposal>
where
    S: InputSelector + ?Sized,
    R: RngCore + CryptoRng,
{
    // Always present, even at zero, so N destinations give N+1 outputs.
    let add_payment_type_selfsend = normal_payment_proposals.is_empty()
        && selfsend_payment_proposals.len() == 1
        && selfsend_payment_proposals[0].proposal.enote_type == EnoteType::Change;
    let implicit_enote_type = if add_payment_type_selfsend {
        EnoteType::Payment
    } else {
        EnoteType::Change
    };

    let mut selfsend_payment_proposals = selfsend_payment_proposals.to_vec();
    selfsend_payment_proposals.push(VerifiableSelfSendProposal::new(
        SelfSendPaymentProposal::new(*change_address_spend_pubkey, 0, implicit_enote_type),
        *change_address_index,
    ));

    let mut carver = SubtractableFeeCarver::new(
        subtractable_normal_payment_proposals.clone(),
        subtractable_selfsend_payment_proposals.clone(),
        rng,
    );

    make_carrot_transaction_proposal_v1(
        normal_payment_proposals,
        &selfsend_payment_proposals,
        fee_per_weight,
        extra,
        selector,
        &mut carver,
        change_address_spend_pubkey,
        change_address_index,
        rng,
    )
}

/// Build a sweep of exactly `selected_inputs`: all zero-amount proposals of
/// one kind share `inputs - fee` equally.
#[allow(clippy::too_many_arguments)]
pub fn make_carrot_transaction_proposal_v1_sweep<R: RngCore + CryptoRng>(
    normal_payment_proposals: &[PaymentProposal],
    selfsend_payment_proposals: &[VerifiableSelfSendProposal],
    fee_per_weight: u64,
    extra: &[u8],
    selected_inputs: Vec<SelectedInput>,
    change_address_spend_pubkey: &PublicKey,
    change_address_index: &SubaddressIndexExtended,
    rng: &mut R,
) -> Result<TransactionProposal> {
    if normal_payment_proposals.is_empty() && selfsend_payment_proposals.is_empty() {
        return Err(CarrotError::InvalidArgument("no payment proposals provided".into()));
    }
    let any_nonzero = normal_payment_proposals.iter().any(|p| p.amount != 0)
        || selfsend_payment_proposals.iter().any(|p| p.proposal.amount != 0);
    if any_nonzero {
        return Err(CarrotError::InvalidArgument("sweep payment proposal amount not 0".into()));
    }
    if !normal_payment_proposals.is_empty() && !selfsend_payment_proposals.is_empty() {
        return Err(CarrotError::InvalidArgument(
            "both normal and self-send payment proposals are provided".into(),
        ));
    }
    let is_selfsend_sweep = !selfsend_payment_proposals.is_empty();

    let mut selected_inputs = Some(selected_inputs);
    let mut selector = |_: u128, _: &BTreeMap<usize, u64>, _: usize, _: usize| -> Result<Vec<SelectedInput>> {
        selected_inputs
            .take()
            .ok_or_else(|| CarrotError::LogicError("sweep inputs already taken".into()))
    };
    let mut carver = SweepCarver::new(is_selfsend_sweep, rng);

    make_carrot_transaction_proposal_v1(
        normal_payment_proposals,
        selfsend_payment_proposals,
        fee_per_weight,
        extra,
        &mut selector,
        &mut carver,
        change_address_spend_pubkey,
        change_address_index,
        rng,
    )
}
