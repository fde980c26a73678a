//! Splitting payments and sweeps that do not fit in one transaction.

use std::collections::{BTreeSet, HashSet};

use carrot_types::constants::{
    format_amount, CARROT_MAX_TX_INPUTS, CARROT_MAX_TX_OUTPUTS, CARROT_MIN_TX_OUTPUTS,
};
use carrot_types::{KeyImage, PublicKey, SubaddressIndexExtended};
use rand::{CryptoRng, RngCore};

use crate::fee::get_fee_by_input_count;
use crate::input_selection::{
    get_input_count_for_max_usable_money, InputSelectionPolicy, SingleTransferInputSelector,
};
use crate::payment_proposal::{
    InputCandidate, PaymentProposal, SelectedInput, VerifiableSelfSendProposal,
};
use crate::proposal::{
    make_carrot_transaction_proposal_v1_sweep, make_carrot_transaction_proposal_v1_transfer,
    TransactionProposal,
};
use crate::{CarrotError, Result};

/// Destinations per transaction, leaving room for the implicit change output.
const MAX_DESTINATIONS_PER_TX: usize = CARROT_MAX_TX_OUTPUTS - 1;

/// Pay any number of destinations with as many transfers as needed.
///
/// Destinations are taken from the back of each list, normal payments first.
/// Each transaction gets a fresh selector over the candidates the previous
/// ones left unspent, with policies from `make_policies`.
#[allow(clippy::too_many_arguments)]
pub fn make_multiple_carrot_transaction_proposals_transfer<R: RngCore + CryptoRng>(
    mut normal_payment_proposals: Vec<PaymentProposal>,
    mut selfsend_payment_proposals: Vec<VerifiableSelfSendProposal>,
    fee_per_weight: u64,
    extra: &[u8],
    mut input_candidates: Vec<InputCandidate>,
    mut make_policies: impl FnMut() -> Vec<Box<dyn InputSelectionPolicy>>,
    input_selection_flags: u32,
    change_address_spend_pubkey: &PublicKey,
    change_address_index: &SubaddressIndexExtended,
    subtractable_normal_payment_proposals: &BTreeSet<usize>,
    subtractable_selfsend_payment_proposals: &BTreeSet<usize>,
    rng: &mut R,
) -> Result<Vec<TransactionProposal>> {
    let mut n_dsts = normal_payment_proposals.len() + selfsend_payment_proposals.len();
    let mut tx_proposals = Vec::with_capacity(n_dsts.div_ceil(MAX_DESTINATIONS_PER_TX));

    while n_dsts > 0 {
        let mut tx_normal = Vec::new();
        let mut tx_selfsend = Vec::new();
        let mut tx_subtractable_normal = BTreeSet::new();
        let mut tx_subtractable_selfsend = BTreeSet::new();

        while n_dsts > 0 && tx_normal.len() + tx_selfsend.len() < MAX_DESTINATIONS_PER_TX {
            if let Some(p) = normal_payment_proposals.pop() {
                if subtractable_normal_payment_proposals.contains(&normal_payment_proposals.len()) {
                    tx_subtractable_normal.insert(tx_normal.len());
                }
                tx_normal.push(p);
            } else if let Some(p) = selfsend_payment_proposals.pop() {
                if subtractable_selfsend_payment_proposals.contains(&selfsend_payment_proposals.len()) {
                    tx_subtractable_selfsend.insert(tx_selfsend.len());
                }
                tx_selfsend.push(p);
            } else {
                return Err(CarrotError::LogicError("payment proposal count mismatch".into()));
            }
            n_dsts -= 1;
        }

        log::debug!(
            target: "carrot::multi",
            "transfer {}: {} normal, {} selfsend, {} candidates left",
            tx_proposals.len(),
            tx_normal.len(),
            tx_selfsend.len(),
            input_candidates.len()
        );

        let mut selector = SingleTransferInputSelector::new(
            input_candidates.clone(),
            make_policies(),
            input_selection_flags,
            rng,
        );

        let tx_proposal = make_carrot_transaction_proposal_v1_transfer(
            &tx_normal,
            &tx_selfsend,
            fee_per_weight,
            extra,
            &mut selector,
            change_address_spend_pubkey,
            change_address_index,
            &tx_subtractable_normal,
            &tx_subtractable_selfsend,
            rng,
        )?;

        let used: HashSet<&KeyImage> = tx_proposal.key_images_sorted.iter().collect();
        input_candidates.retain(|c| !used.contains(c.key_image()));
        tx_proposals.push(tx_proposal);
    }

    Ok(tx_proposals)
}

/// Sweep `selected_inputs` into the given zero-amount destinations, using as
/// many transactions as needed.
///
/// Inputs that cannot pay their own marginal fee are left behind; that is an
/// error unless `ignore_dust` is set.
#[allow(clippy::too_many_arguments)]
pub fn make_multiple_carrot_transaction_proposals_sweep<R: RngCore + CryptoRng>(
    normal_payment_proposals: &[PaymentProposal],
    selfsend_payment_proposals: &[VerifiableSelfSendProposal],
    fee_per_weight: u64,
    extra: &[u8],
    mut selected_inputs: Vec<SelectedInput>,
    change_address_spend_pubkey: &PublicKey,
    change_address_index: &SubaddressIndexExtended,
    ignore_dust: bool,
    rng: &mut R,
) -> Result<Vec<TransactionProposal>> {
    let n_dests_per_tx = normal_payment_proposals.len() + selfsend_payment_proposals.len();
    if selected_inputs.is_empty() {
        return Err(CarrotError::TooFewInputs);
    }
    if n_dests_per_tx == 0 {
        return Err(CarrotError::TooFewOutputs);
    }
    if n_dests_per_tx > CARROT_MAX_TX_OUTPUTS {
        return Err(CarrotError::TooManyOutputs);
    }

    let unique: HashSet<&KeyImage> = selected_inputs.iter().map(|i| &i.key_image).collect();
    if unique.len() != selected_inputs.len() {
        return Err(CarrotError::ComponentOutOfOrder(
            "duplicate key images in sweep inputs".into(),
        ));
    }

    // Largest first, so small inputs ride along with big ones.
    selected_inputs.sort_by(|a, b| b.amount.cmp(&a.amount));

    let n_outputs = CARROT_MIN_TX_OUTPUTS
        .max(normal_payment_proposals.len() + selfsend_payment_proposals.len().max(1));
    let fee_by_input_count = get_fee_by_input_count(n_outputs, extra.len(), fee_per_weight)?;

    let usable_count_in_window = |inputs: &[SelectedInput], window_offset: usize| {
        let window_size = CARROT_MAX_TX_INPUTS.min(inputs.len() - window_offset);
        let window = &inputs[window_offset..window_offset + window_size];
        get_input_count_for_max_usable_money(window.iter().map(|i| i.amount), window_size, &fee_by_input_count).0
    };

    let mut tx_proposals = Vec::with_capacity(selected_inputs.len().div_ceil(CARROT_MAX_TX_INPUTS));

    while usable_count_in_window(&selected_inputs, 0) > 0 {
        // Slide from the smallest amounts toward the largest until the whole
        // window pays for itself.
        let max_window_size = CARROT_MAX_TX_INPUTS.min(selected_inputs.len());
        let mut window_offset = selected_inputs.len() - max_window_size;
        let n_tx_inputs = loop {
            let n = usable_count_in_window(&selected_inputs, window_offset);
            if window_offset == 0 || n == max_window_size {
                break n;
            }
            window_offset -= 1;
        };
        if n_tx_inputs == 0 {
            break;
        }

        let tx_inputs: Vec<SelectedInput> = selected_inputs
            .drain(window_offset..window_offset + n_tx_inputs)
            .collect();

        log::debug!(
            target: "carrot::multi",
            "sweep {}: {} inputs from offset {}, {} left",
            tx_proposals.len(),
            tx_inputs.len(),
            window_offset,
            selected_inputs.len()
        );

        tx_proposals.push(make_carrot_transaction_proposal_v1_sweep(
            normal_payment_proposals,
            selfsend_payment_proposals,
            fee_per_weight,
            extra,
            tx_inputs,
            change_address_spend_pubkey,
            change_address_index,
            rng,
        )?);
    }

    if !selected_inputs.is_empty() {
        let dust: u128 = selected_inputs.iter().map(|i| i.amount as u128).sum();
        if !ignore_dust {
            return Err(CarrotError::NotEnoughUsableMoney {
                need: fee_by_input_count.values().next().copied().unwrap_or(0) as u128,
                have: dust,
            });
        }
        log::warn!(
            target: "carrot::multi",
            "leaving {} dust inputs worth {} unswept",
            selected_inputs.len(),
            format_amount(dust)
        );
    }

    Ok(tx_proposals)
}
