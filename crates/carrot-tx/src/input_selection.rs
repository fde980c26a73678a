//! Input selection.
//!
//! Picks which owned outputs to spend for a single transaction. Candidates
//! are deduplicated by key image (the "burning bug"), partitioned by privacy
//! class (pre-Carrot, Carrot external, Carrot internal) and tried subset by
//! subset, input count by input count, against a list of pluggable
//! [`InputSelectionPolicy`]s.
//!
//! Subsets are ordered so that normal transfers avoid spending
//! non-forward-secret inputs, while self-send-only transactions prefer to
//! churn them.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use carrot_types::constants::{format_amount, CARROT_MAX_TX_INPUTS, CARROT_MIN_TX_INPUTS};
use carrot_types::KeyImage;
use rand::rngs::StdRng;
use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::payment_proposal::{child_rng, InputCandidate, SelectedInput};
use crate::{CarrotError, Result};

/// Bit flags tuning [`SingleTransferInputSelector`].
pub mod input_selection_flags {
    /// Let normal transfers spend Carrot inputs received from other people.
    pub const ALLOW_EXTERNAL_INPUTS_IN_NORMAL_TRANSFERS: u32 = 1 << 0;
    /// Let normal transfers spend pre-Carrot inputs. Requires
    /// [`ALLOW_EXTERNAL_INPUTS_IN_NORMAL_TRANSFERS`].
    pub const ALLOW_PRE_CARROT_INPUTS_IN_NORMAL_TRANSFERS: u32 = 1 << 1;
    /// Allow one transaction to spend internal and external inputs together.
    pub const ALLOW_MIXED_INTERNAL_EXTERNAL: u32 = 1 << 2;
    /// Allow one transaction to spend Carrot and pre-Carrot inputs together.
    pub const ALLOW_MIXED_CARROT_PRE_CARROT: u32 = 1 << 3;
    /// The fee is paid out of the outputs, so inputs only cover the nominal sum.
    pub const IS_KNOWN_FEE_SUBTRACTABLE: u32 = 1 << 4;
    /// Keep inputs worth less than their own marginal fee.
    pub const ALLOW_DUST: u32 = 1 << 5;
}

use input_selection_flags::*;

/// Serializable form of the selection flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSelectionConfig {
    pub allow_external_inputs_in_normal_transfers: bool,
    pub allow_pre_carrot_inputs_in_normal_transfers: bool,
    pub allow_mixed_internal_external: bool,
    pub allow_mixed_carrot_pre_carrot: bool,
    pub is_known_fee_subtractable: bool,
    pub allow_dust: bool,
}

impl Default for InputSelectionConfig {
    fn default() -> Self {
        Self {
            allow_external_inputs_in_normal_transfers: true,
            allow_pre_carrot_inputs_in_normal_transfers: true,
            allow_mixed_internal_external: false,
            allow_mixed_carrot_pre_carrot: false,
            is_known_fee_subtractable: false,
            allow_dust: false,
        }
    }
}

impl InputSelectionConfig {
    pub fn flags(&self) -> u32 {
        let mut flags = 0;
        if self.allow_external_inputs_in_normal_transfers {
            flags |= ALLOW_EXTERNAL_INPUTS_IN_NORMAL_TRANSFERS;
        }
        if self.allow_pre_carrot_inputs_in_normal_transfers {
            flags |= ALLOW_PRE_CARROT_INPUTS_IN_NORMAL_TRANSFERS;
        }
        if self.allow_mixed_internal_external {
            flags |= ALLOW_MIXED_INTERNAL_EXTERNAL;
        }
        if self.allow_mixed_carrot_pre_carrot {
            flags |= ALLOW_MIXED_CARROT_PRE_CARROT;
        }
        if self.is_known_fee_subtractable {
            flags |= IS_KNOWN_FEE_SUBTRACTABLE;
        }
        if self.allow_dust {
            flags |= ALLOW_DUST;
        }
        flags
    }
}

impl From<InputSelectionConfig> for u32 {
    fn from(config: InputSelectionConfig) -> u32 {
        config.flags()
    }
}

// ===== Strategy traits =====

/// Chooses the inputs of one transaction.
///
/// `fee_by_input_count` maps every acceptable input count to the absolute fee
/// at that count; the returned list must have one of those lengths.
pub trait InputSelector {
    fn select_inputs(
        &mut self,
        nominal_output_sum: u128,
        fee_by_input_count: &BTreeMap<usize, u64>,
        num_normal_payment_proposals: usize,
        num_selfsend_payment_proposals: usize,
    ) -> Result<Vec<SelectedInput>>;
}

impl<F> InputSelector for F
where
    F: FnMut(u128, &BTreeMap<usize, u64>, usize, usize) -> Result<Vec<SelectedInput>>,
{
    fn select_inputs(
        &mut self,
        nominal_output_sum: u128,
        fee_by_input_count: &BTreeMap<usize, u64>,
        num_normal_payment_proposals: usize,
        num_selfsend_payment_proposals: usize,
    ) -> Result<Vec<SelectedInput>> {
        self(
            nominal_output_sum,
            fee_by_input_count,
            num_normal_payment_proposals,
            num_selfsend_payment_proposals,
        )
    }
}

/// One way of picking inputs out of an allowed subset.
///
/// `required_money_by_input_count` lists the input counts the policy may
/// return, each with the minimum input sum at that count. An empty result
/// declines, letting the next policy try.
pub trait InputSelectionPolicy {
    fn select(
        &self,
        input_candidates: &[InputCandidate],
        selectable_inputs: &BTreeSet<usize>,
        required_money_by_input_count: &BTreeMap<usize, u128>,
    ) -> BTreeSet<usize>;
}

impl<F> InputSelectionPolicy for F
where
    F: Fn(&[InputCandidate], &BTreeSet<usize>, &BTreeMap<usize, u128>) -> BTreeSet<usize>,
{
    fn select(
        &self,
        input_candidates: &[InputCandidate],
        selectable_inputs: &BTreeSet<usize>,
        required_money_by_input_count: &BTreeMap<usize, u128>,
    ) -> BTreeSet<usize> {
        self(input_candidates, selectable_inputs, required_money_by_input_count)
    }
}

// ===== Candidate ranking =====

/// Rank two candidates that share a key image: higher amount, then older,
/// then Carrot over pre-Carrot, then internal over external.
///
/// Returns [`Ordering::Greater`] when `lhs` is the better one to keep.
pub fn compare_input_candidate_same_key_image(
    lhs: &InputCandidate,
    rhs: &InputCandidate,
) -> Result<Ordering> {
    if lhs.key_image() != rhs.key_image() {
        return Err(CarrotError::ComponentOutOfOrder(
            "cannot rank input candidates with different key images".into(),
        ));
    }

    Ok(lhs
        .amount()
        .cmp(&rhs.amount())
        .then_with(|| rhs.block_index.cmp(&lhs.block_index))
        .then_with(|| rhs.is_pre_carrot.cmp(&lhs.is_pre_carrot))
        .then_with(|| rhs.is_external.cmp(&lhs.is_external)))
}

/// Indices of the best candidate for each distinct key image.
fn non_burned_inputs(input_candidates: &[InputCandidate]) -> Result<BTreeSet<usize>> {
    let mut best_by_key_image: BTreeMap<&KeyImage, usize> = BTreeMap::new();
    for (i, candidate) in input_candidates.iter().enumerate() {
        match best_by_key_image.get_mut(candidate.key_image()) {
            None => {
                best_by_key_image.insert(candidate.key_image(), i);
            }
            Some(best) => {
                let ordering =
                    compare_input_candidate_same_key_image(&input_candidates[*best], candidate)?;
                if ordering == Ordering::Less {
                    log::trace!(
                        target: "carrot::selection",
                        "candidate {} supersedes {} for key image {}",
                        i,
                        *best,
                        hex::encode(candidate.key_image())
                    );
                    *best = i;
                }
            }
        }
    }
    Ok(best_by_key_image.into_values().collect())
}

/// Form the candidate subsets to try, most preferred first.
///
/// Pre-Carrot and external subsets follow the internal one only when
/// `!must_use_internal`, so normal transfers spend them only with
/// [`ALLOW_EXTERNAL_INPUTS_IN_NORMAL_TRANSFERS`].
pub fn form_preferred_input_candidate_subsets(
    input_candidates: &[InputCandidate],
    flags: u32,
    is_normal_transfer: bool,
) -> Result<Vec<BTreeSet<usize>>> {
    let confused_flags = flags & ALLOW_PRE_CARROT_INPUTS_IN_NORMAL_TRANSFERS != 0
        && flags & ALLOW_EXTERNAL_INPUTS_IN_NORMAL_TRANSFERS == 0;
    if confused_flags {
        return Err(CarrotError::InvalidArgument(
            "pre-Carrot inputs are allowed in normal transfers but external Carrot inputs are not".into(),
        ));
    }

    let all_non_burned = non_burned_inputs(input_candidates)?;

    let mut pre_carrot = BTreeSet::new();
    let mut external = BTreeSet::new();
    let mut internal = BTreeSet::new();
    for &idx in &all_non_burned {
        let candidate = &input_candidates[idx];
        if candidate.is_pre_carrot {
            pre_carrot.insert(idx);
        } else if candidate.is_external {
            external.insert(idx);
        } else {
            internal.insert(idx);
        }
    }

    let must_use_internal =
        flags & ALLOW_EXTERNAL_INPUTS_IN_NORMAL_TRANSFERS == 0 && is_normal_transfer;
    let allow_mixed_externality = flags & ALLOW_MIXED_INTERNAL_EXTERNAL != 0 && !must_use_internal;
    let must_use_carrot =
        flags & ALLOW_PRE_CARROT_INPUTS_IN_NORMAL_TRANSFERS == 0 && is_normal_transfer;
    let allow_mixed_carrotness = flags & ALLOW_MIXED_CARROT_PRE_CARROT != 0 && !must_use_carrot;

    // Self-send-only transactions should churn non-forward-secret inputs first.
    let prefer_non_fs = !is_normal_transfer;

    let mut subsets: Vec<BTreeSet<usize>> = Vec::with_capacity(8);
    let mut push_subset = |subset: &BTreeSet<usize>| {
        if !subset.is_empty() && !subsets.contains(subset) {
            subsets.push(subset.clone());
        }
    };

    if prefer_non_fs {
        if !must_use_carrot {
            push_subset(&pre_carrot);
        }
        push_subset(&external);
    }

    push_subset(&internal);

    // Non-FS subsets after internal. When preferred they are already listed.
    if !must_use_internal {
        if !must_use_carrot {
            push_subset(&pre_carrot);
        }
        push_subset(&external);
    }

    if allow_mixed_carrotness {
        push_subset(&pre_carrot.union(&external).copied().collect());
    }

    if allow_mixed_externality {
        push_subset(&external.union(&internal).copied().collect());
    }

    if allow_mixed_carrotness && allow_mixed_externality {
        push_subset(&all_non_burned);
    }

    Ok(subsets)
}

/// Every input count from [`CARROT_MIN_TX_INPUTS`] to [`CARROT_MAX_TX_INPUTS`]:
/// 1 and 2 in random order, then ascending powers of two, then the rest
/// ascending.
pub fn get_input_counts_in_preferred_order<R: RngCore + CryptoRng>(rng: &mut R) -> Vec<usize> {
    let mut counts = if rng.gen::<bool>() {
        vec![2, 1]
    } else {
        vec![1, 2]
    };

    let mut power_of_2 = 4;
    while power_of_2 <= CARROT_MAX_TX_INPUTS {
        counts.push(power_of_2);
        power_of_2 <<= 1;
    }

    counts.extend((3..=CARROT_MAX_TX_INPUTS).filter(|n| !n.is_power_of_two()));
    counts
}

/// Among the `n` largest amounts for `1 <= n <= max_num_input_count`, find the
/// `n` that maximizes `sum - fee(n)`.
///
/// Returns `(n, sum)`, preferring the smaller `n` on ties, or `(0, 0)` if no
/// input count leaves a positive amount after its fee.
pub fn get_input_count_for_max_usable_money<I>(
    amounts: I,
    max_num_input_count: usize,
    fee_by_input_count: &BTreeMap<usize, u64>,
) -> (usize, u128)
where
    I: IntoIterator<Item = u64>,
{
    let mut amounts: Vec<u64> = amounts.into_iter().collect();
    amounts.sort_unstable_by(|a, b| b.cmp(a));

    let mut best = (0usize, 0u128);
    let mut best_net = 0i128;
    let mut sum = 0u128;
    for (i, &amount) in amounts.iter().take(max_num_input_count).enumerate() {
        let n = i + 1;
        sum += amount as u128;
        let Some(&fee) = fee_by_input_count.get(&n) else {
            continue;
        };
        let net = sum as i128 - fee as i128;
        if net > best_net {
            best_net = net;
            best = (n, sum);
        }
    }
    best
}

// ===== Single-transfer selector =====

/// The standard [`InputSelector`] for one transaction.
pub struct SingleTransferInputSelector {
    input_candidates: Vec<InputCandidate>,
    policies: Vec<Box<dyn InputSelectionPolicy>>,
    flags: u32,
    rng: StdRng,
    selected_input_indices: BTreeSet<usize>,
}

impl SingleTransferInputSelector {
    pub fn new<R: RngCore + CryptoRng>(
        input_candidates: Vec<InputCandidate>,
        policies: Vec<Box<dyn InputSelectionPolicy>>,
        flags: u32,
        rng: &mut R,
    ) -> Self {
        Self {
            input_candidates,
            policies,
            flags,
            rng: child_rng(rng),
            selected_input_indices: BTreeSet::new(),
        }
    }

    pub fn input_candidates(&self) -> &[InputCandidate] {
        &self.input_candidates
    }

    /// Candidate indices picked by the last successful selection.
    pub fn selected_input_indices(&self) -> &BTreeSet<usize> {
        &self.selected_input_indices
    }

    fn max_usable_money(
        &self,
        subset: &BTreeSet<usize>,
        max_num_input_count: usize,
        fee_by_input_count: &BTreeMap<usize, u64>,
    ) -> (usize, u128) {
        get_input_count_for_max_usable_money(
            subset.iter().map(|&i| self.input_candidates[i].amount()),
            max_num_input_count,
            fee_by_input_count,
        )
    }

    /// Drop candidates worth no more than the fee increase they cause.
    fn filter_dust(
        &self,
        subset: &BTreeSet<usize>,
        n_inputs: usize,
        fee_by_input_count: &BTreeMap<usize, u64>,
    ) -> BTreeSet<usize> {
        if self.flags & ALLOW_DUST != 0 {
            return subset.clone();
        }
        let fee = |n| fee_by_input_count.get(&n).copied().unwrap_or(0);
        let previous_fee = if n_inputs > CARROT_MIN_TX_INPUTS { fee(n_inputs - 1) } else { 0 };
        let dust_threshold = fee(n_inputs).saturating_sub(previous_fee);
        subset
            .iter()
            .copied()
            .filter(|&i| self.input_candidates[i].amount() > dust_threshold)
            .collect()
    }
}

impl InputSelector for SingleTransferInputSelector {
    fn select_inputs(
        &mut self,
        nominal_output_sum: u128,
        fee_by_input_count: &BTreeMap<usize, u64>,
        num_normal_payment_proposals: usize,
        num_selfsend_payment_proposals: usize,
    ) -> Result<Vec<SelectedInput>> {
        self.selected_input_indices.clear();

        // 1. Sanity checks
        let (Some(min_fee), Some(max_fee)) =
            (fee_by_input_count.values().next(), fee_by_input_count.values().last())
        else {
            return Err(CarrotError::MissingComponents);
        };
        if self.policies.is_empty() {
            return Err(CarrotError::MissingComponents);
        }

        log::debug!(
            target: "carrot::selection",
            "selecting from {} candidates with {} policies for {} normal and {} selfsend proposals, output sum {}, fee range {}-{}",
            self.input_candidates.len(),
            self.policies.len(),
            num_normal_payment_proposals,
            num_selfsend_payment_proposals,
            nominal_output_sum,
            min_fee,
            max_fee
        );

        // 2. Required input money per input count
        let subtract_fee = self.flags & IS_KNOWN_FEE_SUBTRACTABLE != 0;
        let required_money_by_input_count: BTreeMap<usize, u128> = fee_by_input_count
            .iter()
            .map(|(&n, &fee)| (n, nominal_output_sum + if subtract_fee { 0 } else { fee as u128 }))
            .collect();
        let absolute_minimum_required_money = required_money_by_input_count
            .values()
            .copied()
            .min()
            .unwrap_or(nominal_output_sum);

        if self.input_candidates.is_empty() {
            return Err(CarrotError::NotEnoughMoney {
                need: absolute_minimum_required_money,
                have: 0,
            });
        }

        // 3. Quick checks on total and usable money
        let total_candidate_money: u128 =
            self.input_candidates.iter().map(|c| c.amount() as u128).sum();
        if total_candidate_money < absolute_minimum_required_money {
            return Err(CarrotError::NotEnoughMoney {
                need: absolute_minimum_required_money,
                have: total_candidate_money,
            });
        }

        let all_indices: BTreeSet<usize> = (0..self.input_candidates.len()).collect();
        let (_, max_usable_money) =
            self.max_usable_money(&all_indices, CARROT_MAX_TX_INPUTS, fee_by_input_count);
        if max_usable_money < absolute_minimum_required_money {
            return Err(CarrotError::NotEnoughUsableMoney {
                need: absolute_minimum_required_money,
                have: max_usable_money,
            });
        }

        // 4. Preferred subsets and input counts
        let subsets = form_preferred_input_candidate_subsets(
            &self.input_candidates,
            self.flags,
            num_normal_payment_proposals != 0,
        )?;
        let input_counts: Vec<usize> = get_input_counts_in_preferred_order(&mut self.rng)
            .into_iter()
            .filter(|n| fee_by_input_count.contains_key(n))
            .collect();

        // 5. Dispatch policies per subset and input count. The first count
        // with enough usable money is final; if all policies decline it, so
        // does the selector.
        let mut selected = BTreeSet::new();
        'subsets: for subset in &subsets {
            let (max_n, max_sum) =
                self.max_usable_money(subset, CARROT_MAX_TX_INPUTS, fee_by_input_count);
            if max_n == 0 || max_sum < required_money_by_input_count[&max_n] {
                continue;
            }

            log::debug!(
                target: "carrot::selection",
                "trying {}-candidate subset with max usable money {}",
                subset.len(),
                format_amount(max_sum)
            );
            for &idx in subset {
                let c = &self.input_candidates[idx];
                log::trace!(
                    target: "carrot::selection",
                    "    [{}] amount={} block_index={} carrot={} external={}",
                    idx,
                    c.amount(),
                    c.block_index,
                    !c.is_pre_carrot,
                    c.is_external
                );
            }

            for &n_inputs in &input_counts {
                let required_money = required_money_by_input_count[&n_inputs];
                let (count, sum) = self.max_usable_money(subset, n_inputs, fee_by_input_count);
                if count != n_inputs || sum < required_money {
                    continue;
                }

                log::debug!(target: "carrot::selection", "trying selection with {} inputs", n_inputs);

                let filtered = self.filter_dust(subset, n_inputs, fee_by_input_count);
                let required = BTreeMap::from([(n_inputs, required_money)]);
                for policy in &self.policies {
                    let picked = policy.select(&self.input_candidates, &filtered, &required);
                    if picked.is_empty() {
                        continue;
                    }
                    if picked.len() != n_inputs {
                        return Err(CarrotError::LogicError(format!(
                            "policy selected {} inputs, expected {}",
                            picked.len(),
                            n_inputs
                        )));
                    }
                    if !picked.is_subset(&filtered) {
                        return Err(CarrotError::LogicError(
                            "policy returned an unselectable index".into(),
                        ));
                    }
                    selected = picked;
                    break 'subsets;
                }

                log::debug!(
                    target: "carrot::selection",
                    "all policies declined {} inputs with enough usable money",
                    n_inputs
                );
                return Err(CarrotError::InputSelectionFailed);
            }
        }

        // 6. Final checks
        if selected.is_empty() {
            return Err(CarrotError::NotEnoughUsableMoney {
                need: absolute_minimum_required_money,
                have: max_usable_money,
            });
        }

        let input_amount_sum: u128 = selected
            .iter()
            .map(|&i| self.input_candidates[i].amount() as u128)
            .sum();
        if input_amount_sum < required_money_by_input_count[&selected.len()] {
            return Err(CarrotError::LogicError(
                "input selection succeeded without enough funds".into(),
            ));
        }

        let selected_inputs = selected.iter().map(|&i| self.input_candidates[i].core).collect();
        log::debug!(
            target: "carrot::selection",
            "selected inputs {:?} summing to {}",
            selected,
            format_amount(input_amount_sum)
        );
        self.selected_input_indices = selected;
        Ok(selected_inputs)
    }
}

// ===== Policies =====

/// Stock input selection policies.
pub mod policy {
    use std::collections::{BTreeMap, BTreeSet};

    use crate::payment_proposal::InputCandidate;

    /// Pick the highest amounts, then swap each selected input, newest first,
    /// for the oldest unselected input that keeps the sum above the
    /// requirement.
    pub fn select_greedy_aging(
        input_candidates: &[InputCandidate],
        selectable_inputs: &BTreeSet<usize>,
        required_money_by_input_count: &BTreeMap<usize, u128>,
    ) -> BTreeSet<usize> {
        required_money_by_input_count
            .iter()
            .map(|(&n, &required)| greedy_aging_for_count(input_candidates, selectable_inputs, n, required))
            .find(|selected| !selected.is_empty())
            .unwrap_or_default()
    }

    fn greedy_aging_for_count(
        input_candidates: &[InputCandidate],
        selectable_inputs: &BTreeSet<usize>,
        n_inputs: usize,
        required_money: u128,
    ) -> BTreeSet<usize> {
        log::trace!(
            target: "carrot::selection",
            "greedy aging: n_inputs={}, selectable={}",
            n_inputs,
            selectable_inputs.len()
        );
        if n_inputs == 0 || n_inputs > selectable_inputs.len() {
            return BTreeSet::new();
        }

        let amount = |i: usize| input_candidates[i].amount();
        let block_index = |i: usize| input_candidates[i].block_index;

        let mut by_amount: Vec<usize> = selectable_inputs.iter().copied().collect();
        by_amount.sort_by_key(|&i| amount(i));

        let mut selected: BTreeSet<usize> = by_amount.iter().rev().take(n_inputs).copied().collect();
        let mut input_amount_sum: u128 = selected.iter().map(|&i| amount(i) as u128).sum();
        if input_amount_sum < required_money {
            log::debug!(
                target: "carrot::selection",
                "not enough money in {} inputs: {}",
                n_inputs,
                input_amount_sum
            );
            return BTreeSet::new();
        }

        let mut newest_first: Vec<usize> = selected.iter().copied().collect();
        newest_first.sort_by(|&a, &b| block_index(b).cmp(&block_index(a)));

        for current in newest_first {
            let surplus = input_amount_sum - required_money;
            let current_amount = amount(current) as u128;
            let lowest_replacement_amount = current_amount.saturating_sub(surplus);

            let start = by_amount.partition_point(|&i| (amount(i) as u128) < lowest_replacement_amount);
            let replacement = by_amount[start..]
                .iter()
                .copied()
                .filter(|i| !selected.contains(i) && block_index(*i) < block_index(current))
                .min_by_key(|&i| (block_index(i), i));

            if let Some(replacement) = replacement {
                selected.remove(&current);
                selected.insert(replacement);
                input_amount_sum = input_amount_sum - current_amount + amount(replacement) as u128;
            }
        }

        selected
    }

    /// For 2-input transactions: pair the oldest possible input with the
    /// smallest other input that covers the rest.
    ///
    /// Dust is whatever the selector left in `selectable_inputs`; with
    /// `ALLOW_DUST` that includes inputs below their marginal fee.
    pub fn select_two_inputs_prefer_oldest(
        input_candidates: &[InputCandidate],
        selectable_inputs: &BTreeSet<usize>,
        required_money_by_input_count: &BTreeMap<usize, u128>,
    ) -> BTreeSet<usize> {
        let Some(&required_money) = required_money_by_input_count.get(&2) else {
            return BTreeSet::new();
        };
        if selectable_inputs.len() < 2 {
            return BTreeSet::new();
        }

        let amount = |i: usize| input_candidates[i].amount() as u128;

        let mut by_amount: Vec<usize> = selectable_inputs.iter().copied().collect();
        by_amount.sort_by_key(|&i| (amount(i), i));

        let mut by_age: Vec<usize> = selectable_inputs.iter().copied().collect();
        by_age.sort_by_key(|&i| (input_candidates[i].block_index, i));

        for oldest in by_age {
            let remainder = required_money.saturating_sub(amount(oldest));
            let start = by_amount.partition_point(|&i| amount(i) < remainder);
            if let Some(&other) = by_amount[start..].iter().find(|&&i| i != oldest) {
                return BTreeSet::from([oldest, other]);
            }
        }

        BTreeSet::new()
    }
}
