//! Transfer builder.
//!
//! Fluent front-end over the proposal functions. Collects destinations,
//! self-sends, candidates and fee settings, then produces a transfer or a
//! sweep proposal.

use std::collections::BTreeSet;

use carrot_types::constants::DEFAULT_FEE_PER_WEIGHT;
use carrot_types::{CarrotDestination, PublicKey, SubaddressIndexExtended};
use rand::{CryptoRng, RngCore};

use crate::fee::FeePriority;
use crate::input_selection::{
    input_selection_flags, policy, InputSelectionConfig, InputSelectionPolicy,
    SingleTransferInputSelector,
};
use crate::payment_proposal::{
    InputCandidate, PaymentProposal, SelectedInput, VerifiableSelfSendProposal,
};
use crate::proposal::{
    make_carrot_transaction_proposal_v1_sweep, make_carrot_transaction_proposal_v1_transfer,
    TransactionProposal,
};
use crate::{CarrotError, Result};

/// A payment not yet given its enote randomness.
#[derive(Debug, Clone, Copy)]
enum PendingPayment {
    Destination(CarrotDestination, u64),
    Proposal(PaymentProposal),
}

/// Builder for Carrot transfer and sweep proposals.
pub struct TransferBuilder {
    payments: Vec<PendingPayment>,
    selfsends: Vec<VerifiableSelfSendProposal>,
    change_spend_pubkey: Option<PublicKey>,
    change_index: SubaddressIndexExtended,
    base_fee_per_weight: u64,
    priority: FeePriority,
    fee_per_weight: Option<u64>,
    extra: Vec<u8>,
    candidates: Vec<InputCandidate>,
    policies: Vec<Box<dyn InputSelectionPolicy>>,
    config: InputSelectionConfig,
    subtractable_normal: BTreeSet<usize>,
    subtractable_selfsend: BTreeSet<usize>,
}

impl TransferBuilder {
    /// Create a new transfer builder.
    pub fn new() -> Self {
        Self {
            payments: Vec::new(),
            selfsends: Vec::new(),
            change_spend_pubkey: None,
            change_index: SubaddressIndexExtended::main(),
            base_fee_per_weight: DEFAULT_FEE_PER_WEIGHT,
            priority: FeePriority::Normal,
            fee_per_weight: None,
            extra: Vec::new(),
            candidates: Vec::new(),
            policies: Vec::new(),
            config: InputSelectionConfig::default(),
            subtractable_normal: BTreeSet::new(),
            subtractable_selfsend: BTreeSet::new(),
        }
    }

    /// Pay `amount` to `destination`.
    pub fn add_destination(mut self, destination: CarrotDestination, amount: u64) -> Self {
        self.payments.push(PendingPayment::Destination(destination, amount));
        self
    }

    /// Add a payment with caller-chosen randomness.
    pub fn add_payment_proposal(mut self, proposal: PaymentProposal) -> Self {
        self.payments.push(PendingPayment::Proposal(proposal));
        self
    }

    pub fn add_selfsend(mut self, proposal: VerifiableSelfSendProposal) -> Self {
        self.selfsends.push(proposal);
        self
    }

    /// Take a share of the fee out of the `index`-th normal payment.
    pub fn subtract_fee_from_payment(mut self, index: usize) -> Self {
        self.subtractable_normal.insert(index);
        self
    }

    /// Take a share of the fee out of the `index`-th self-send.
    pub fn subtract_fee_from_selfsend(mut self, index: usize) -> Self {
        self.subtractable_selfsend.insert(index);
        self
    }

    /// Set where change and synthetic self-sends go.
    pub fn set_change_address(mut self, spend_pubkey: PublicKey, index: SubaddressIndexExtended) -> Self {
        self.change_spend_pubkey = Some(spend_pubkey);
        self.change_index = index;
        self
    }

    /// Set the fee priority level.
    pub fn set_priority(mut self, priority: FeePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the base fee per weight the priority multiplier applies to.
    pub fn set_base_fee_per_weight(mut self, base_fee_per_weight: u64) -> Self {
        self.base_fee_per_weight = base_fee_per_weight;
        self
    }

    /// Set an explicit fee per weight (overrides priority).
    pub fn set_fee_per_weight(mut self, fee_per_weight: u64) -> Self {
        self.fee_per_weight = Some(fee_per_weight);
        self
    }

    /// Caller bytes appended to the default Carrot `tx.extra` fields.
    pub fn set_extra(mut self, extra: Vec<u8>) -> Self {
        self.extra = extra;
        self
    }

    pub fn add_input_candidate(mut self, candidate: InputCandidate) -> Self {
        self.candidates.push(candidate);
        self
    }

    pub fn add_input_candidates(mut self, candidates: impl IntoIterator<Item = InputCandidate>) -> Self {
        self.candidates.extend(candidates);
        self
    }

    /// Append a selection policy. Without any, the stock policies are used.
    pub fn add_policy(mut self, policy: Box<dyn InputSelectionPolicy>) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn set_selection_config(mut self, config: InputSelectionConfig) -> Self {
        self.config = config;
        self
    }

    /// The fee per weight a build would use.
    pub fn effective_fee_per_weight(&self) -> Result<u64> {
        match self.fee_per_weight {
            Some(fee_per_weight) => Ok(fee_per_weight),
            None => self.priority.fee_per_weight(self.base_fee_per_weight),
        }
    }

    fn change_spend_pubkey(&self) -> Result<PublicKey> {
        self.change_spend_pubkey.ok_or(CarrotError::MissingComponents)
    }

    fn payment_proposals<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Vec<PaymentProposal> {
        self.payments
            .iter()
            .map(|p| match *p {
                PendingPayment::Destination(destination, amount) => {
                    PaymentProposal::new(destination, amount, rng)
                }
                PendingPayment::Proposal(proposal) => proposal,
            })
            .collect()
    }

    /// Build a transfer, selecting inputs from the candidates.
    pub fn build<R: RngCore + CryptoRng>(self, rng: &mut R) -> Result<TransactionProposal> {
        if self.payments.is_empty() && self.selfsends.is_empty() {
            return Err(CarrotError::TooFewOutputs);
        }
        let change_spend_pubkey = self.change_spend_pubkey()?;
        let fee_per_weight = self.effective_fee_per_weight()?;
        let normal = self.payment_proposals(rng);

        let mut flags = self.config.flags();
        if !self.subtractable_normal.is_empty() || !self.subtractable_selfsend.is_empty() {
            flags |= input_selection_flags::IS_KNOWN_FEE_SUBTRACTABLE;
        }

        let policies = if self.policies.is_empty() {
            default_policies()
        } else {
            self.policies
        };
        let mut selector = SingleTransferInputSelector::new(self.candidates, policies, flags, rng);

        make_carrot_transaction_proposal_v1_transfer(
            &normal,
            &self.selfsends,
            fee_per_weight,
            &self.extra,
            &mut selector,
            &change_spend_pubkey,
            &self.change_index,
            &self.subtractable_normal,
            &self.subtractable_selfsend,
            rng,
        )
    }

    /// Build a sweep of exactly `inputs`. All destinations must have amount 0.
    pub fn build_sweep<R: RngCore + CryptoRng>(
        self,
        inputs: Vec<SelectedInput>,
        rng: &mut R,
    ) -> Result<TransactionProposal> {
        let change_spend_pubkey = self.change_spend_pubkey()?;
        let fee_per_weight = self.effective_fee_per_weight()?;
        let normal = self.payment_proposals(rng);

        make_carrot_transaction_proposal_v1_sweep(
            &normal,
            &self.selfsends,
            fee_per_weight,
            &self.extra,
            inputs,
            &change_spend_pubkey,
            &self.change_index,
            rng,
        )
    }
}

impl Default for TransferBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Two-input oldest-first pairing, falling back to greedy aging.
pub fn default_policies() -> Vec<Box<dyn InputSelectionPolicy>> {
    vec![
        Box::new(policy::select_two_inputs_prefer_oldest),
        Box::new(policy::select_greedy_aging),
    ]
}
