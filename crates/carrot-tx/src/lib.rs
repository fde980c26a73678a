//! Carrot transaction proposal construction and input selection.
//!
//! Turns a set of payment proposals into a balanced, consensus-valid
//! transaction proposal: appends the synthetic output the output set needs,
//! generates ephemeral keys and a dummy payment ID, computes the fee table,
//! selects inputs through a pluggable selector, distributes fees through a
//! pluggable carver, and checks the zero-sum balance. Enote derivation,
//! proofs and wire serialization are left to the caller.

pub mod payment_proposal;
pub mod output_set;
pub mod fee;
pub mod input_selection;
pub mod carve;
pub mod proposal;
pub mod multi;
pub mod builder;

pub use builder::{default_policies, TransferBuilder};
pub use carve::{FeeCarver, SubtractableFeeCarver, SweepCarver};
pub use fee::{get_fee_by_input_count, FeePriority};
pub use input_selection::{
    input_selection_flags, InputSelectionConfig, InputSelectionPolicy, InputSelector,
    SingleTransferInputSelector,
};
pub use multi::{
    make_multiple_carrot_transaction_proposals_sweep,
    make_multiple_carrot_transaction_proposals_transfer,
};
pub use output_set::{
    get_additional_output_proposal, get_additional_output_type, get_output_enote_proposals,
    AdditionalOutputProposal, AdditionalOutputType, EnoteDeriver, OutputEnoteProposal,
    PaymentProposalRef,
};
pub use payment_proposal::{
    InputCandidate, PaymentProposal, SelectedInput, SelfSendPaymentProposal,
    VerifiableSelfSendProposal,
};
pub use proposal::{
    make_carrot_transaction_proposal_v1, make_carrot_transaction_proposal_v1_sweep,
    make_carrot_transaction_proposal_v1_transfer, TransactionProposal,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CarrotError {
    #[error("too few outputs")]
    TooFewOutputs,

    #[error("too many outputs")]
    TooManyOutputs,

    #[error("too few inputs")]
    TooFewInputs,

    #[error("too many inputs")]
    TooManyInputs,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("only one integrated address is allowed per transaction")]
    BadAddressType,

    #[error("missing or duplicate enote randomness")]
    MissingRandomness,

    #[error("missing components")]
    MissingComponents,

    #[error("not enough money: need {need}, have {have}")]
    NotEnoughMoney { need: u128, have: u128 },

    #[error("not enough usable money: need {need}, have {have}")]
    NotEnoughUsableMoney { need: u128, have: u128 },

    #[error("no input selection policy could satisfy the request")]
    InputSelectionFailed,

    #[error("logic error: {0}")]
    LogicError(String),

    #[error("component out of order: {0}")]
    ComponentOutOfOrder(String),

    #[error("integer overflow: {0}")]
    IntegerOverflow(String),

    #[error("invalid point: {0}")]
    InvalidPoint(String),
}

impl CarrotError {
    /// Whether this error means the wallet lacks (usable) funds, as opposed
    /// to a malformed request or an internal bug.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(
            self,
            Self::NotEnoughMoney { .. } | Self::NotEnoughUsableMoney { .. } | Self::InputSelectionFailed
        )
    }
}

pub type Result<T> = std::result::Result<T, CarrotError>;
