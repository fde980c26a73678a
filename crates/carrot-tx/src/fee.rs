//! Fee estimation and transaction weight calculation.
//!
//! Estimates Carrot/FCMP++ transaction weight from structural parameters
//! (input count, output count, extra length) and builds the fee table the
//! input selector works from: one absolute fee per possible input count.

use std::collections::BTreeMap;

use carrot_types::constants::{
    CARROT_MAX_TX_INPUTS, CARROT_MAX_TX_OUTPUTS, CARROT_MIN_TX_INPUTS, CARROT_MIN_TX_OUTPUTS,
    MAX_TX_EXTRA_SIZE,
};
use serde::{Deserialize, Serialize};

use crate::{CarrotError, Result};

/// Size in bytes of an x25519 public key in `tx.extra`.
const X25519_PUBKEY_SIZE: usize = 32;

/// Encrypted payment ID nonce field: pid(8) + nonce tag(1) + nonce size(1) + field tag(1).
const ENC_PID_EXTRA_FIELD_SIZE: usize = 8 + 1 + 1 + 1;

/// Bytes of membership proof attributed to each input.
const MEMBERSHIP_PROOF_SIZE_PER_INPUT: usize = 1152;

/// Spend-authorization and linkability proof per input.
const SAL_PROOF_SIZE: usize = 12 * 32;

/// Fee priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeePriority {
    Low,
    #[default]
    Normal,
    High,
    Highest,
}

impl FeePriority {
    /// Priority multiplier applied to the base fee.
    pub fn multiplier(&self) -> u64 {
        match self {
            FeePriority::Low => 1,
            FeePriority::Normal => 5,
            FeePriority::High => 25,
            FeePriority::Highest => 1000,
        }
    }

    /// Scale a base fee-per-weight by this priority.
    pub fn fee_per_weight(&self, base_fee_per_weight: u64) -> Result<u64> {
        base_fee_per_weight
            .checked_mul(self.multiplier())
            .ok_or_else(|| CarrotError::IntegerOverflow("fee per weight times priority".into()))
    }
}

/// Default byte length of `tx.extra` for a Carrot transaction with
/// `n_outputs` outputs: the encrypted payment ID field plus the ephemeral
/// pubkey field (a single shared key for 2-output transactions).
pub fn get_carrot_default_tx_extra_size(n_outputs: usize) -> Result<usize> {
    if n_outputs > CARROT_MAX_TX_OUTPUTS {
        return Err(CarrotError::TooManyOutputs);
    }
    if n_outputs < CARROT_MIN_TX_OUTPUTS {
        return Err(CarrotError::TooFewOutputs);
    }

    let n_ephemeral = if n_outputs == 2 { 1 } else { n_outputs };
    let use_additional = n_ephemeral > 1;
    let ephemeral_pubkeys_field_size =
        1 + usize::from(use_additional) + n_ephemeral * X25519_PUBKEY_SIZE;

    Ok(ENC_PID_EXTRA_FIELD_SIZE + ephemeral_pubkeys_field_size)
}

/// Estimate the serialized byte size of a Carrot transaction.
pub fn estimate_carrot_tx_size(num_inputs: usize, num_outputs: usize, extra_len: usize) -> usize {
    // version, unlock time, input count, output count
    let prefix_header = 4;
    // tag, zero amount, key image. Membership proofs replace ring offsets.
    let input_prefix = 1 + 1 + 32;
    // tag, zero amount, onetime address, 3-byte view tag, encrypted anchor
    let output_prefix = 1 + 1 + 32 + 3 + 16;
    let extra = varint_size(extra_len as u64) + extra_len;

    // type, fee varint, then compact ecdh amount and commitment per output
    let rct_base = 1 + 4 + num_outputs * (8 + 32);
    // pseudo-output commitment plus spend-authorization proof per input
    let rct_inputs = num_inputs * (32 + SAL_PROOF_SIZE);
    // reference block, tree depth, proof body
    let membership = 32 + 1 + num_inputs * MEMBERSHIP_PROOF_SIZE_PER_INPUT;

    prefix_header
        + num_inputs * input_prefix
        + num_outputs * output_prefix
        + extra
        + rct_base
        + bp_plus_proof_size(num_outputs)
        + rct_inputs
        + membership
}

/// Estimate the weight of a transaction (size + BP+ clawback).
pub fn estimate_carrot_tx_weight(num_inputs: usize, num_outputs: usize, extra_len: usize) -> usize {
    let size = estimate_carrot_tx_size(num_inputs, num_outputs, extra_len);

    if num_outputs > 2 {
        size + bp_plus_clawback(num_outputs)
    } else {
        size
    }
}

/// Absolute fee for every allowed input count, given the output count and
/// the caller's extra bytes on top of the default Carrot extra fields.
pub fn get_fee_by_input_count(
    n_outputs: usize,
    extra_extra_len: usize,
    fee_per_weight: u64,
) -> Result<BTreeMap<usize, u64>> {
    if extra_extra_len > MAX_TX_EXTRA_SIZE {
        return Err(CarrotError::IntegerOverflow("extra extra len is too high".into()));
    }
    let extra_len = get_carrot_default_tx_extra_size(n_outputs)? + extra_extra_len;
    if extra_len > MAX_TX_EXTRA_SIZE {
        return Err(CarrotError::IntegerOverflow(
            "total tx extra len after default fields is too high".into(),
        ));
    }

    fee_table_for_extra_len(n_outputs, extra_len, fee_per_weight)
}

/// Fee table for an already-totalled extra length.
fn fee_table_for_extra_len(
    n_outputs: usize,
    extra_len: usize,
    fee_per_weight: u64,
) -> Result<BTreeMap<usize, u64>> {
    let mut fee_by_input_count = BTreeMap::new();
    for n_inputs in CARROT_MIN_TX_INPUTS..=CARROT_MAX_TX_INPUTS {
        let weight = estimate_carrot_tx_weight(n_inputs, n_outputs, extra_len) as u64;
        if u64::MAX / weight <= fee_per_weight {
            return Err(CarrotError::IntegerOverflow(
                "fee_per_weight is too high and caused fee integer overflow".into(),
            ));
        }
        fee_by_input_count.insert(n_inputs, weight * fee_per_weight);
    }
    Ok(fee_by_input_count)
}

// ─── Internal helpers ────────────────────────────────────────────────────────

/// Padded output count of the aggregated range proof, and its log2.
fn bp_plus_padding(num_outputs: usize) -> (usize, usize) {
    let padded = num_outputs.max(1).next_power_of_two();
    (padded, padded.trailing_zeros() as usize)
}

/// Bulletproofs+ bytes: six fixed elements plus an `L` and `R` per round.
fn bp_plus_proof_size(num_outputs: usize) -> usize {
    if num_outputs == 0 {
        return 0;
    }
    let (_, rounds) = bp_plus_padding(num_outputs);
    32 * (6 + 2 * (6 + rounds))
}

/// Extra weight for proofs over more than two outputs: 4/5 of what the
/// padded outputs would cost as 2-output proofs, less the real proof size.
fn bp_plus_clawback(num_outputs: usize) -> usize {
    if num_outputs <= 2 {
        return 0;
    }
    let (padded, _) = bp_plus_padding(num_outputs);
    let per_output_in_two_out_proof = bp_plus_proof_size(2) / 2;
    (per_output_in_two_out_proof * padded).saturating_sub(bp_plus_proof_size(num_outputs)) * 4 / 5
}

fn varint_size(mut v: u64) -> usize {
    let mut n = 1;
    while v >= 0x80 {
        v >>= 7;
        n += 1;
    }
    n
}
