//! Fee carving: after inputs are chosen, adjust output amounts so that
//! `inputs == outputs + fee` holds exactly.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};

use crate::payment_proposal::{child_rng, PaymentProposal, VerifiableSelfSendProposal};
use crate::{CarrotError, Result};

/// Balances a proposal once its input sum and fee are known.
pub trait FeeCarver {
    fn carve_fees_and_balance(
        &mut self,
        input_amount_sum: u128,
        fee: u64,
        normal_payment_proposals: &mut [PaymentProposal],
        selfsend_payment_proposals: &mut [VerifiableSelfSendProposal],
    ) -> Result<()>;
}

impl<F> FeeCarver for F
where
    F: FnMut(u128, u64, &mut [PaymentProposal], &mut [VerifiableSelfSendProposal]) -> Result<()>,
{
    fn carve_fees_and_balance(
        &mut self,
        input_amount_sum: u128,
        fee: u64,
        normal_payment_proposals: &mut [PaymentProposal],
        selfsend_payment_proposals: &mut [VerifiableSelfSendProposal],
    ) -> Result<()> {
        self(input_amount_sum, fee, normal_payment_proposals, selfsend_payment_proposals)
    }
}

fn not_enough_in_subtractable() -> CarrotError {
    CarrotError::InvalidArgument("not enough funds in subtractable payment".into())
}

fn subtract(amount: &mut u64, by: u64) -> Result<()> {
    *amount = amount.checked_sub(by).ok_or_else(not_enough_in_subtractable)?;
    Ok(())
}

// ===== Transfer =====

/// Carver for ordinary transfers.
///
/// The last self-send is the implicit change output and receives
/// `inputs - outputs`; the fee is then split evenly across the subtractable
/// outputs. With no subtractable outputs given, the change output pays it.
pub struct SubtractableFeeCarver {
    subtractable_normal_payment_proposals: BTreeSet<usize>,
    subtractable_selfsend_payment_proposals: BTreeSet<usize>,
    rng: StdRng,
}

impl SubtractableFeeCarver {
    pub fn new<R: RngCore + CryptoRng>(
        subtractable_normal_payment_proposals: BTreeSet<usize>,
        subtractable_selfsend_payment_proposals: BTreeSet<usize>,
        rng: &mut R,
    ) -> Self {
        Self {
            subtractable_normal_payment_proposals,
            subtractable_selfsend_payment_proposals,
            rng: child_rng(rng),
        }
    }
}

impl FeeCarver for SubtractableFeeCarver {
    fn carve_fees_and_balance(
        &mut self,
        input_amount_sum: u128,
        fee: u64,
        normal_payment_proposals: &mut [PaymentProposal],
        selfsend_payment_proposals: &mut [VerifiableSelfSendProposal],
    ) -> Result<()> {
        let num_normal = normal_payment_proposals.len();
        let num_selfsend = selfsend_payment_proposals.len();
        if num_selfsend == 0 {
            return Err(CarrotError::InvalidArgument("missing a selfsend proposal".into()));
        }

        let subtractable_normal = &self.subtractable_normal_payment_proposals;
        let mut subtractable_selfsend = self.subtractable_selfsend_payment_proposals.clone();
        if subtractable_normal.is_empty() && subtractable_selfsend.is_empty() {
            subtractable_selfsend.insert(num_selfsend - 1);
        }

        if subtractable_normal.last().is_some_and(|&i| i >= num_normal) {
            return Err(CarrotError::InvalidArgument(
                "subtractable normal proposal index out of bounds".into(),
            ));
        }
        if subtractable_selfsend.last().is_some_and(|&i| i >= num_selfsend) {
            return Err(CarrotError::InvalidArgument(
                "subtractable selfsend proposal index out of bounds".into(),
            ));
        }

        if selfsend_payment_proposals[num_selfsend - 1].proposal.amount != 0 {
            return Err(CarrotError::LogicError(
                "implicit change output has non-zero amount".into(),
            ));
        }

        // Implicit change takes whatever the inputs leave over, before fee.
        let output_amount_sum: u128 = normal_payment_proposals
            .iter()
            .map(|p| p.amount as u128)
            .chain(selfsend_payment_proposals.iter().map(|p| p.proposal.amount as u128))
            .sum();
        let change_amount = input_amount_sum.checked_sub(output_amount_sum).ok_or_else(|| {
            CarrotError::NotEnoughMoney {
                need: output_amount_sum,
                have: input_amount_sum,
            }
        })?;
        selfsend_payment_proposals[num_selfsend - 1].proposal.amount = u64::try_from(change_amount)
            .map_err(|_| CarrotError::IntegerOverflow("implicit change amount".into()))?;

        let num_subtractable = (subtractable_normal.len() + subtractable_selfsend.len()) as u64;
        let minimum_subtraction = fee / num_subtractable;
        let mut fee_remainder = fee % num_subtractable;

        for &i in subtractable_normal {
            subtract(&mut normal_payment_proposals[i].amount, minimum_subtraction)?;
        }
        for &i in &subtractable_selfsend {
            subtract(&mut selfsend_payment_proposals[i].proposal.amount, minimum_subtraction)?;
        }

        for &i in &subtractable_selfsend {
            if fee_remainder == 0 {
                break;
            }
            subtract(&mut selfsend_payment_proposals[i].proposal.amount, 1)?;
            fee_remainder -= 1;
        }

        if fee_remainder != 0 {
            // Remainder units land on recipients in random order.
            let mut shuffled: Vec<usize> = subtractable_normal.iter().copied().collect();
            shuffled.shuffle(&mut self.rng);
            for i in shuffled {
                if fee_remainder == 0 {
                    break;
                }
                subtract(&mut normal_payment_proposals[i].amount, 1)?;
                fee_remainder -= 1;
            }
        }

        if fee_remainder != 0 {
            return Err(CarrotError::LogicError("fee remainder left after carving".into()));
        }

        log::debug!(
            target: "carrot::proposal",
            "carved fee {} over {} subtractable outputs",
            fee,
            num_subtractable
        );
        Ok(())
    }
}

// ===== Sweep =====

/// Carver for sweeps: everything after the fee is split evenly over the swept
/// outputs, in random order for the remainder units.
pub struct SweepCarver {
    is_selfsend_sweep: bool,
    rng: StdRng,
}

impl SweepCarver {
    pub fn new<R: RngCore + CryptoRng>(is_selfsend_sweep: bool, rng: &mut R) -> Self {
        Self {
            is_selfsend_sweep,
            rng: child_rng(rng),
        }
    }
}

impl FeeCarver for SweepCarver {
    fn carve_fees_and_balance(
        &mut self,
        input_amount_sum: u128,
        fee: u64,
        normal_payment_proposals: &mut [PaymentProposal],
        selfsend_payment_proposals: &mut [VerifiableSelfSendProposal],
    ) -> Result<()> {
        let mut amounts: Vec<&mut u64> = if self.is_selfsend_sweep {
            selfsend_payment_proposals
                .iter_mut()
                .map(|p| &mut p.proposal.amount)
                .collect()
        } else {
            normal_payment_proposals.iter_mut().map(|p| &mut p.amount).collect()
        };
        if amounts.is_empty() {
            return Err(CarrotError::MissingComponents);
        }
        amounts.shuffle(&mut self.rng);

        let output_amount_sum = input_amount_sum.checked_sub(fee as u128).ok_or(
            CarrotError::NotEnoughMoney {
                need: fee as u128,
                have: input_amount_sum,
            },
        )?;
        let n = amounts.len() as u128;
        let minimum_sweep_amount = u64::try_from(output_amount_sum / n)
            .map_err(|_| CarrotError::IntegerOverflow("sweep output amount".into()))?;
        let num_remaining = (output_amount_sum % n) as usize;

        for (i, amount) in amounts.into_iter().enumerate() {
            *amount = minimum_sweep_amount + u64::from(i < num_remaining);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrot_types::{CarrotDestination, EnoteType, SubaddressIndexExtended};
    use rand::SeedableRng;

    use crate::payment_proposal::SelfSendPaymentProposal;

    fn normal(amount: u64) -> PaymentProposal {
        PaymentProposal {
            destination: CarrotDestination::main_address([1; 32], [2; 32]),
            amount,
            randomness: [3; 16],
        }
    }

    fn selfsend(amount: u64) -> VerifiableSelfSendProposal {
        VerifiableSelfSendProposal::new(
            SelfSendPaymentProposal::new([4; 32], amount, EnoteType::Change),
            SubaddressIndexExtended::main(),
        )
    }

    fn balance(input_sum: u128, fee: u64, normals: &[PaymentProposal], selfsends: &[VerifiableSelfSendProposal]) -> i128 {
        input_sum as i128
            - fee as i128
            - normals.iter().map(|p| p.amount as i128).sum::<i128>()
            - selfsends.iter().map(|p| p.proposal.amount as i128).sum::<i128>()
    }

    #[test]
    fn test_default_change_pays_fee() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut carver = SubtractableFeeCarver::new(BTreeSet::new(), BTreeSet::new(), &mut rng);
        let mut normals = vec![normal(600)];
        let mut selfsends = vec![selfsend(0)];
        carver.carve_fees_and_balance(1000, 30, &mut normals, &mut selfsends).unwrap();
        assert_eq!(normals[0].amount, 600);
        assert_eq!(selfsends[0].proposal.amount, 370);
        assert_eq!(balance(1000, 30, &normals, &selfsends), 0);
    }

    #[test]
    fn test_subtractable_remainder_distribution() {
        for fee in [0u64, 1, 2, 3, 4, 5, 97, 100] {
            let mut rng = StdRng::seed_from_u64(fee);
            let mut carver =
                SubtractableFeeCarver::new(BTreeSet::from([0, 1, 2]), BTreeSet::from([0]), &mut rng);
            let mut normals = vec![normal(100), normal(100), normal(100)];
            let mut selfsends = vec![selfsend(50), selfsend(0)];
            carver
                .carve_fees_and_balance(550, fee, &mut normals, &mut selfsends)
                .unwrap();

            assert_eq!(balance(550, fee, &normals, &selfsends), 0);
            // Not subtractable here, so the change output keeps inputs - outputs.
            assert_eq!(selfsends[1].proposal.amount, 200);

            let per_output = fee / 4;
            let remainder = fee % 4;
            assert_eq!(50 - selfsends[0].proposal.amount, per_output + remainder.min(1));
            for p in &normals {
                let paid = 100 - p.amount;
                assert!(paid == per_output || paid == per_output + 1);
            }
        }
    }

    #[test]
    fn test_subtractable_selfsend_takes_remainder_first() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut carver =
            SubtractableFeeCarver::new(BTreeSet::from([0]), BTreeSet::from([1]), &mut rng);
        let mut normals = vec![normal(500)];
        let mut selfsends = vec![selfsend(100), selfsend(0)];
        // Change = 1000 - 600 = 400; fee 11 split 5 + 5, remainder 1 from the self-send.
        carver.carve_fees_and_balance(1000, 11, &mut normals, &mut selfsends).unwrap();
        assert_eq!(normals[0].amount, 495);
        assert_eq!(selfsends[0].proposal.amount, 100);
        assert_eq!(selfsends[1].proposal.amount, 394);
    }

    #[test]
    fn test_subtractable_underflow() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut carver = SubtractableFeeCarver::new(BTreeSet::from([0]), BTreeSet::new(), &mut rng);
        let mut normals = vec![normal(5)];
        let mut selfsends = vec![selfsend(0)];
        let err = carver.carve_fees_and_balance(5, 10, &mut normals, &mut selfsends).unwrap_err();
        assert!(matches!(err, CarrotError::InvalidArgument(msg) if msg.contains("not enough funds")));
    }

    #[test]
    fn test_subtractable_index_out_of_bounds() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut carver = SubtractableFeeCarver::new(BTreeSet::from([1]), BTreeSet::new(), &mut rng);
        let mut normals = vec![normal(5)];
        let mut selfsends = vec![selfsend(0)];
        assert!(matches!(
            carver.carve_fees_and_balance(100, 10, &mut normals, &mut selfsends),
            Err(CarrotError::InvalidArgument(_))
        ));

        let mut carver = SubtractableFeeCarver::new(BTreeSet::new(), BTreeSet::from([3]), &mut rng);
        assert!(matches!(
            carver.carve_fees_and_balance(100, 10, &mut normals, &mut selfsends),
            Err(CarrotError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sweep_equal_split() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut carver = SweepCarver::new(false, &mut rng);
        let mut normals = vec![normal(0), normal(0), normal(0)];
        let mut selfsends = vec![selfsend(0)];
        carver.carve_fees_and_balance(1003, 1, &mut normals, &mut selfsends).unwrap();

        let mut amounts: Vec<u64> = normals.iter().map(|p| p.amount).collect();
        amounts.sort_unstable();
        assert_eq!(amounts, vec![334, 334, 334]);
        assert_eq!(selfsends[0].proposal.amount, 0);

        let mut normals = vec![normal(0), normal(0), normal(0)];
        carver.carve_fees_and_balance(1001, 0, &mut normals, &mut selfsends).unwrap();
        let mut amounts: Vec<u64> = normals.iter().map(|p| p.amount).collect();
        amounts.sort_unstable();
        assert_eq!(amounts, vec![333, 334, 334]);
    }

    #[test]
    fn test_sweep_selfsend_and_short_inputs() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut carver = SweepCarver::new(true, &mut rng);
        let mut normals = vec![normal(0)];
        let mut selfsends = vec![selfsend(0)];
        carver.carve_fees_and_balance(100, 40, &mut normals, &mut selfsends).unwrap();
        assert_eq!(selfsends[0].proposal.amount, 60);
        assert_eq!(normals[0].amount, 0);

        assert!(matches!(
            carver.carve_fees_and_balance(30, 40, &mut normals, &mut selfsends),
            Err(CarrotError::NotEnoughMoney { need: 40, have: 30 })
        ));
    }

    #[test]
    fn test_closure_carver() {
        let mut carver = |input_sum: u128,
                          fee: u64,
                          normals: &mut [PaymentProposal],
                          _: &mut [VerifiableSelfSendProposal]|
         -> Result<()> {
            normals[0].amount = (input_sum - fee as u128) as u64;
            Ok(())
        };
        let mut normals = vec![normal(0)];
        carver.carve_fees_and_balance(50, 5, &mut normals, &mut []).unwrap();
        assert_eq!(normals[0].amount, 45);
    }
}
