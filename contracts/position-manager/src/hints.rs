//! Hint Helpers
//!
//! Read-only walks that callers run before submitting a redemption or an
//! index update. Hints only shorten the engine's search; a stale hint costs
//! a local re-scan and never changes the outcome.

use sha2::{Digest, Sha256};

use xusd_common::{
    errors::XusdResult,
    math::{collateral_for_debt, compute_nominal_cr, safe_sub},
    traits::LiquidityBuffer,
    types::Address,
};

use crate::domain::DomainState;

/// Starting point and partial-redemption key for a redemption of `truncated_amount`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RedemptionHints {
    pub first_hint: Option<Address>,
    /// Nominal ratio the last position ends at, 0 when no partial redemption happens
    pub partial_nicr: u128,
    /// Largest amount not above the request that the walk can redeem cleanly
    pub truncated_amount: u64,
}

/// Best sampled neighbour for an index insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApproxHint {
    pub hint: Option<Address>,
    /// Distance between the hint's nominal ratio and the requested one
    pub diff: u128,
    /// Seed to continue sampling from
    pub latest_seed: [u8; 32],
}

impl<B: LiquidityBuffer> DomainState<B> {
    /// Simulate a redemption walk without touching state
    ///
    /// A position that cannot give up any debt without dropping below the
    /// minimum net debt is passed over, as `redeem_collateral` does. Otherwise
    /// the last position is redeemed down to at most the minimum and the walk
    /// ends there, so `truncated_amount` is an amount the engine redeems in
    /// full. Redeeming the untruncated amount instead skips that position and
    /// may draw more from the ones above it.
    pub fn get_redemption_hints(&self, amount: u64, price: u64, max_iterations: u64) -> XusdResult<RedemptionHints> {
        let first_hint = self.first_redeemable(price)?;
        let min_net_debt = self.params.min_net_debt;

        let mut remaining = amount;
        let mut partial_nicr = 0;
        let mut iterations_left = if max_iterations == 0 { u64::MAX } else { max_iterations };
        let mut current = first_hint;

        while let Some(owner) = current {
            if remaining == 0 || iterations_left == 0 {
                break;
            }
            iterations_left -= 1;

            let entire = self.book.entire_debt_and_coll(&owner)?;
            let net_debt = self.params.net_debt(entire.debt);

            if net_debt > remaining {
                // Redeem only what keeps the position at or above the minimum
                let lot = remaining.min(net_debt.saturating_sub(min_net_debt));
                if lot == 0 {
                    current = self.sorted.prev(&owner);
                    continue;
                }
                let new_coll = safe_sub(entire.coll, collateral_for_debt(lot, price)?)?;
                let new_debt = safe_sub(entire.debt, lot)?;
                partial_nicr = compute_nominal_cr(new_coll, new_debt)?;
                remaining -= lot;
                break;
            }

            remaining -= net_debt;
            current = self.sorted.prev(&owner);
        }

        Ok(RedemptionHints {
            first_hint,
            partial_nicr,
            truncated_amount: amount - remaining,
        })
    }

    /// Sample `num_trials` owners and keep the one whose nominal ratio is closest to `nicr`
    ///
    /// Starts from the index tail. Each trial hashes the seed and picks
    /// `owners[seed % len]`, so equal seeds give equal hints.
    pub fn get_approx_hint(&self, nicr: u128, num_trials: u64, seed: [u8; 32]) -> XusdResult<ApproxHint> {
        let Some(tail) = self.sorted.last() else {
            return Ok(ApproxHint {
                hint: None,
                diff: 0,
                latest_seed: seed,
            });
        };

        let mut hint = tail;
        let mut diff = self.nominal_icr(&tail)?.abs_diff(nicr);
        let mut latest_seed = seed;
        let len = self.owners.len() as u64;

        for _ in 1..num_trials {
            latest_seed = Sha256::digest(latest_seed).into();
            let mut word = [0u8; 8];
            word.copy_from_slice(&latest_seed[..8]);
            let index = (u64::from_be_bytes(word) % len) as usize;

            let Some(candidate) = self.owner_at(index) else {
                continue;
            };
            let candidate_diff = self.nominal_icr(&candidate)?.abs_diff(nicr);
            if candidate_diff < diff {
                diff = candidate_diff;
                hint = candidate;
            }
        }

        Ok(ApproxHint {
            hint: Some(hint),
            diff,
            latest_seed,
        })
    }

    /// Index slot for `nicr`, searching from whichever hint is still usable
    pub fn find_insert_position(
        &self,
        nicr: u128,
        prev_hint: Option<Address>,
        next_hint: Option<Address>,
    ) -> XusdResult<(Option<Address>, Option<Address>)> {
        self.sorted.find_insert_position(nicr, prev_hint, next_hint, &self.book)
    }
}
