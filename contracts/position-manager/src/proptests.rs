//! Property tests for liquidation accounting

use proptest::prelude::*;

use xusd_common::{constants::token::ONE, errors::XusdError, traits::StableToken, types::PositionStatus};

use crate::test_fixtures::*;

/// Open one position per `(coll_units, ratio_pct)` entry, each at or above CCR
fn open_positions(env: &mut TestEnv, specs: &[(u64, u64)]) {
    for (i, (coll_units, ratio_pct)) in specs.iter().enumerate() {
        let debt = coll_units * 1_000 * 100 / ratio_pct * ONE;
        env.open(borrower(i as u8), coll_units * ONE, debt - 2 * ONE);
    }
}

fn position_specs() -> impl Strategy<Value = Vec<(u64, u64)>> {
    prop::collection::vec((1u64..50, 155u64..400), 2..8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_liquidation_conserves_value(
        specs in position_specs(),
        deposit_pct in 0u64..=100,
        price in 300u64..1_000,
    ) {
        let mut env = TestEnv::new();
        open_positions(&mut env, &specs);

        let depositor = borrower(0);
        let deposit = env.balance(&depositor) * deposit_pct / 100;
        if deposit > 0 {
            env.deposit(&depositor, deposit);
        }

        env.set_price(price * ONE);
        let coll_before = env.tracked_collateral();
        let debt_before = env.manager.get_entire_system_debt(&DOMAIN).unwrap();
        let snapshot = borsh::to_vec(env.domain()).unwrap();

        match env.liquidate_positions(specs.len() as u64) {
            Ok(outcome) => {
                prop_assert_eq!(
                    env.tracked_collateral() + outcome.total_coll_gas_compensation,
                    coll_before
                );
                let debt_after = env.manager.get_entire_system_debt(&DOMAIN).unwrap();
                prop_assert_eq!(debt_after + outcome.total_debt_to_offset, debt_before);
                prop_assert_eq!(env.manager.token().total_supply(), debt_after);
                prop_assert_eq!(
                    env.manager.get_index_size(&DOMAIN).unwrap() as usize,
                    env.manager.get_position_owners_count(&DOMAIN).unwrap()
                );
                prop_assert!(env.manager.get_position_owners_count(&DOMAIN).unwrap() >= 1);
            }
            Err(XusdError::NothingToLiquidate) => {
                prop_assert_eq!(borsh::to_vec(env.domain()).unwrap(), snapshot);
            }
            Err(err) => prop_assert!(false, "unexpected error: {err:?}"),
        }
    }

    #[test]
    fn prop_liquidation_sequence_keeps_tcr(
        whale_ratio in 300u64..400,
        specs in prop::collection::vec((1u64..3, 155u64..300), 1..7),
        price in 500u64..1_000,
    ) {
        let mut env = TestEnv::new();
        // Whale at 150%+ even at the lowest price, with a pool larger than every other debt combined
        let whale_debt = 200 * 1_000 * 100 / whale_ratio * ONE;
        env.open(ALICE, 200 * ONE, whale_debt - 2 * ONE);
        open_positions(&mut env, &specs);
        let whale_balance = env.balance(&ALICE);
        env.deposit(&ALICE, whale_balance);

        env.set_price(price * ONE);
        let tcr_before = env.manager.get_tcr(&DOMAIN, price * ONE).unwrap();
        let Ok(outcome) = env.liquidate_positions(specs.len() as u64 + 1) else {
            return Ok(());
        };
        let tcr_after = env.manager.get_tcr(&DOMAIN, price * ONE).unwrap();

        let divisor = env.domain().params().percent_divisor as u128;
        prop_assert!(tcr_after + tcr_before / divisor >= tcr_before);
        if outcome.total_debt_to_redistribute == 0 {
            prop_assert!(tcr_after >= tcr_before);
        }
        prop_assert_eq!(
            env.manager.get_position_status(&DOMAIN, &ALICE).unwrap(),
            PositionStatus::Active
        );
    }

    #[test]
    fn prop_pending_rewards_match_redistribution(
        specs in position_specs(),
        price in 300u64..1_000,
    ) {
        let mut env = TestEnv::new();
        open_positions(&mut env, &specs);
        env.set_price(price * ONE);

        let Some(weakest) = env.domain().sorted().last() else {
            return Ok(());
        };
        let Ok(outcome) = env.liquidate(&weakest) else {
            return Ok(());
        };

        let owners = env.manager.get_position_owners_count(&DOMAIN).unwrap();
        let mut coll_sum = 0u64;
        let mut debt_sum = 0u64;
        for index in 0..owners {
            let owner = env.domain().owner_at(index).unwrap();
            coll_sum += env.manager.get_pending_coll_reward(&DOMAIN, &owner).unwrap();
            debt_sum += env.manager.get_pending_debt_reward(&DOMAIN, &owner).unwrap();
        }

        // Each stake rounds down by at most one unit, plus one for the per-stake rate
        let slack = owners as u64 + 1;
        prop_assert!(coll_sum <= outcome.total_coll_to_redistribute);
        prop_assert!(coll_sum + slack >= outcome.total_coll_to_redistribute);
        prop_assert!(debt_sum <= outcome.total_debt_to_redistribute);
        prop_assert!(debt_sum + slack >= outcome.total_debt_to_redistribute);
    }
}
