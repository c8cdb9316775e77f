//! End-to-end scenarios across the manager, the stablecoin ledger, the
//! stability pool and the oracle

use xusd_common::{
    constants::{accounts, precision::DECIMAL_PRECISION, token::ONE},
    errors::XusdError,
    events::EventType,
    fees::fee_for,
    params::RiskParams,
    traits::{LiquidityBuffer, StableToken},
    types::{derive_domain_id, PositionStatus},
};
use xusd_stability_pool::StabilityPool;

use crate::liquidation::capped_offset_vals;
use crate::redemption::RedemptionRequest;
use crate::test_fixtures::*;

const MCR: u128 = 1_100_000_000_000_000_000;

fn snapshot_bytes(env: &TestEnv) -> Vec<u8> {
    borsh::to_vec(env.domain()).unwrap()
}

// ============ Liquidation ============

/// Ten positions pushed into 100-110% ICR in recovery mode after a redistribution
fn recovery_sequence_env() -> TestEnv {
    let mut env = TestEnv::new();
    env.open(DAVE, 20 * ONE, 1_406 * ONE);
    for i in 0..10 {
        env.open(borrower(i), ONE, 98 * ONE);
    }
    env.open(CAROL, ONE / 5, 50 * ONE);

    // Thin position goes under, its debt lands on everyone else as pending rewards
    env.set_price(200 * ONE);
    let seed = env.liquidate(&CAROL).unwrap();
    assert_eq!(seed.total_debt_to_redistribute, 52 * ONE);
    assert!(env.manager.has_pending_rewards(&DOMAIN, &borrower(0)).unwrap());

    env.set_price(105 * ONE);
    env
}

#[test]
fn test_recovery_mode_sequence_closes_eligible_positions() {
    let mut env = recovery_sequence_env();
    assert!(env.manager.check_recovery_mode(&DOMAIN).unwrap());
    for i in 0..10 {
        let icr = env.manager.get_current_icr(&DOMAIN, &borrower(i), 105 * ONE).unwrap();
        assert!(icr > DECIMAL_PRECISION && icr < MCR);
    }
    let whale_before = env.manager.get_position(&DOMAIN, &DAVE).unwrap();
    let liquidator_before = env.balance(&LIQUIDATOR);

    let outcome = env.liquidate_positions(10).unwrap();

    assert_eq!(outcome.count(), 10);
    for i in 0..10 {
        assert_eq!(
            env.manager.get_position_status(&DOMAIN, &borrower(i)).unwrap(),
            PositionStatus::ClosedByLiquidation
        );
    }
    // The healthy position is untouched apart from accrued rewards
    assert_eq!(env.manager.get_position(&DOMAIN, &DAVE).unwrap(), whale_before);
    assert!(env.manager.has_pending_rewards(&DOMAIN, &DAVE).unwrap());
    assert!(env.manager.check_recovery_mode(&DOMAIN).unwrap());

    assert_eq!(env.manager.get_position_owners_count(&DOMAIN).unwrap(), 1);
    assert_eq!(env.manager.get_index_size(&DOMAIN).unwrap(), 1);
    assert_eq!(env.balance(&LIQUIDATOR) - liquidator_before, 10 * 2 * ONE);

    // Nothing was offset, so all debt is still in the system
    assert_eq!(env.manager.get_entire_system_debt(&DOMAIN).unwrap(), 2_460 * ONE);
    let whale = env.manager.get_entire_debt_and_coll(&DOMAIN, &DAVE).unwrap();
    assert!(whale.debt <= 2_460 * ONE && whale.debt + 20 >= 2_460 * ONE);
    assert_eq!(
        env.manager.events().filter_by_type(EventType::Liquidation).len(),
        2
    );
}

#[test]
fn test_recovery_sequence_never_passes_head() {
    let mut env = recovery_sequence_env();
    let outcome = env.liquidate_positions(50).unwrap();
    assert_eq!(outcome.count(), 10);
    assert_eq!(env.manager.get_position_status(&DOMAIN, &DAVE).unwrap(), PositionStatus::Active);
}

#[test]
fn test_sequence_counts_visited_candidates() {
    let mut env = recovery_sequence_env();
    let outcome = env.liquidate_positions(3).unwrap();
    assert_eq!(outcome.count(), 3);
    assert_eq!(env.manager.get_position_owners_count(&DOMAIN).unwrap(), 8);
}

#[test]
fn test_normal_mode_full_offset() {
    let mut env = TestEnv::new();
    env.open(ALICE, 100 * ONE, 10_000 * ONE);
    env.open(BOB, 12 * ONE / 10, 1_000 * ONE);
    env.deposit(&ALICE, 5_000 * ONE);

    env.set_price(900 * ONE);
    assert!(!env.manager.check_recovery_mode(&DOMAIN).unwrap());
    let outcome = env.liquidate(&BOB).unwrap();

    let coll_gas = 12 * ONE / 10 / 200;
    assert_eq!(outcome.total_debt_to_offset, 1_002 * ONE);
    assert_eq!(outcome.total_coll_to_send_to_sp, 12 * ONE / 10 - coll_gas);
    assert_eq!(outcome.total_debt_to_redistribute, 0);
    assert_eq!(outcome.total_coll_gas_compensation, coll_gas);

    let pool = env.domain().buffer();
    assert_eq!(pool.total_deposits(), 3_998 * ONE);
    assert_eq!(pool.collateral(), 12 * ONE / 10 - coll_gas);
    let compounded = pool.get_compounded_deposit(&ALICE).unwrap();
    assert!(compounded <= 3_998 * ONE && compounded + 1 >= 3_998 * ONE);

    // Offset stablecoin is burned from the pool account
    assert_eq!(env.balance(&SP_ACCOUNT), 3_998 * ONE);
    assert_eq!(env.balance(&LIQUIDATOR), 2 * ONE);
    assert!(!env.manager.has_pending_rewards(&DOMAIN, &ALICE).unwrap());
    assert_eq!(
        env.manager.get_position_status(&DOMAIN, &BOB).unwrap(),
        PositionStatus::ClosedByLiquidation
    );
}

#[test]
fn test_normal_mode_partial_offset_redistributes_rest() {
    let mut env = TestEnv::new();
    env.open(ALICE, 100 * ONE, 10_000 * ONE);
    env.open(BOB, 12 * ONE / 10, 1_000 * ONE);
    env.deposit(&ALICE, 500 * ONE);

    env.set_price(900 * ONE);
    let outcome = env.liquidate(&BOB).unwrap();

    assert_eq!(outcome.total_debt_to_offset, 500 * ONE);
    assert_eq!(outcome.total_debt_to_redistribute, 502 * ONE);
    assert_eq!(env.domain().buffer().total_deposits(), 0);

    // ALICE holds the only stake, so she carries the whole remainder
    assert_eq!(env.manager.get_pending_debt_reward(&DOMAIN, &ALICE).unwrap(), 502 * ONE);
    assert_eq!(
        env.manager.get_pending_coll_reward(&DOMAIN, &ALICE).unwrap(),
        outcome.total_coll_to_redistribute
    );
    assert_eq!(env.domain().default_pool().debt, 502 * ONE);
}

#[test]
fn test_recovery_mode_capped_liquidation_leaves_surplus() {
    let mut env = TestEnv::new();
    env.open(ALICE, 100 * ONE, 60_000 * ONE);
    env.open(BOB, 10 * ONE, 8_000 * ONE);
    env.deposit(&ALICE, 10_000 * ONE);

    // TCR ~148.8%, BOB at ~115%: above MCR, below TCR
    env.set_price(920 * ONE);
    assert!(env.manager.check_recovery_mode(&DOMAIN).unwrap());

    let outcome = env.liquidate(&BOB).unwrap();
    let params = RiskParams::default();
    let expected = capped_offset_vals(8_002 * ONE, 10 * ONE, 920 * ONE, &params).unwrap();

    assert_eq!(outcome.total_coll_surplus, expected.coll_surplus);
    assert!(expected.coll_surplus > 0);
    assert_eq!(outcome.total_debt_to_offset, 8_002 * ONE);
    assert_eq!(env.domain().buffer().total_deposits(), 1_998 * ONE);
    assert_eq!(
        env.manager.get_collateral_surplus(&DOMAIN, &BOB).unwrap(),
        expected.coll_surplus
    );

    assert_eq!(
        env.manager.claim_collateral_surplus(&DOMAIN, &BOB).unwrap(),
        expected.coll_surplus
    );
    assert!(matches!(
        env.manager.claim_collateral_surplus(&DOMAIN, &BOB),
        Err(XusdError::SurplusNotFound { .. })
    ));
}

#[test]
fn test_recovery_mode_under_water_skips_buffer() {
    let mut env = TestEnv::new();
    env.open(ALICE, 100 * ONE, 60_000 * ONE);
    env.open(BOB, 10 * ONE, 8_000 * ONE);
    env.deposit(&ALICE, 10_000 * ONE);

    // BOB just under 100%
    env.set_price(800 * ONE);
    let outcome = env.liquidate(&BOB).unwrap();

    assert_eq!(outcome.total_debt_to_offset, 0);
    assert_eq!(outcome.total_debt_to_redistribute, 8_002 * ONE);
    assert_eq!(env.domain().buffer().total_deposits(), 10_000 * ONE);
}

/// Recovery mode with CAROL far above TCR and BOB just above 100%
fn recovery_with_healthy_env() -> TestEnv {
    let mut env = TestEnv::new();
    env.open(ALICE, 100 * ONE, 60_000 * ONE);
    env.open(BOB, 11 * ONE, 8_000 * ONE);
    env.open(CAROL, 30 * ONE, 2_000 * ONE);
    env.deposit(&ALICE, 20_000 * ONE);

    // TCR ~149.0%, BOB ~101.7%, CAROL ~1108.9%
    env.set_price(740 * ONE);
    assert!(env.manager.check_recovery_mode(&DOMAIN).unwrap());
    let tcr = env.manager.get_tcr(&DOMAIN, 740 * ONE).unwrap();
    assert!(env.manager.get_current_icr(&DOMAIN, &CAROL, 740 * ONE).unwrap() > tcr);
    env
}

#[test]
fn test_recovery_mode_position_above_tcr_is_a_noop() {
    let mut env = recovery_with_healthy_env();
    let before = snapshot_bytes(&env);
    let events = env.manager.events().len();

    assert!(matches!(env.liquidate(&CAROL), Err(XusdError::NothingToLiquidate)));

    assert_eq!(snapshot_bytes(&env), before);
    assert_eq!(env.manager.events().len(), events);
    assert_eq!(env.balance(&LIQUIDATOR), 0);
}

#[test]
fn test_recovery_mode_batch_skips_position_above_tcr() {
    let mut env = recovery_with_healthy_env();
    let outcome = env.batch_liquidate(&[CAROL, BOB]).unwrap();

    assert_eq!(outcome.liquidated, vec![BOB]);
    assert_eq!(outcome.total_debt_to_offset, 8_002 * ONE);
    assert_eq!(env.domain().buffer().total_deposits(), 11_998 * ONE);
    assert_eq!(env.manager.get_position_status(&DOMAIN, &CAROL).unwrap(), PositionStatus::Active);
    assert_eq!(env.manager.get_position_status(&DOMAIN, &ALICE).unwrap(), PositionStatus::Active);
}

#[test]
fn test_recovery_sequence_continues_past_skipped_candidate() {
    let mut env = TestEnv::new();
    env.open(ALICE, 100 * ONE, 60_000 * ONE);
    env.open(DAVE, 14 * ONE, 8_000 * ONE);
    env.open(CAROL, 30 * ONE, 2_000 * ONE);
    env.deposit(&ALICE, 20_000 * ONE);

    // TCR ~148.1%. ALICE ~120.0% but her debt exceeds the pool, DAVE ~126.0% fits
    env.set_price(720 * ONE);
    assert!(env.manager.check_recovery_mode(&DOMAIN).unwrap());
    assert_eq!(env.domain().sorted().last(), Some(ALICE));

    let outcome = env.liquidate_positions(10).unwrap();

    assert_eq!(outcome.liquidated, vec![DAVE]);
    assert!(outcome.total_coll_surplus > 0);
    assert_eq!(env.manager.get_position_status(&DOMAIN, &ALICE).unwrap(), PositionStatus::Active);
    assert_eq!(env.manager.get_position_status(&DOMAIN, &CAROL).unwrap(), PositionStatus::Active);
    assert_eq!(env.domain().buffer().total_deposits(), 11_998 * ONE);
}

#[test]
fn test_healthy_position_is_a_noop() {
    let mut env = TestEnv::new();
    env.open(ALICE, 10 * ONE, 1_000 * ONE);
    env.open(BOB, 10 * ONE, 1_000 * ONE);
    let before = snapshot_bytes(&env);
    let events = env.manager.events().len();

    assert!(matches!(env.liquidate(&ALICE), Err(XusdError::NothingToLiquidate)));
    assert!(matches!(env.liquidate_positions(5), Err(XusdError::NothingToLiquidate)));

    assert_eq!(snapshot_bytes(&env), before);
    assert_eq!(env.manager.events().len(), events);
}

#[test]
fn test_liquidate_unknown_or_closed_target() {
    let mut env = TestEnv::new();
    env.open(ALICE, 10 * ONE, 1_000 * ONE);
    env.open(BOB, 10 * ONE, 1_000 * ONE);
    assert!(matches!(env.liquidate(&CAROL), Err(XusdError::InvalidTarget { .. })));

    env.close(&BOB).unwrap();
    assert!(matches!(env.liquidate(&BOB), Err(XusdError::InvalidTarget { .. })));
}

#[test]
fn test_last_position_is_never_liquidated() {
    let mut env = TestEnv::new();
    env.open(ALICE, 2 * ONE, 1_000 * ONE);
    env.set_price(300 * ONE);

    assert!(matches!(env.liquidate(&ALICE), Err(XusdError::NothingToLiquidate)));
    assert_eq!(env.manager.get_position_status(&DOMAIN, &ALICE).unwrap(), PositionStatus::Active);
}

#[test]
fn test_normal_sequence_stops_at_first_healthy() {
    let mut env = TestEnv::new();
    env.open(ALICE, 100 * ONE, 10_000 * ONE);
    env.open(BOB, 12 * ONE / 10, 1_000 * ONE);
    env.open(CAROL, 13 * ONE / 10, 1_000 * ONE);
    env.open(DAVE, 2 * ONE, 1_000 * ONE);

    // BOB ~107.8%, CAROL ~116.8%
    env.set_price(900 * ONE);
    let outcome = env.liquidate_positions(10).unwrap();
    assert_eq!(outcome.liquidated, vec![BOB]);
    assert_eq!(env.manager.get_position_status(&DOMAIN, &CAROL).unwrap(), PositionStatus::Active);
}

#[test]
fn test_batch_skips_ineligible_entries() {
    let mut env = TestEnv::new();
    env.open(ALICE, 100 * ONE, 10_000 * ONE);
    env.open(BOB, 12 * ONE / 10, 1_000 * ONE);
    env.open(CAROL, 12 * ONE / 10, 1_000 * ONE);
    env.set_price(900 * ONE);

    assert!(matches!(env.batch_liquidate(&[]), Err(XusdError::EmptyBatch)));

    let outcome = env.batch_liquidate(&[ALICE, BOB, DAVE, BOB, CAROL]).unwrap();
    assert_eq!(outcome.liquidated, vec![BOB, CAROL]);
    assert_eq!(env.balance(&LIQUIDATOR), 2 * 2 * ONE);
    assert_eq!(
        env.manager.events().filter_by_type(EventType::Liquidation).len(),
        1
    );
}

#[test]
fn test_liquidation_conserves_collateral_and_debt() {
    let mut env = TestEnv::new();
    env.open(ALICE, 100 * ONE, 10_000 * ONE);
    env.open(BOB, 12 * ONE / 10, 1_000 * ONE);
    env.open(CAROL, 13 * ONE / 10, 1_050 * ONE);
    env.deposit(&ALICE, 600 * ONE);
    let coll_before = env.tracked_collateral();
    let debt_before = env.manager.get_entire_system_debt(&DOMAIN).unwrap();

    env.set_price(880 * ONE);
    let outcome = env.liquidate_positions(10).unwrap();
    assert_eq!(outcome.count(), 2);

    assert_eq!(
        env.tracked_collateral() + outcome.total_coll_gas_compensation,
        coll_before
    );
    assert_eq!(
        env.manager.get_entire_system_debt(&DOMAIN).unwrap() + outcome.total_debt_to_offset,
        debt_before
    );
    // Debt in the system stays backed one to one by stablecoin in circulation
    assert_eq!(
        env.manager.token().total_supply(),
        env.manager.get_entire_system_debt(&DOMAIN).unwrap()
    );
}

#[test]
fn test_pending_rewards_sum_to_redistributed_amount() {
    let mut env = TestEnv::new();
    env.open(ALICE, 7 * ONE, 1_000 * ONE);
    env.open(BOB, 11 * ONE, 1_000 * ONE);
    env.open(CAROL, 13 * ONE, 3_000 * ONE);
    env.open(DAVE, 3 * ONE, 2_000 * ONE);

    // DAVE ~109.9%
    env.set_price(734 * ONE);
    let outcome = env.liquidate(&DAVE).unwrap();

    let mut coll_sum = 0;
    let mut debt_sum = 0;
    for owner in [ALICE, BOB, CAROL] {
        coll_sum += env.manager.get_pending_coll_reward(&DOMAIN, &owner).unwrap();
        debt_sum += env.manager.get_pending_debt_reward(&DOMAIN, &owner).unwrap();
    }
    assert!(coll_sum <= outcome.total_coll_to_redistribute);
    assert!(coll_sum + 3 >= outcome.total_coll_to_redistribute);
    assert!(debt_sum <= outcome.total_debt_to_redistribute);
    assert!(debt_sum + 3 >= outcome.total_debt_to_redistribute);

    // Touching a position moves its share out of the default pool
    let pending = env.manager.get_pending_debt_reward(&DOMAIN, &ALICE).unwrap();
    let default_before = env.domain().default_pool().debt;
    env.adjust(&ALICE, ONE as i64, 0).unwrap();
    assert_eq!(env.domain().default_pool().debt, default_before - pending);
    assert_eq!(env.manager.get_position(&DOMAIN, &ALICE).unwrap().debt, 1_002 * ONE + pending);
    assert!(!env.manager.has_pending_rewards(&DOMAIN, &ALICE).unwrap());
}

// ============ Redemption ============

fn small_debt_params() -> RiskParams {
    RiskParams {
        gas_compensation: ONE,
        min_net_debt: ONE,
        ..RiskParams::default()
    }
}

#[test]
fn test_redemption_closes_two_weakest_and_partially_redeems_third() {
    let mut env = TestEnv::with_params(small_debt_params());
    env.open(ALICE, 2_000_000, 8 * ONE);
    env.open(BOB, 3_000_000, 10 * ONE);
    env.open(CAROL, 10_000_000, 20 * ONE);
    env.open(DAVE, 10 * ONE, 100 * ONE);

    let outcome = env
        .redeem(&DAVE, RedemptionRequest::new(20 * ONE, DECIMAL_PRECISION))
        .unwrap();

    assert_eq!(outcome.closed, vec![ALICE, BOB]);
    assert_eq!(outcome.partially_redeemed, Some(CAROL));
    assert_eq!(outcome.redeemed_amount, 20 * ONE);
    assert_eq!(outcome.coll_drawn, 2_000_000);
    assert_eq!(outcome.coll_fee + outcome.coll_to_redeemer, outcome.coll_drawn);
    assert!(outcome.coll_fee > 0);

    let carol = env.manager.get_position(&DOMAIN, &CAROL).unwrap();
    assert_eq!(carol.debt, 21 * ONE - 2 * ONE);
    assert_eq!(carol.coll, 9_800_000);
    for owner in [ALICE, BOB] {
        assert_eq!(
            env.manager.get_position_status(&DOMAIN, &owner).unwrap(),
            PositionStatus::ClosedByRedemption
        );
    }

    // Leftover collateral is claimable, reserves are burned
    assert_eq!(env.manager.get_collateral_surplus(&DOMAIN, &ALICE).unwrap(), 1_200_000);
    assert_eq!(env.manager.get_collateral_surplus(&DOMAIN, &BOB).unwrap(), 2_000_000);
    assert_eq!(env.balance(&DAVE), 80 * ONE);
    assert_eq!(env.balance(&accounts::GAS_POOL), 2 * ONE);
    assert_eq!(env.manager.token().total_supply(), 120 * ONE);
    assert_eq!(env.domain().active_pool().debt, 120 * ONE);
    assert_eq!(env.domain().active_pool().coll, 1_009_800_000);
    assert_eq!(env.domain().sorted().to_vec(), vec![DAVE, CAROL]);

    // Base rate moved by half the redeemed share of the 142 units of debt
    let fraction = 20 * DECIMAL_PRECISION / 142;
    assert_eq!(env.manager.get_base_rate(&DOMAIN).unwrap(), fraction / 2);

    assert_eq!(env.manager.claim_collateral_surplus(&DOMAIN, &ALICE).unwrap(), 1_200_000);
    assert_eq!(env.domain().surplus().total_coll, 2_000_000);
}

#[test]
fn test_redemption_at_par_with_zero_base_rate() {
    let mut env = TestEnv::new();
    env.open(ALICE, 10 * ONE, 5_000 * ONE);
    env.open(BOB, 20 * ONE, 1_000 * ONE);

    let outcome = env
        .redeem(&BOB, RedemptionRequest::new(400 * ONE, DECIMAL_PRECISION))
        .unwrap();
    // 400 at a price of 1000
    assert_eq!(outcome.coll_drawn, 4 * ONE / 10);
}

#[test]
fn test_sub_minimum_partial_is_skipped() {
    let mut env = TestEnv::new();
    env.open(ALICE, 10 * ONE, 1_000 * ONE);
    env.open(BOB, 30 * ONE, 2_000 * ONE);

    // ALICE would keep 5 units of net debt, below the minimum of 10
    let before = env.manager.get_position(&DOMAIN, &ALICE).unwrap();
    let outcome = env
        .redeem(&BOB, RedemptionRequest::new(995 * ONE, DECIMAL_PRECISION))
        .unwrap();

    assert_eq!(outcome.partially_redeemed, Some(BOB));
    assert!(outcome.closed.is_empty());
    assert_eq!(env.manager.get_position(&DOMAIN, &ALICE).unwrap(), before);
}

#[test]
fn test_nothing_redeemable_fails() {
    let mut env = TestEnv::new();
    env.open(ALICE, 10 * ONE, 1_000 * ONE);
    env.open(BOB, 30 * ONE, 2_000 * ONE);

    let request = RedemptionRequest::new(995 * ONE, DECIMAL_PRECISION).with_max_iterations(1);
    assert!(matches!(env.redeem(&BOB, request), Err(XusdError::UnableToRedeem)));
}

#[test]
fn test_last_position_is_never_closed_by_redemption() {
    let mut env = TestEnv::new();
    env.open(ALICE, 10 * ONE, 1_000 * ONE);
    env.transfer(&ALICE, &BOB, 1_000 * ONE);

    let request = RedemptionRequest::new(1_000 * ONE, DECIMAL_PRECISION);
    assert!(matches!(env.redeem(&BOB, request), Err(XusdError::UnableToRedeem)));
    assert_eq!(env.manager.get_position_status(&DOMAIN, &ALICE).unwrap(), PositionStatus::Active);
    assert_eq!(env.balance(&BOB), 1_000 * ONE);
}

#[test]
fn test_fee_above_max_reverts_everything() {
    let mut env = TestEnv::new();
    env.open(ALICE, 10 * ONE, 1_000 * ONE);
    env.open(BOB, 20 * ONE, 1_000 * ONE);
    let before = snapshot_bytes(&env);
    let supply = env.manager.token().total_supply();

    // The base rate bump pushes the fee over the floor
    let floor = RiskParams::default().redemption_fee_floor;
    let request = RedemptionRequest::new(500 * ONE, floor);
    assert!(matches!(env.redeem(&BOB, request), Err(XusdError::FeeExceedsMax { .. })));

    assert_eq!(snapshot_bytes(&env), before);
    assert_eq!(env.manager.token().total_supply(), supply);
    assert_eq!(env.balance(&BOB), 1_000 * ONE);
    assert_eq!(env.manager.get_base_rate(&DOMAIN).unwrap(), 0);
}

#[test]
fn test_stale_partial_hints_keep_index_ordered() {
    let mut env = TestEnv::new();
    env.open(ALICE, 3 * ONE, 1_000 * ONE);
    env.open(BOB, 5 * ONE, 1_000 * ONE);
    env.open(CAROL, 8 * ONE, 1_000 * ONE);
    env.open(DAVE, 40 * ONE, 3_000 * ONE);

    // Hints point at a position that is about to be closed and a made-up ratio
    let request = RedemptionRequest::new(1_300 * ONE, DECIMAL_PRECISION)
        .with_first_hint(Some(DAVE))
        .with_partial_hints(12_345, Some(ALICE), Some(DAVE));
    let outcome = env.redeem(&DAVE, request).unwrap();
    assert_eq!(outcome.closed, vec![ALICE]);
    assert_eq!(outcome.partially_redeemed, Some(BOB));

    let order = env.domain().sorted().to_vec();
    let ratios: Vec<u128> = order
        .iter()
        .map(|owner| env.manager.get_nominal_icr(&DOMAIN, owner).unwrap())
        .collect();
    assert!(ratios.windows(2).all(|pair| pair[0] >= pair[1]));
    assert_eq!(order.len(), 3);
}

#[test]
fn test_redemption_then_fee_decay() {
    let mut env = TestEnv::new();
    env.open(ALICE, 10 * ONE, 1_000 * ONE);
    env.open(BOB, 20 * ONE, 1_000 * ONE);
    env.redeem(&BOB, RedemptionRequest::new(200 * ONE, DECIMAL_PRECISION))
        .unwrap();
    let rate = env.manager.get_base_rate(&DOMAIN).unwrap();

    // A day of decay is two half-lives
    env.advance(24 * 3_600);
    let floor = RiskParams::default().redemption_fee_floor;
    let rate_now = env.manager.redemption_rate_with_decay(&DOMAIN).unwrap();
    assert!(rate_now - floor < rate / 3);
    assert_eq!(
        env.manager.redemption_fee_with_decay(&DOMAIN, ONE).unwrap(),
        fee_for(rate_now, ONE).unwrap()
    );
}

// ============ Domains ============

#[test]
fn test_domains_are_isolated() {
    let mut env = TestEnv::new();
    let eth = derive_domain_id("ETH");
    env.manager
        .register_domain(eth, RiskParams::default(), StabilityPool::new([0x51; 32]))
        .unwrap();
    let now = env.manager.timestamp();
    env.manager
        .oracle_mut()
        .update_price(&ORACLE_OPERATOR, &eth, 50 * ONE, now)
        .unwrap();

    env.manager.open_position(&eth, &ALICE, 100 * ONE, 1_000 * ONE, None, None).unwrap();
    env.manager.open_position(&eth, &BOB, 100 * ONE, 1_000 * ONE, None, None).unwrap();
    let eth_before = borsh::to_vec(env.manager.domain(&eth).unwrap()).unwrap();

    env.open(ALICE, 100 * ONE, 10_000 * ONE);
    env.open(BOB, 12 * ONE / 10, 1_000 * ONE);
    env.set_price(900 * ONE);
    env.liquidate(&BOB).unwrap();

    assert!(env.manager.get_reward_state(&DOMAIN).unwrap().l_debt > 0);
    assert_eq!(borsh::to_vec(env.manager.domain(&eth).unwrap()).unwrap(), eth_before);
    assert_eq!(env.manager.get_position_status(&eth, &BOB).unwrap(), PositionStatus::Active);
    assert_eq!(env.manager.domain_ids().len(), 2);
}
