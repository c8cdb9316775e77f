//! Shared fixtures for the engine's unit, scenario and property tests

use xusd_common::{
    constants::token::ONE,
    errors::XusdResult,
    params::RiskParams,
    traits::StableToken,
    types::{Address, DomainId},
};
use xusd_price_oracle::PriceOracle;
use xusd_stability_pool::StabilityPool;
use xusd_token::TokenLedger;

use crate::domain::DomainState;
use crate::liquidation::LiquidationOutcome;
use crate::manager::PositionManager;
use crate::redemption::{RedemptionOutcome, RedemptionRequest};

pub const ALICE: Address = [1u8; 32];
pub const BOB: Address = [2u8; 32];
pub const CAROL: Address = [3u8; 32];
pub const DAVE: Address = [4u8; 32];
pub const LIQUIDATOR: Address = [0x11; 32];
pub const SP_ACCOUNT: Address = [0x50; 32];
pub const ORACLE_ADMIN: Address = [0xa0; 32];
pub const ORACLE_OPERATOR: Address = [0xa1; 32];

/// 1,000 stablecoin per collateral unit
pub const PRICE: u64 = 1_000 * ONE;
pub const START_TIME: u64 = 1_700_000_000;

pub const DOMAIN: DomainId = [0xd0; 32];

pub type TestManager = PositionManager<PriceOracle, TokenLedger, StabilityPool>;

pub fn new_pool() -> StabilityPool {
    StabilityPool::new(SP_ACCOUNT)
}

/// Address for the `i`-th generated borrower
pub fn borrower(i: u8) -> Address {
    let mut address = [0x40; 32];
    address[31] = i;
    address
}

/// Route engine diagnostics to the test writer, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct TestEnv {
    pub manager: TestManager,
    pub domain: DomainId,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_params(RiskParams::default())
    }

    pub fn with_params(params: RiskParams) -> Self {
        init_tracing();
        let oracle = PriceOracle::new(ORACLE_ADMIN, ORACLE_OPERATOR);
        let mut manager = PositionManager::new(oracle, TokenLedger::new());
        manager.set_timestamp(START_TIME);
        manager.register_domain(DOMAIN, params, new_pool()).unwrap();

        let mut env = Self { manager, domain: DOMAIN };
        env.set_price(PRICE);
        env
    }

    pub fn domain(&self) -> &DomainState<StabilityPool> {
        self.manager.domain(&self.domain).unwrap()
    }

    pub fn set_price(&mut self, price: u64) {
        let now = self.manager.timestamp();
        self.manager
            .oracle_mut()
            .update_price(&ORACLE_OPERATOR, &DOMAIN, price, now)
            .unwrap();
    }

    pub fn advance(&mut self, seconds: u64) {
        let now = self.manager.timestamp();
        self.manager.set_timestamp(now + seconds);
    }

    pub fn try_open(&mut self, owner: Address, coll: u64, net_debt: u64) -> XusdResult<()> {
        self.manager.open_position(&DOMAIN, &owner, coll, net_debt, None, None)
    }

    pub fn open(&mut self, owner: Address, coll: u64, net_debt: u64) {
        self.try_open(owner, coll, net_debt).unwrap();
    }

    pub fn adjust(&mut self, owner: &Address, coll_change: i64, debt_change: i64) -> XusdResult<()> {
        self.manager
            .adjust_position(&DOMAIN, owner, coll_change, debt_change, None, None)
    }

    pub fn close(&mut self, owner: &Address) -> XusdResult<u64> {
        self.manager.close_position(&DOMAIN, owner)
    }

    pub fn redeem(&mut self, redeemer: &Address, request: RedemptionRequest) -> XusdResult<RedemptionOutcome> {
        self.manager.redeem_collateral(&DOMAIN, redeemer, &request)
    }

    pub fn liquidate(&mut self, owner: &Address) -> XusdResult<LiquidationOutcome> {
        self.manager.liquidate(&DOMAIN, owner, &LIQUIDATOR)
    }

    pub fn liquidate_positions(&mut self, n: u64) -> XusdResult<LiquidationOutcome> {
        self.manager.liquidate_positions(&DOMAIN, n, &LIQUIDATOR)
    }

    pub fn batch_liquidate(&mut self, targets: &[Address]) -> XusdResult<LiquidationOutcome> {
        self.manager.batch_liquidate(&DOMAIN, targets, &LIQUIDATOR)
    }

    /// Move stablecoin into the pool account and record the deposit
    pub fn deposit(&mut self, depositor: &Address, amount: u64) {
        self.manager
            .token_mut()
            .transfer(depositor, &SP_ACCOUNT, amount)
            .unwrap();
        self.manager
            .buffer_mut(&DOMAIN)
            .unwrap()
            .provide_to_sp(depositor, amount)
            .unwrap();
    }

    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u64) {
        self.manager.token_mut().transfer(from, to, amount).unwrap();
    }

    pub fn balance(&self, account: &Address) -> u64 {
        self.manager.token().balance_of(account)
    }

    /// Collateral held by the active, default, surplus and buffer ledgers
    pub fn tracked_collateral(&self) -> u64 {
        let domain = self.domain();
        domain.active_pool().coll
            + domain.default_pool().coll
            + domain.surplus().total_coll
            + domain.buffer().collateral()
    }
}
