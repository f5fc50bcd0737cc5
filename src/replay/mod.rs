use ethnum::U256;
use tracing::warn;

use crate::events::EventRecord;
use crate::libraries::amount_delta::abs_diff;
use crate::pool::{PoolError, PoolState};
use crate::position::{types::PositionKey, ModifyPositionError, PositionBook};

/// One entry in the discrepancy ledger: the replayed state disagreed with
/// the event stream, the event was still applied (or skipped when it could
/// not be), and the run continued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    pub timestamp: i64,
    pub block_number: u64,
    pub detail: String,
    /// True when the record could not be applied at all.
    pub skipped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayCounts {
    pub mints: u64,
    pub burns: u64,
    pub swaps: u64,
    pub skipped: u64,
}

/// Applies the event stream to pool and position book, trusting on-chain
/// post-state and recording disagreements instead of halting.
#[derive(Debug, Default)]
pub struct Replayer {
    pub pool: Option<PoolState>,
    pub book: PositionBook,
    pub ledger: Vec<Discrepancy>,
    pub counts: ReplayCounts,
    fee: u32,
    tick_spacing: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayError {
    Pool(PoolError),
    /// Arithmetic exceeded 256 bits; fatal, with event context.
    Overflow {
        timestamp: i64,
        block_number: u64,
        detail: String,
    },
}

impl Replayer {
    pub fn new(fee: u32, tick_spacing: i32) -> Self {
        Self {
            fee,
            tick_spacing,
            ..Default::default()
        }
    }

    /// The pool, once the first swap has bootstrapped it.
    pub fn pool(&self) -> Option<&PoolState> {
        self.pool.as_ref()
    }

    pub fn apply(&mut self, record: &EventRecord) -> Result<(), ReplayError> {
        match record {
            EventRecord::Mint {
                block_timestamp,
                block_number,
                owner,
                tick_lower,
                tick_upper,
                liquidity,
                amount0,
                amount1,
                ..
            } => self.apply_mint(
                *block_timestamp,
                *block_number,
                owner,
                *tick_lower,
                *tick_upper,
                *liquidity,
                *amount0,
                *amount1,
            ),
            EventRecord::Burn {
                block_timestamp,
                block_number,
                owner,
                tick_lower,
                tick_upper,
                liquidity,
                ..
            } => self.apply_burn(
                *block_timestamp,
                *block_number,
                owner,
                *tick_lower,
                *tick_upper,
                *liquidity,
            ),
            EventRecord::Swap {
                block_timestamp,
                block_number,
                amount0,
                amount1,
                sqrt_price_x96,
                liquidity,
                tick,
                ..
            } => self.apply_swap_record(
                *block_timestamp,
                *block_number,
                *amount0,
                *amount1,
                *sqrt_price_x96,
                *liquidity,
                *tick,
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_mint(
        &mut self,
        timestamp: i64,
        block_number: u64,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        amount0: i128,
        amount1: i128,
    ) -> Result<(), ReplayError> {
        let Some(pool) = self.pool.as_mut() else {
            // Liquidity events before the first swap carry no price; the
            // pool is bootstrapped lazily, so they cannot be applied yet.
            self.record(
                timestamp,
                block_number,
                "mint before pool bootstrap".to_string(),
                true,
            );
            return Ok(());
        };

        let key = PositionKey::new(owner, tick_lower, tick_upper);
        match self.book.mint(pool, &key, liquidity) {
            Ok(outcome) => {
                self.counts.mints += 1;
                // Cross-check against the reported amounts; one raw unit of
                // rounding slack is expected.
                let reported0 = U256::from(amount0.unsigned_abs());
                let reported1 = U256::from(amount1.unsigned_abs());
                if abs_diff(outcome.amount0, reported0) > U256::ONE
                    || abs_diff(outcome.amount1, reported1) > U256::ONE
                {
                    self.record(
                        timestamp,
                        block_number,
                        format!(
                            "mint amounts disagree: computed ({}, {}), reported ({}, {})",
                            outcome.amount0, outcome.amount1, reported0, reported1
                        ),
                        false,
                    );
                }
                Ok(())
            }
            Err(e) => self.handle_modify_error(timestamp, block_number, "mint", e),
        }
    }

    fn apply_burn(
        &mut self,
        timestamp: i64,
        block_number: u64,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
    ) -> Result<(), ReplayError> {
        let Some(pool) = self.pool.as_mut() else {
            self.record(
                timestamp,
                block_number,
                "burn before pool bootstrap".to_string(),
                true,
            );
            return Ok(());
        };

        // Zero-liquidity burns occur on-chain as fee pokes; nothing to do.
        if liquidity == 0 {
            return Ok(());
        }

        let key = PositionKey::new(owner, tick_lower, tick_upper);
        match self.book.burn(pool, &key, liquidity) {
            Ok(_) => {
                self.counts.burns += 1;
                Ok(())
            }
            Err(e) => self.handle_modify_error(timestamp, block_number, "burn", e),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_swap_record(
        &mut self,
        timestamp: i64,
        block_number: u64,
        amount0: i128,
        amount1: i128,
        sqrt_price_x96: U256,
        liquidity: u128,
        tick: i32,
    ) -> Result<(), ReplayError> {
        let Some(pool) = self.pool.as_mut() else {
            // First sight of a price bootstraps the pool from the swap's
            // post-state.
            let mut pool = PoolState::initialize(sqrt_price_x96, self.fee, self.tick_spacing)
                .map_err(ReplayError::Pool)?;
            pool.tick = tick;
            pool.liquidity = liquidity;
            self.pool = Some(pool);
            self.counts.swaps += 1;
            return Ok(());
        };

        // Both legs positive or both negative cannot be a swap.
        if amount0 != 0 && amount1 != 0 && (amount0 > 0) == (amount1 > 0) {
            let detail = format!("swap legs have equal signs: ({amount0}, {amount1})");
            warn!(timestamp, block_number, skipped = true, "{detail}");
            self.counts.skipped += 1;
            self.ledger.push(Discrepancy {
                timestamp,
                block_number,
                detail,
                skipped: true,
            });
            return Ok(());
        }
        match pool.apply_swap(amount0, amount1, sqrt_price_x96, tick, liquidity) {
            Ok(applied) => {
                self.counts.swaps += 1;
                if let Some((tracked, reported)) = applied.liquidity_mismatch {
                    self.record(
                        timestamp,
                        block_number,
                        format!(
                            "active liquidity disagrees after swap: tracked {tracked}, event {reported}"
                        ),
                        false,
                    );
                }
                Ok(())
            }
            Err(PoolError::FeeGrowthOverflow { tick })
            | Err(PoolError::LiquidityOverflow { tick }) => Err(ReplayError::Overflow {
                timestamp,
                block_number,
                detail: format!("swap arithmetic overflowed at tick {tick}"),
            }),
            Err(e) => Err(ReplayError::Pool(e)),
        }
    }

    fn handle_modify_error(
        &mut self,
        timestamp: i64,
        block_number: u64,
        kind: &str,
        error: ModifyPositionError,
    ) -> Result<(), ReplayError> {
        match error {
            ModifyPositionError::FeeOverflow => Err(ReplayError::Overflow {
                timestamp,
                block_number,
                detail: format!("{kind} fee settlement overflowed"),
            }),
            other => {
                self.record(
                    timestamp,
                    block_number,
                    format!("{kind} could not be applied: {other:?}"),
                    true,
                );
                Ok(())
            }
        }
    }

    fn record(&mut self, timestamp: i64, block_number: u64, detail: String, skipped: bool) {
        warn!(timestamp, block_number, skipped, "{detail}");
        if skipped {
            self.counts.skipped += 1;
        }
        self.ledger.push(Discrepancy {
            timestamp,
            block_number,
            detail,
            skipped,
        });
    }
}
