use ethnum::U256;

/// Identity a position is booked under. On-chain owners are the address
/// strings from the event stream; the simulated strategy books under a
/// reserved identifier that cannot collide with a hex address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionKey {
    pub owner: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
}

impl PositionKey {
    pub fn new(owner: impl Into<String>, tick_lower: i32, tick_upper: i32) -> Self {
        Self {
            owner: owner.into(),
            tick_lower,
            tick_upper,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionInfo {
    pub liquidity: u128,
    pub fee_growth_inside_0_last_x128: U256,
    pub fee_growth_inside_1_last_x128: U256,
    /// Uncollected fees, accrued incrementally at every touch.
    pub tokens_owed_0: u128,
    pub tokens_owed_1: u128,
}
