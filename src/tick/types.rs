use ethnum::U256;

/// State kept per initialized tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickInfo {
    /// Total liquidity of all positions referencing this tick as a bound.
    pub liquidity_gross: u128,
    /// Net liquidity added when the tick is crossed left to right.
    pub liquidity_net: i128,
    pub fee_growth_outside_0_x128: U256,
    pub fee_growth_outside_1_x128: U256,
    pub initialized: bool,
}
