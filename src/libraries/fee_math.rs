use ethnum::U256;

/// Denominator for fee calculations, in hundredths of a bip (100% = 1,000,000).
pub const PIPS_DENOMINATOR: u32 = 1_000_000;

/// Fee taken from a gross input amount at the pool's fee tier, rounded down.
pub fn fee_amount_from_input(amount_in_gross: U256, fee_pips: u32) -> U256 {
    amount_in_gross * U256::from(fee_pips) / U256::from(PIPS_DENOMINATOR)
}

/// Combines a protocol fee with the LP fee into the total swap fee, both in
/// hundredths of a bip. The protocol fee is taken from the input first, the
/// LP fee applies to the remainder:
/// `swap_fee = protocol + lp - protocol * lp / 1_000_000`.
pub fn calculate_swap_fee(protocol_fee: u16, lp_fee: u32) -> u32 {
    let protocol = U256::from(protocol_fee);
    let lp = U256::from(lp_fee);
    let overlap = protocol * lp / U256::from(PIPS_DENOMINATOR);
    (protocol + lp - overlap).as_u32()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_from_input_is_proportional() {
        assert_eq!(
            fee_amount_from_input(U256::from(1_000_000_u64), 3000),
            U256::from(3000_u32)
        );
        assert_eq!(fee_amount_from_input(U256::ZERO, 3000), U256::ZERO);
        // Rounds down on sub-pip amounts.
        assert_eq!(fee_amount_from_input(U256::from(333_u32), 3000), U256::ZERO);
    }

    #[test]
    fn protocol_fee_composition() {
        assert_eq!(calculate_swap_fee(0, 3000), 3000);
        assert_eq!(calculate_swap_fee(1000, 3000), 3997);
        assert_eq!(calculate_swap_fee(1000, 0), 1000);
        assert_eq!(calculate_swap_fee(0, 0), 0);
        assert_eq!(calculate_swap_fee(1000, 1_000_000), 1_000_000);
    }
}
