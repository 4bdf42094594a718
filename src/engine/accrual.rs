//! Ticket accrual policy.
//!
//! Depositors aim at whole multiples of the fixed entry price but rarely
//! hit them exactly, so two bands are tried in order: nearest-multiple
//! within tolerance (covers near-exact amounts), then floor-with-dust
//! (covers deliberate multi-ticket overpay with a small excess). Amounts
//! inside neither band are rejected, not defaulted.

use crate::domain::Decimal;

/// Number of tickets a USD amount buys at `entry_usd` per ticket under
/// the given tolerance fraction. Zero means the amount is rejected.
pub fn tickets_for(usd_amount: Decimal, entry_usd: Decimal, tolerance: Decimal) -> u32 {
    if !entry_usd.is_positive() || !usd_amount.is_positive() {
        return 0;
    }

    let band = entry_usd * tolerance;
    if usd_amount < entry_usd - band {
        return 0;
    }

    let raw = usd_amount / entry_usd;

    let nearest = raw.round_units();
    if (usd_amount - nearest * entry_usd).abs() <= band {
        return nearest.to_u32_saturating().max(1);
    }

    let floor = raw.floor_units();
    let remainder = usd_amount - floor * entry_usd;
    if floor >= Decimal::one() && remainder <= band {
        return floor.to_u32_saturating();
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn tickets(usd: &str) -> u32 {
        tickets_for(dec(usd), dec("50"), dec("0.10"))
    }

    #[test]
    fn test_single_ticket_within_band() {
        assert_eq!(tickets("47"), 1);
        assert_eq!(tickets("50"), 1);
        assert_eq!(tickets("55"), 1);
        assert_eq!(tickets("45"), 1);
    }

    #[test]
    fn test_below_minimum_rejected() {
        assert_eq!(tickets("25"), 0);
        assert_eq!(tickets("44.99"), 0);
        assert_eq!(tickets("0"), 0);
    }

    #[test]
    fn test_nearest_multiple_within_band() {
        assert_eq!(tickets("103"), 2);
        assert_eq!(tickets("97"), 2);
        assert_eq!(tickets("150"), 3);
    }

    #[test]
    fn test_amount_inside_neither_band_rejected() {
        // raw = 3.2: nearest is 3 but |160 - 150| = 10 > 5, and the floor
        // remainder is the same 10 > 5. Must reject, not default to floor.
        assert_eq!(tickets("160"), 0);
        assert_eq!(tickets("56"), 0);
        assert_eq!(tickets("75"), 0);
    }

    #[test]
    fn test_multi_ticket_overpay_with_dust() {
        // raw = 2.08: two full entries plus $4 dust, inside the band.
        assert_eq!(tickets("104"), 2);
        // Zero tolerance: only exact multiples pass.
        assert_eq!(tickets_for(dec("100"), dec("50"), dec("0")), 2);
        assert_eq!(tickets_for(dec("101"), dec("50"), dec("0")), 0);
    }

    #[test]
    fn test_never_zero_tickets_once_accepted() {
        // Half an entry at the widest allowed tolerance still yields one
        // ticket, never zero.
        assert_eq!(tickets_for(dec("25"), dec("50"), dec("0.5")), 1);
    }

    #[test]
    fn test_zero_entry_price_rejects() {
        assert_eq!(tickets_for(dec("50"), dec("0"), dec("0.1")), 0);
    }
}
