//! Total computation for carts and orders.
//!
//! Cart totals are computed from live catalog prices; order totals from the
//! unit prices frozen onto each line at order creation. Both reduce to the
//! same sum, the difference is which price the caller resolves.

/// A line ready for pricing: a unit price and a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: i64,
    pub quantity: i32,
}

impl PricedLine {
    pub fn new(unit_price: i64, quantity: i32) -> Self {
        Self {
            unit_price,
            quantity,
        }
    }
}

/// Sum of `unit_price * quantity` across all lines. Returns `None` on i64
/// overflow; quantities and prices are validated non-negative upstream.
pub fn total(lines: &[PricedLine]) -> Option<i64> {
    lines.iter().try_fold(0i64, |acc, line| {
        let line_total = line.unit_price.checked_mul(i64::from(line.quantity))?;
        acc.checked_add(line_total)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cart_totals_zero() {
        assert_eq!(total(&[]), Some(0));
    }

    #[test]
    fn sums_across_mixed_lines() {
        // Product at 10.00 x2 plus service at 5.00 x1.
        let lines = [PricedLine::new(1000, 2), PricedLine::new(500, 1)];
        assert_eq!(total(&lines), Some(2500));

        // Removing the service line drops the total back to 20.00.
        assert_eq!(total(&lines[..1]), Some(2000));
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        let lines = [PricedLine::new(i64::MAX, 2)];
        assert_eq!(total(&lines), None);

        let lines = [PricedLine::new(i64::MAX, 1), PricedLine::new(1, 1)];
        assert_eq!(total(&lines), None);
    }
}
