use rust_decimal::Decimal;

/// Largest quantity accepted on a single order line.
pub const MAX_LINE_QUANTITY: i32 = 1000;

/// Rounds to cents and pins the scale to two places.
///
/// SQLite hands decimals back without their declared scale, so `15.00`
/// would otherwise serialize as `"15"`.
pub fn two_places(value: Decimal) -> Decimal {
    let mut value = value.round_dp(2);
    value.rescale(2);
    value
}

pub fn two_places_opt(value: Option<Decimal>) -> Option<Decimal> {
    value.map(two_places)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_restored_to_cents() {
        assert_eq!(two_places(Decimal::from(15)).to_string(), "15.00");
        assert_eq!(two_places(Decimal::new(1, 1)).to_string(), "0.10");
        assert_eq!(two_places(Decimal::new(4666, 3)).to_string(), "4.67");
        assert_eq!(two_places_opt(None), None);
    }
}
