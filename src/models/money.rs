use rust_decimal::Decimal;

/// Digits after the decimal point a stored amount keeps.
pub const AMOUNT_SCALE: u32 = 8;

/// Digits before the decimal point a stored amount keeps.
pub const AMOUNT_INTEGER_DIGITS: u32 = 12;

/// Longest currency code a row can hold.
pub const CURRENCY_CODE_LEN: usize = 3;

/// Exclusive bound on the magnitude of any stored amount or balance.
pub fn amount_limit() -> Decimal {
    Decimal::from(10i64.pow(AMOUNT_INTEGER_DIGITS))
}

/// Checks that `value` is stored exactly by a `NUMERIC(20, 8)` column:
/// at most 8 significant decimal places and a magnitude below 10^12.
pub fn fits_amount_column(value: &Decimal) -> bool {
    value.normalize().scale() <= AMOUNT_SCALE && value.abs() < amount_limit()
}
