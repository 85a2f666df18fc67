//! Exact conversion between human-entered decimal amounts and raw token units.
//!
//! The scaling is done on decimal digits, never through floating point, so tokens with many
//! decimals keep every digit the user typed (up to `decimals`; excess digits are truncated).

use num_bigint::BigUint;

use crate::errors::CodecError;

/// Decimal count used when proposal swap amounts are written into instructions.
pub const PROPOSAL_AMOUNT_DECIMALS: u8 = 9;

/// Scales `input` (e.g. `"1.5"`) by `10^decimals` into raw units.
pub fn parse_ui_amount(input: &str, decimals: u8) -> Result<u64, CodecError> {
    let input = input.trim();
    let (whole, fraction) = match input.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (input, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(CodecError::InvalidEncoding("amount has no digits"));
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(CodecError::InvalidEncoding("amount must be decimal digits"));
    }

    let decimals = decimals as usize;
    let mut digits = String::with_capacity(whole.len() + decimals);
    digits.push_str(whole);
    if fraction.len() >= decimals {
        digits.push_str(&fraction[..decimals]);
    } else {
        digits.push_str(fraction);
        digits.extend(std::iter::repeat('0').take(decimals - fraction.len()));
    }
    if digits.is_empty() {
        return Ok(0);
    }

    let raw = BigUint::parse_bytes(digits.as_bytes(), 10)
        .ok_or(CodecError::InvalidEncoding("amount must be decimal digits"))?;
    u64::try_from(raw).map_err(|_| CodecError::FieldOverflow("amount exceeds u64"))
}

/// Renders raw units as a decimal string without trailing fractional zeros.
pub fn format_ui_amount(raw: u64, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}
