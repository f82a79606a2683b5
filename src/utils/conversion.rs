//! Type conversion and formatting utilities.
//!
//! Functions for converting on-chain U256 quantities to the decimal-string
//! and f64 forms used in published records, with proper decimal handling
//! and precision preservation.

use alloy::primitives::{hex, U256};
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;

// ============================================
// Hex Encoding
// ============================================

/// Encode bytes as a lowercase hex string with 0x prefix.
pub fn hex_encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ============================================
// U256 Conversions
// ============================================

/// Convert U256 to f64 with decimal adjustment using BigDecimal for precision.
///
/// This function uses BigDecimal for precise conversion of large U256 values,
/// avoiding precision loss that occurs when directly converting to f64.
///
/// # Arguments
/// * `value` - The U256 value to convert
/// * `decimals` - The number of decimal places to adjust by
///
/// # Returns
/// * The adjusted f64 value, or 0.0 if conversion fails
///
/// # Example
/// ```ignore
/// let value = U256::from(1_000_000_000_000_000_000u128); // 1e18
/// let adjusted = u256_to_f64(value, 18); // Returns 1.0
/// ```
pub fn u256_to_f64(value: U256, decimals: u8) -> f64 {
    u256_to_f64_safe(value, decimals).unwrap_or(0.0)
}

/// Convert U256 to f64 with decimal adjustment, returning Option for error handling.
///
/// Uses BigDecimal for precise conversion of large U256 values.
/// Returns None if the value cannot be converted to a valid f64.
pub fn u256_to_f64_safe(value: U256, decimals: u8) -> Option<f64> {
    // Convert U256 to BigDecimal via bytes (faster than string parsing)
    let bytes: [u8; 32] = value.to_le_bytes();
    let big_int = BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes);
    let big_value = BigDecimal::from(big_int);

    // Apply decimal adjustment
    let adjusted = big_value / big_pow10(decimals);

    // Convert to f64
    let result = adjusted.to_f64()?;

    // Validate result is finite
    if result.is_finite() {
        Some(result)
    } else {
        None
    }
}

/// Format a U256 quantity as a decimal string with decimal adjustment.
///
/// Published records carry on-chain quantities as decimal strings to avoid
/// floating-point precision loss. Trailing fractional zeros are trimmed,
/// so a whole-number result has no decimal point at all.
///
/// # Example
/// ```ignore
/// let supply = U256::from(10).pow(U256::from(24)); // 1e24 raw
/// assert_eq!(format_units(supply, 18), "1000000");
/// ```
pub fn format_units(value: U256, decimals: u8) -> String {
    let bytes: [u8; 32] = value.to_le_bytes();
    let big_int = BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes);

    let adjusted = BigDecimal::from(big_int) / big_pow10(decimals);

    adjusted.normalized().to_string()
}

// ============================================
// Internal Helpers
// ============================================

static POW10_CACHE: Lazy<[BigDecimal; 25]> =
    Lazy::new(|| std::array::from_fn(|i| BigDecimal::from(BigInt::from(10u32).pow(i as u32))));

/// Compute 10^exp as BigDecimal.
pub(crate) fn big_pow10(exp: u8) -> BigDecimal {
    if (exp as usize) < POW10_CACHE.len() {
        POW10_CACHE[exp as usize].clone()
    } else {
        BigDecimal::from(BigInt::from(10u32).pow(exp as u32))
    }
}
