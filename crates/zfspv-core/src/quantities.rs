use crate::error::{CoreError, Result};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Resource name of the storage request on a claim
pub const STORAGE_RESOURCE: &str = "storage";

const MAX_EXPONENT: i32 = 30;

/// Parse a Kubernetes storage quantity into a byte count.
///
/// Accepts plain integers, decimal fractions, binary suffixes (Ki, Mi, Gi, Ti, Pi, Ei),
/// decimal suffixes (k, M, G, T, P, E), milli (`m`) and decimal exponents (`1e9`).
/// Fractional byte counts are rounded up, the same way the API server does.
pub fn parse_storage(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(CoreError::invalid_quantity(s, "empty quantity"));
    }

    let unsigned = match s.as_bytes()[0] {
        b'-' => return Err(CoreError::invalid_quantity(s, "negative quantities are not allowed")),
        b'+' => &s[1..],
        _ => s,
    };

    let split = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(split);

    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, f),
        None => (number, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(CoreError::invalid_quantity(s, "missing numeric value"));
    }
    if frac_part.contains('.') {
        return Err(CoreError::invalid_quantity(s, "more than one decimal point"));
    }

    let digits = format!("{}{}", int_part, frac_part);
    let mut numerator: u128 = digits
        .parse()
        .map_err(|_| CoreError::invalid_quantity(s, "numeric value is too large"))?;
    let mut denominator: u128 = pow10(frac_part.len() as u32)
        .ok_or_else(|| CoreError::invalid_quantity(s, "too many fractional digits"))?;

    let scale = |value: u128, factor: u128| {
        value
            .checked_mul(factor)
            .ok_or_else(|| CoreError::invalid_quantity(s, "quantity overflows a byte count"))
    };

    match suffix {
        "" => {}
        "Ki" => numerator = scale(numerator, 1 << 10)?,
        "Mi" => numerator = scale(numerator, 1 << 20)?,
        "Gi" => numerator = scale(numerator, 1 << 30)?,
        "Ti" => numerator = scale(numerator, 1 << 40)?,
        "Pi" => numerator = scale(numerator, 1 << 50)?,
        "Ei" => numerator = scale(numerator, 1 << 60)?,
        "m" => denominator = scale(denominator, 1_000)?,
        "k" => numerator = scale(numerator, 1_000)?,
        "M" => numerator = scale(numerator, 1_000_000)?,
        "G" => numerator = scale(numerator, 1_000_000_000)?,
        "T" => numerator = scale(numerator, 1_000_000_000_000)?,
        "P" => numerator = scale(numerator, 1_000_000_000_000_000)?,
        "E" => numerator = scale(numerator, 1_000_000_000_000_000_000)?,
        exp if exp.starts_with(['e', 'E']) => {
            let exponent: i32 = exp[1..]
                .parse()
                .map_err(|_| CoreError::invalid_quantity(s, format!("invalid exponent '{}'", exp)))?;
            if exponent.abs() > MAX_EXPONENT {
                return Err(CoreError::invalid_quantity(s, "exponent out of range"));
            }
            let factor = pow10(exponent.unsigned_abs())
                .ok_or_else(|| CoreError::invalid_quantity(s, "exponent out of range"))?;
            if exponent >= 0 {
                numerator = scale(numerator, factor)?;
            } else {
                denominator = scale(denominator, factor)?;
            }
        }
        other => {
            return Err(CoreError::invalid_quantity(
                s,
                format!("unknown suffix '{}'", other),
            ))
        }
    }

    let bytes = numerator.div_ceil(denominator);
    u64::try_from(bytes).map_err(|_| CoreError::invalid_quantity(s, "quantity overflows a byte count"))
}

/// Parse a k8s-openapi `Quantity` into a byte count
pub fn quantity_bytes(quantity: &Quantity) -> Result<u64> {
    parse_storage(&quantity.0)
}

fn pow10(exp: u32) -> Option<u128> {
    10u128.checked_pow(exp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_bytes() {
        assert_eq!(parse_storage("1024").unwrap(), 1024);
        assert_eq!(parse_storage("+42").unwrap(), 42);
        assert_eq!(parse_storage(" 7 ").unwrap(), 7);
    }

    #[test]
    fn test_parse_binary_suffixes() {
        assert_eq!(parse_storage("1Ki").unwrap(), 1024);
        assert_eq!(parse_storage("10Mi").unwrap(), 10_485_760);
        assert_eq!(parse_storage("1Gi").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_storage("2Ti").unwrap(), 2 * (1u64 << 40));
    }

    #[test]
    fn test_parse_decimal_suffixes() {
        assert_eq!(parse_storage("10M").unwrap(), 10_000_000);
        assert_eq!(parse_storage("1k").unwrap(), 1_000);
        assert_eq!(parse_storage("3G").unwrap(), 3_000_000_000);
        assert_eq!(parse_storage("1E").unwrap(), 1_000_000_000_000_000_000);
    }

    #[test]
    fn test_parse_fractions_round_up() {
        assert_eq!(parse_storage("1.5Gi").unwrap(), 1_610_612_736);
        assert_eq!(parse_storage("0.5").unwrap(), 1);
        assert_eq!(parse_storage("1500m").unwrap(), 2);
        assert_eq!(parse_storage(".5k").unwrap(), 500);
    }

    #[test]
    fn test_parse_exponents() {
        assert_eq!(parse_storage("1e3").unwrap(), 1_000);
        assert_eq!(parse_storage("12E6").unwrap(), 12_000_000);
        assert_eq!(parse_storage("5e-1").unwrap(), 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_storage("").is_err());
        assert!(parse_storage("-1Gi").is_err());
        assert!(parse_storage("10Zi").is_err());
        assert!(parse_storage("Gi").is_err());
        assert!(parse_storage("1.2.3").is_err());
        assert!(parse_storage("1e99").is_err());
        assert!(parse_storage("100Ei").is_err());
    }

    #[test]
    fn test_quantity_bytes() {
        let q = Quantity("10Mi".to_string());
        assert_eq!(quantity_bytes(&q).unwrap(), 10_485_760);
    }
}
