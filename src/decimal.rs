//! Arbitrary-precision decimal numbers, as carried by DynamoDB's `N` type.
//!
//! DynamoDB numbers hold up to 38 significant digits. A `Decimal` keeps them
//! exactly as `coefficient * 10^exponent`, normalized so the coefficient has
//! no trailing zeros. Two decimals with the same value therefore have the same
//! representation, and `"5.50"` equals `"5.5"`. Magnitudes outside
//! 1E-130 ..< 1E+126 are rejected, as DynamoDB does.

use std::cmp::Ordering;
use std::fmt;
use std::num::{IntErrorKind, ParseIntError};
use std::str::FromStr;

use thiserror::Error;

/// Maximum number of significant digits a DynamoDB number can carry.
pub const MAX_DIGITS: usize = 38;

const MAX_COEFFICIENT: i128 = 10_i128.pow(MAX_DIGITS as u32) - 1;

/// Smallest magnitude is 1E-130, largest is just below 1E+126.
const MIN_ADJUSTED_EXPONENT: i64 = -130;
const MAX_ADJUSTED_EXPONENT: i64 = 125;

// Beyond this many padding zeros Display switches to exponent notation.
const MAX_PLAIN_ZEROS: usize = 20;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecimalError {
    #[error("Invalid number literal: {0:?}")]
    Invalid(String),

    #[error("Number has more than 38 significant digits: {0:?}")]
    Precision(String),

    #[error("Number exponent out of range: {0:?}")]
    Exponent(String),

    #[error("Number overflow: result needs more than 38 significant digits")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    coefficient: i128,
    exponent: i32,
}

impl Decimal {
    pub const ZERO: Decimal = Decimal {
        coefficient: 0,
        exponent: 0,
    };

    /// Builds `coefficient * 10^exponent`.
    pub fn new(coefficient: i128, exponent: i32) -> Result<Self, DecimalError> {
        Self::from_parts(coefficient, exponent.into())
    }

    fn from_parts(mut coefficient: i128, mut exponent: i64) -> Result<Self, DecimalError> {
        if coefficient == 0 {
            return Ok(Self::ZERO);
        }
        while coefficient % 10 == 0 {
            coefficient /= 10;
            exponent += 1;
        }
        if coefficient.unsigned_abs() > MAX_COEFFICIENT.unsigned_abs() {
            return Err(DecimalError::Overflow);
        }
        let adjusted = exponent + digit_count(coefficient) - 1;
        if !(MIN_ADJUSTED_EXPONENT..=MAX_ADJUSTED_EXPONENT).contains(&adjusted) {
            return Err(DecimalError::Exponent(format!("{coefficient}E{exponent}")));
        }
        let exponent = i32::try_from(exponent)
            .map_err(|_| DecimalError::Exponent(format!("{coefficient}E{exponent}")))?;
        Ok(Self {
            coefficient,
            exponent,
        })
    }

    // Only for values that are known to be in range.
    fn normalized(mut coefficient: i128, mut exponent: i32) -> Self {
        if coefficient == 0 {
            return Self::ZERO;
        }
        while coefficient % 10 == 0 {
            coefficient /= 10;
            exponent += 1;
        }
        Self {
            coefficient,
            exponent,
        }
    }

    pub fn coefficient(&self) -> i128 {
        self.coefficient
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn is_zero(&self) -> bool {
        self.coefficient == 0
    }

    pub fn is_negative(&self) -> bool {
        self.coefficient < 0
    }

    /// True when the value has no fractional remainder.
    pub fn is_integer(&self) -> bool {
        self.exponent >= 0
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.to_i128().and_then(|v| i64::try_from(v).ok())
    }

    pub fn to_u64(&self) -> Option<u64> {
        self.to_i128().and_then(|v| u64::try_from(v).ok())
    }

    fn to_i128(&self) -> Option<i128> {
        if !self.is_integer() {
            return None;
        }
        scale_up(self.coefficient, i64::from(self.exponent))
    }

    /// Nearest `f64`, correctly rounded from the decimal text.
    pub fn to_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(f64::NAN)
    }

    /// Exact sum. Fails when the result does not fit in 38 significant digits
    /// or leaves the number range.
    pub fn checked_add(self, other: Decimal) -> Result<Decimal, DecimalError> {
        let exponent = self.exponent.min(other.exponent);
        let lhs = scale_up(self.coefficient, shift(self.exponent, exponent))
            .ok_or(DecimalError::Overflow)?;
        let rhs = scale_up(other.coefficient, shift(other.exponent, exponent))
            .ok_or(DecimalError::Overflow)?;
        let sum = lhs.checked_add(rhs).ok_or(DecimalError::Overflow)?;
        Self::from_parts(sum, exponent.into()).map_err(|_| DecimalError::Overflow)
    }
}

fn digit_count(coefficient: i128) -> i64 {
    coefficient
        .unsigned_abs()
        .checked_ilog10()
        .map_or(1, |log| i64::from(log) + 1)
}

fn shift(exponent: i32, base: i32) -> i64 {
    i64::from(exponent) - i64::from(base)
}

fn scale_up(coefficient: i128, shift: i64) -> Option<i128> {
    let shift = u32::try_from(shift).ok()?;
    10_i128
        .checked_pow(shift)
        .and_then(|factor| coefficient.checked_mul(factor))
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let sign = self.coefficient.signum().cmp(&other.coefficient.signum());
        if sign != Ordering::Equal || self.is_zero() {
            return sign;
        }
        let exponent = self.exponent.min(other.exponent);
        match (
            scale_up(self.coefficient, shift(self.exponent, exponent)),
            scale_up(other.coefficient, shift(other.exponent, exponent)),
        ) {
            (Some(lhs), Some(rhs)) => lhs.cmp(&rhs),
            // Scaling only overflows for the operand with the larger exponent,
            // which then has the larger magnitude.
            _ => {
                let magnitude = self.exponent.cmp(&other.exponent);
                if self.is_negative() {
                    magnitude.reverse()
                } else {
                    magnitude
                }
            }
        }
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DecimalError::Invalid(s.to_string());
        let literal = s.trim();
        let (negative, body) = match literal.as_bytes().first() {
            Some(b'-') => (true, &literal[1..]),
            Some(b'+') => (false, &literal[1..]),
            _ => (false, literal),
        };
        let (mantissa, exponent_part) = match body.find(['e', 'E']) {
            Some(at) => (&body[..at], Some(&body[at + 1..])),
            None => (body, None),
        };
        let (int_digits, frac_digits) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_digits.is_empty() && frac_digits.is_empty() {
            return Err(invalid());
        }
        if !int_digits
            .bytes()
            .chain(frac_digits.bytes())
            .all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let out_of_range = || DecimalError::Exponent(s.to_string());
        let exponent: i64 = match exponent_part {
            Some(e) => e.parse::<i64>().map_err(|err: ParseIntError| match err.kind() {
                IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => out_of_range(),
                _ => invalid(),
            })?,
            None => 0,
        };

        let digits = format!("{int_digits}{frac_digits}");
        let digits = digits.trim_start_matches('0');
        let significant = digits.trim_end_matches('0');
        if significant.is_empty() {
            return Ok(Self::ZERO);
        }
        if significant.len() > MAX_DIGITS {
            return Err(DecimalError::Precision(s.to_string()));
        }
        let exponent = i64::try_from(digits.len() - significant.len())
            .ok()
            .and_then(|zeros| exponent.checked_add(zeros))
            .and_then(|e| e.checked_sub(i64::try_from(frac_digits.len()).ok()?))
            .ok_or_else(out_of_range)?;
        let magnitude: i128 = significant.parse().map_err(|_| invalid())?;

        Self::from_parts(if negative { -magnitude } else { magnitude }, exponent).map_err(
            |err| match err {
                DecimalError::Exponent(_) => out_of_range(),
                other => other,
            },
        )
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let digits = self.coefficient.unsigned_abs().to_string();

        if self.exponent >= 0 {
            let zeros = self.exponent as usize;
            if zeros <= MAX_PLAIN_ZEROS {
                write!(f, "{sign}{digits}{}", "0".repeat(zeros))
            } else {
                write!(f, "{sign}{digits}E+{}", self.exponent)
            }
        } else {
            let scale = self.exponent.unsigned_abs() as usize;
            if scale < digits.len() {
                let (int, frac) = digits.split_at(digits.len() - scale);
                write!(f, "{sign}{int}.{frac}")
            } else if scale - digits.len() <= MAX_PLAIN_ZEROS {
                write!(f, "{sign}0.{}{digits}", "0".repeat(scale - digits.len()))
            } else {
                write!(f, "{sign}{digits}E{}", self.exponent)
            }
        }
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::normalized(value.into(), 0)
    }
}

impl From<i32> for Decimal {
    fn from(value: i32) -> Self {
        Self::normalized(value.into(), 0)
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Self::normalized(value.into(), 0)
    }
}

impl TryFrom<f64> for Decimal {
    type Error = DecimalError;

    /// Uses the shortest text that round-trips to `value`, so `0.1` becomes exactly `0.1`.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(DecimalError::Invalid(value.to_string()));
        }
        value.to_string().parse()
    }
}
