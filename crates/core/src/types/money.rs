//! Decimal money amounts.
//!
//! Prices, price snapshots and order totals are all [`Money`]. Arithmetic is
//! done in `rust_decimal::Decimal` so that `unit_price * quantity` summed over
//! an order's lines reproduces the stored total exactly.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Number of fractional digits a money amount may carry.
pub const MONEY_SCALE: u32 = 2;

/// Errors produced when constructing or combining [`Money`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoneyError {
    /// Amount is below zero.
    #[error("amount cannot be negative")]
    Negative,
    /// Amount has more fractional digits than [`MONEY_SCALE`].
    #[error("amount cannot have more than {MONEY_SCALE} decimal places")]
    TooPrecise,
    /// Arithmetic overflowed the decimal range.
    #[error("amount overflow")]
    Overflow,
}

/// A non-negative amount in the store currency with at most two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest unit price that can be stored (`NUMERIC(12, 2)`).
    pub const MAX_PRICE: Self = Self(Decimal::from_parts(
        3_567_587_327,
        232,
        0,
        false,
        MONEY_SCALE,
    ));

    /// Largest order total that can be stored (`NUMERIC(14, 2)`).
    pub const MAX_TOTAL: Self = Self(Decimal::from_parts(
        276_447_231,
        23_283,
        0,
        false,
        MONEY_SCALE,
    ));

    /// Validate a decimal as a money amount.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] or [`MoneyError::TooPrecise`].
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        let normalized = amount.normalize();
        if normalized.scale() > MONEY_SCALE {
            return Err(MoneyError::TooPrecise);
        }
        Ok(Self(amount))
    }

    /// Build an amount from minor units (cents).
    ///
    /// ```
    /// use storekeep_core::Money;
    ///
    /// assert_eq!(Money::from_cents(1999).to_string(), "19.99");
    /// ```
    #[must_use]
    pub fn from_cents(cents: u32) -> Self {
        Self(Decimal::new(i64::from(cents), MONEY_SCALE))
    }

    /// The underlying decimal.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiply a unit price by a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product does not fit.
    pub fn checked_mul_quantity(self, quantity: u32) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Add two amounts.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the sum does not fit.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_new_rejects_negative() {
        assert_eq!(Money::new(dec("-0.01")), Err(MoneyError::Negative));
    }

    #[test]
    fn test_new_rejects_sub_cent_precision() {
        assert_eq!(Money::new(dec("1.005")), Err(MoneyError::TooPrecise));
        // Trailing zeros are not extra precision.
        assert!(Money::new(dec("1.500")).is_ok());
    }

    #[test]
    fn test_decimal_sum_has_no_float_drift() {
        // 0.1 + 0.2 style drift is the classic binary-float failure.
        let a = Money::new(dec("0.10")).unwrap();
        let b = Money::new(dec("0.20")).unwrap();
        assert_eq!(a.checked_add(b).unwrap(), Money::new(dec("0.30")).unwrap());
    }

    #[test]
    fn test_mul_quantity() {
        let price = Money::from_cents(1999);
        assert_eq!(
            price.checked_mul_quantity(3).unwrap(),
            Money::new(dec("59.97")).unwrap()
        );
    }

    #[test]
    fn test_mul_overflow_is_reported() {
        let huge = Money::new(Decimal::MAX).unwrap();
        assert_eq!(huge.checked_mul_quantity(2), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_column_limits() {
        assert_eq!(Money::MAX_PRICE.to_string(), "9999999999.99");
        assert_eq!(Money::MAX_TOTAL.to_string(), "999999999999.99");
    }

    #[test]
    fn test_display_two_decimals() {
        assert_eq!(Money::new(dec("30")).unwrap().to_string(), "30.00");
    }

    #[test]
    fn test_serde_uses_strings() {
        let price = Money::from_cents(1000);
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"10.00\"");
        let back: Money = serde_json::from_str("\"10.00\"").unwrap();
        assert_eq!(back, price);
        assert!(serde_json::from_str::<Money>("\"-1\"").is_err());
    }
}
