//! Exact-decimal money.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The flat VAT rate applied to every order subtotal: exactly 0.15.
///
/// Not configurable per product or region.
pub fn vat_rate() -> Decimal {
    Decimal::new(15, 2)
}

/// A monetary amount backed by [`rust_decimal::Decimal`].
///
/// Decimal arithmetic keeps VAT computation exact: a subtotal of 1000.00
/// yields a VAT total of precisely 150.00, with no binary-float drift.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Wraps a decimal amount.
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Creates an amount from whole currency units (e.g. `500` -> 500.00).
    pub fn from_major(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// Creates an amount from minor units (e.g. `150099` -> 1500.99).
    pub fn from_minor(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Returns the underlying decimal.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Multiplies by an item quantity.
    pub fn times(&self, quantity: u32) -> Money {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Returns this amount's VAT portion at the flat rate.
    pub fn vat(&self) -> Money {
        Self(self.0 * vat_rate())
    }

    /// Returns true if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.round_dp(2))
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vat_is_exact() {
        let subtotal = Money::from_major(1000);
        let vat = subtotal.vat();
        assert_eq!(vat, Money::from_major(150));
        assert_eq!(subtotal + vat, Money::from_major(1150));
    }

    #[test]
    fn vat_keeps_sub_cent_precision() {
        // 9.99 * 0.15 = 1.4985, representable exactly in decimal
        let vat = Money::from_minor(999).vat();
        assert_eq!(vat.amount(), Decimal::new(14985, 4));
    }

    #[test]
    fn times_multiplies_by_quantity() {
        assert_eq!(Money::from_major(500).times(2), Money::from_major(1000));
    }

    #[test]
    fn scale_does_not_affect_equality() {
        assert_eq!(Money::from_minor(15000), Money::from_major(150));
    }

    #[test]
    fn arithmetic() {
        let mut m = Money::from_minor(100);
        m += Money::from_minor(50);
        assert_eq!(m, Money::from_minor(150));
        m -= Money::from_minor(149);
        assert_eq!(m, Money::from_minor(1));
        assert!(m.is_positive());
        assert!(Money::zero().is_zero());
    }

    #[test]
    fn comparison_drives_payment_decisions() {
        let total = Money::from_minor(115000);
        assert!(Money::from_minor(115000) >= total);
        assert!(Money::from_minor(114999) < total);
    }

    #[test]
    fn display_rounds_to_two_places() {
        assert_eq!(Money::from_major(1150).to_string(), "1150");
        assert_eq!(Money::from_minor(999).vat().to_string(), "1.50");
    }

    #[test]
    fn serialization_roundtrip() {
        let m = Money::from_minor(115000);
        let json = serde_json::to_string(&m).unwrap();
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
