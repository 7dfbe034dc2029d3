//! Lifecycle enums and the order-status transition table.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing an unknown enum value from the wire or the
/// database.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! str_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Returns the canonical wire/storage representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Lifecycle of a shopping cart.
///
/// A cart is created `New`, becomes `CheckedOut` exactly once (by checkout)
/// or `Expired` (by the periodic sweep once `expires_at` has passed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartStatus {
    #[default]
    New,
    CheckedOut,
    Expired,
}

str_enum!(CartStatus, "cart status", {
    New => "NEW",
    CheckedOut => "CHECKED_OUT",
    Expired => "EXPIRED",
});

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// NEW ──► PAID ──► SHIPPED ──► DELIVERED
///  │        │
///  └────────┴──► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order created from a cart, awaiting payment.
    #[default]
    New,

    /// A successful payment covered the order total.
    Paid,

    /// A shipment exists and is on its way.
    Shipped,

    /// The shipment arrived (terminal state).
    Delivered,

    /// Order was cancelled (terminal state).
    Cancelled,
}

str_enum!(OrderStatus, "order status", {
    New => "NEW",
    Paid => "PAID",
    Shipped => "SHIPPED",
    Delivered => "DELIVERED",
    Cancelled => "CANCELLED",
});

impl OrderStatus {
    /// Returns true if the transition `self -> to` is in the table.
    ///
    /// This is the single source of truth for transition legality; every
    /// caller (explicit status updates, payment, shipping) goes through it.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            New => matches!(to, Paid | Cancelled),
            Paid => matches!(to, Shipped | Cancelled),
            Shipped => matches!(to, Delivered),
            Delivered | Cancelled => false,
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

/// How a payment attempt was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Wallet,
}

str_enum!(PaymentMethod, "payment method", {
    Card => "CARD",
    BankTransfer => "BANK_TRANSFER",
    Wallet => "WALLET",
});

/// Outcome of a payment attempt. Append-only; a failed attempt is kept as
/// part of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Succeeded,
    Failed,
}

str_enum!(PaymentStatus, "payment status", {
    Succeeded => "SUCCEEDED",
    Failed => "FAILED",
});

/// Kind of an address-book entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressType {
    Shipping,
    Billing,
}

str_enum!(AddressType, "address type", {
    Shipping => "SHIPPING",
    Billing => "BILLING",
});
