//! Wire types shared by the services and their clients
//!
//! Enumerations cross service boundaries as strings with a fixed spelling.
//! Parsing an unrecognised spelling is an error, never a default.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ServiceError;

pub mod auth;
pub mod cart;
pub mod media;
pub mod survey;

/// Empty request or response body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

pub const PING: &str = "Ping";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl From<UnknownVariant> for ServiceError {
    fn from(err: UnknownVariant) -> Self {
        ServiceError::BadRequest(err.to_string())
    }
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(
    /// How a purchase is paid
    PaymentMethod {
        Card => "card",
        Cash => "cash",
    }
);

string_enum!(
    /// How a purchase reaches the customer
    DeliveryMethod {
        Pickup => "pickup",
        Delivery => "delivery",
    }
);

string_enum!(
    PurchaseStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Canceled => "canceled",
    }
);

string_enum!(
    CartStatus {
        Active => "active",
        Inactive => "inactive",
        Deleted => "deleted",
    }
);

string_enum!(
    AdvertStatus {
        Active => "active",
        Inactive => "inactive",
        Reserved => "reserved",
    }
);

string_enum!(
    /// Lifecycle of a paid-promotion order
    OrderStatus {
        InProcess => "in_process",
        Completed => "completed",
        Canceled => "canceled",
    }
);

string_enum!(
    /// Screen a survey question belongs to
    PageType {
        Main => "mainPage",
        Advert => "advertPage",
        AdvertCreate => "advertCreatePage",
        Cart => "cartPage",
        Category => "categoryPage",
        AdvertEdit => "advertEditPage",
        User => "userPage",
        Seller => "sellerPage",
        Search => "searchPage",
    }
);

string_enum!(
    /// Subdirectory a media object is stored under
    MediaKind {
        Avatars => "avatars",
        Adverts => "adverts",
    }
);

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::InProcess)
    }
}
