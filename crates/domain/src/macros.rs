//! Display/FromStr generation for lifecycle status enums.
//!
//! Status values are persisted as lowercase strings and parsed
//! case-insensitively, so `"AWAITING_PAYMENT"`, `"awaiting_payment"` and
//! `"Awaiting_Payment"` all read back as the same variant.
//!
//! ```rust
//! use orderbridge_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum ShipmentStatus {
//!     Packed,
//!     InTransit,
//! }
//!
//! impl_domain_status_conversions!(ShipmentStatus {
//!     Packed => "packed",
//!     InTransit => "in_transit",
//! });
//!
//! assert_eq!(ShipmentStatus::InTransit.to_string(), "in_transit");
//! assert_eq!("PACKED".parse::<ShipmentStatus>(), Ok(ShipmentStatus::Packed));
//! ```

/// Implements `Display` and a case-insensitive `FromStr` for a status enum.
///
/// Each `$variant => $str` pair maps a variant to its lowercase storage
/// string. Parsing failures carry the enum name and the rejected input.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Storage representation of this status.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
