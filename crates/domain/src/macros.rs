//! Macro for implementing Display and FromStr for status enums
//!
//! ```rust
//! use versesync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum LaneState {
//!     Idle,
//!     Armed,
//! }
//!
//! impl_domain_status_conversions!(LaneState {
//!     Idle => "idle",
//!     Armed => "armed",
//! });
//!
//! assert_eq!(LaneState::Armed.to_string(), "armed");
//! assert_eq!("IDLE".parse::<LaneState>().unwrap(), LaneState::Idle);
//! ```

/// Implements Display and FromStr traits for status enums
///
/// - Display: writes the mapped lowercase string
/// - FromStr: case-insensitive parse, descriptive error naming the enum
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
