//! Macro for implementing Display and FromStr for status enums
//!
//! Status enums are persisted as lowercase text columns, so every one of
//! them needs the same Display/FromStr pair. The macro keeps the string
//! forms next to the variants and parses case-insensitively.

/// Implements Display and FromStr traits for status enums
///
/// Generates:
/// - Display: converts enum variants to their lowercase column form
/// - FromStr: case-insensitive parsing back to the variant
#[macro_export]
macro_rules! impl_status_conversions {
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

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
