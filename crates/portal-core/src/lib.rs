//! Core domain model, role policy and derived-view helpers for the provider portal.

/// Declares a backend status/label enum whose wire form is a display label.
///
/// Parsing ignores case and separators so `"In Negotiation"`, `"IN_NEGOTIATION"`
/// and `"inNegotiation"` land on the same variant. Unknown labels are kept in
/// `Other` so one odd record does not fail a whole list.
macro_rules! label_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub const KNOWN: &'static [$name] = &[$($name::$variant),+];

            pub fn label(&self) -> &str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Other(raw) => raw.as_str(),
                }
            }

            pub fn parse(raw: &str) -> Self {
                let key = $crate::normalize_label(raw);
                $(
                    if key == $crate::normalize_label($label) {
                        return $name::$variant;
                    }
                )+
                $name::Other(raw.trim().to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
                Ok($name::parse(&raw))
            }
        }
    };
}

pub mod model;
pub mod roles;
pub mod validation;
pub mod views;

pub use model::*;
pub use roles::{Role, RoleSet};
pub use validation::{
    parse_amount, parse_days, parse_id, parse_optional_amount, require, validate_login, LoginForm,
    ValidationError,
};
pub use views::{
    format_countdown, format_eur, format_optional_eur, format_percent, matches_query,
    matches_status, OfferCost,
};

pub const CRATE_NAME: &str = "portal-core";

/// Lowercased alphanumerics only; the comparison key for backend labels.
pub fn normalize_label(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
