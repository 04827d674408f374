//! Closed string vocabularies with a catch-all variant.
//!
//! The inspection tool's output grows over time, so every fixed table gets an
//! `Unknown(raw)` variant instead of a parse failure.

/// Declare an enum whose variants map one-to-one onto exact tool spellings.
///
/// Generates `as_str`, `is_unknown`, `Display`, `From<&str>`, `From<String>`
/// and `From<Self> for String`, and (de)serializes through the string form.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// A value outside the known vocabulary, kept verbatim.
            Unknown(String),
        }

        impl $name {
            /// Spelling as emitted by the inspection tool.
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $text, )+
                    Self::Unknown(raw) => raw,
                }
            }

            /// Whether the value fell outside the known vocabulary.
            pub fn is_unknown(&self) -> bool {
                matches!(self, Self::Unknown(_))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                match s {
                    $( $text => Self::$variant, )+
                    other => Self::Unknown(other.to_string()),
                }
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from(s.as_str())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
