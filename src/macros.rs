//! Crate-internal helper macros.

/// A string-named enum with case-insensitive lookup and a fallback variant.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $name:ident, fallback = $fallback:ident, { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(from = "String")]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            /// Case-insensitive lookup; unknown names map to the fallback.
            pub fn from_name(name: &str) -> Self {
                let lowered = name.to_ascii_lowercase();
                match lowered.as_str() {
                    $($text => Self::$variant,)+
                    _ => Self::$fallback,
                }
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self::from_name(&name)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$fallback
            }
        }
    };
}
