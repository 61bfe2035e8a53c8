//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. Commerce backend IDs
//! are positive 64-bit integers; zero and negative values never name a real
//! entity and are rejected by [`is_valid`](ProductId::is_valid).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_i64()`, `is_valid()`
/// - `From<i64>` and `Into<i64>` implementations
/// - `FromStr` for IDs carried as strings (e.g. payment provider metadata)
///
/// # Example
///
/// ```rust
/// # use checkout_core::define_id;
/// define_id!(ProductId);
/// define_id!(OrderId);
///
/// let product_id = ProductId::new(1);
/// let order_id = OrderId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: ProductId = order_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }

            /// Whether this ID can name a real entity (strictly positive).
            #[must_use]
            pub const fn is_valid(&self) -> bool {
                self.0 > 0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Commerce backend entity IDs
define_id!(ProductId);
define_id!(VariationId);
define_id!(OrderId);
define_id!(CustomerId);

/// Errors that can occur when parsing a [`UserId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UserIdError {
    /// The identifier is empty or whitespace.
    #[error("user id cannot be empty")]
    Empty,
    /// The identifier is too long to use as a document key.
    #[error("user id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The identifier contains a character reserved for document keys.
    #[error("user id cannot contain ':' or control characters")]
    InvalidCharacter,
}

/// Opaque user identifier issued by the authentication layer.
///
/// The checkout service never issues these; it receives them from the
/// upstream session layer and uses them to key sync documents and to tag
/// checkout sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Maximum length of a user identifier.
    pub const MAX_LENGTH: usize = 128;

    /// Parse a `UserId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or contains `:`
    /// (the document key separator) or control characters.
    pub fn parse(s: &str) -> Result<Self, UserIdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(UserIdError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(UserIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if s.chars().any(|c| c == ':' || c.is_control()) {
            return Err(UserIdError::InvalidCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The commerce customer ID, when the auth layer uses numeric user IDs
    /// shared with the commerce backend.
    #[must_use]
    pub fn as_customer_id(&self) -> Option<CustomerId> {
        self.0
            .parse::<i64>()
            .ok()
            .map(CustomerId::new)
            .filter(CustomerId::is_valid)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = UserIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}
