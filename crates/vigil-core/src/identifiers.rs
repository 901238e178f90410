//! Identifier newtypes.
//!
//! All ids are plain integers handed out by monotonic counters owned by
//! the issuing manager; uniqueness and ordering are per manager instance,
//! never global.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $inner:ty) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Wraps a raw id value.
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Returns the raw id value.
            pub const fn value(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a user record.
    UserId,
    u64
);

id_type!(
    /// Identifier of a device record.
    DeviceId,
    u64
);

id_type!(
    /// Identifier of an authentication or authorization token.
    TokenId,
    u64
);

id_type!(
    /// Internal identifier of a session.
    SessionId,
    u64
);

id_type!(
    /// Identifier assigned to a registered instruction source.
    SourceId,
    u64
);

id_type!(
    /// Identifier of a name or password rule.
    RuleId,
    u32
);
