// Entity Models - the persisted vocabulary of the ledger
//
// Closed enums are stored as text and parsed back on read, so an unknown
// value in the database surfaces as a conversion error instead of leaking
// into the domain.

use thiserror::Error;

/// Raised when stored or user-supplied text names no known variant
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Text mapping for a closed enum: `as_str`, `Display`, `FromStr` and the
/// rusqlite conversions, all driven from one variant table.
macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::entities::ParseEnumError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err($crate::entities::ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $ty {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

pub(crate) use text_enum;

pub mod account;
pub mod budget;
pub mod category;
pub mod transaction;

pub use account::{Account, AccountType};
pub use budget::{Budget, BudgetPeriod};
pub use category::Category;
pub use transaction::{Split, Transaction, TransactionStatus};

/// Currency assumed when none is given
pub const BASE_CURRENCY: &str = "USD";
