//! SQLite column mappings for the money types.
//!
//! Amounts are stored as REAL and carried as exact decimals in memory.
//! Aggregates such as `SUM(...)` over an empty or integer-valued set come
//! back as INTEGER, so decoding accepts both storage classes.

use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{Sqlite, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Database, Decode, Encode, Type};

use crate::money::Money;
use crate::types::TaxRate;

fn real_compatible(ty: &SqliteTypeInfo) -> bool {
    <f64 as Type<Sqlite>>::compatible(ty) || <i64 as Type<Sqlite>>::compatible(ty)
}

// =============================================================================
// Money
// =============================================================================

impl Type<Sqlite> for Money {
    fn type_info() -> SqliteTypeInfo {
        <f64 as Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        real_compatible(ty)
    }
}

impl<'q> Encode<'q, Sqlite> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        <f64 as Encode<'q, Sqlite>>::encode_by_ref(&self.to_f64(), buf)
    }
}

impl<'r> Decode<'r, Sqlite> for Money {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <f64 as Decode<'r, Sqlite>>::decode(value)?;
        Ok(Money::from_f64(raw))
    }
}

// =============================================================================
// TaxRate
// =============================================================================

impl Type<Sqlite> for TaxRate {
    fn type_info() -> SqliteTypeInfo {
        <f64 as Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        real_compatible(ty)
    }
}

impl<'q> Encode<'q, Sqlite> for TaxRate {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        use rust_decimal::prelude::ToPrimitive;
        let pct = self.percentage().to_f64().unwrap_or(0.0);
        <f64 as Encode<'q, Sqlite>>::encode_by_ref(&pct, buf)
    }
}

impl<'r> Decode<'r, Sqlite> for TaxRate {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <f64 as Decode<'r, Sqlite>>::decode(value)?;
        Ok(TaxRate::from_f64(raw))
    }
}
