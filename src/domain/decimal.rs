//! Decimal amounts travel as JSON numbers, both from the aggregator and to clients.

use rust_decimal::prelude::{FromPrimitive as _, ToPrimitive as _};
use rust_decimal::Decimal;
use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
use std::str::FromStr as _;

fn from_f64(value: f64) -> Option<Decimal> {
    // Going through the shortest float representation keeps 12.34 as 12.34
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
}

pub mod float {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        match value.to_f64() {
            Some(value) => serializer.serialize_f64(value),
            None => Err(serde::ser::Error::custom(format!(
                "Amount {value} isn't representable as a number"
            ))),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let value = f64::deserialize(deserializer)?;
        from_f64(value).ok_or_else(|| D::Error::custom(format!("Invalid amount {value}")))
    }
}

pub mod float_option {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<Decimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => float::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Decimal>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|value| {
                from_f64(value).ok_or_else(|| D::Error::custom(format!("Invalid amount {value}")))
            })
            .transpose()
    }
}
