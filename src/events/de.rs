//! Deserializers for numeric fields that appear either as JSON integers or
//! as decimal strings, depending on the exporter that produced the stream.

use ethnum::U256;
use num_traits::FromPrimitive;
use serde::de::{self, Deserializer, Unexpected, Visitor};

pub mod i128_flexible {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i128, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FlexVisitor;

        impl Visitor<'_> for FlexVisitor {
            type Value = i128;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("an integer or a decimal string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<i128, E> {
                Ok(v as i128)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<i128, E> {
                Ok(v as i128)
            }

            fn visit_i128<E: de::Error>(self, v: i128) -> Result<i128, E> {
                Ok(v)
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<i128, E> {
                i128::try_from(v)
                    .map_err(|_| E::invalid_value(Unexpected::Other("u128"), &self))
            }

            // Very large JSON integers surface as floats; accept whole ones.
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<i128, E> {
                if v.fract() == 0.0 && v.is_finite() && v.abs() < i128::MAX as f64 {
                    Ok(v as i128)
                } else {
                    Err(E::invalid_value(Unexpected::Float(v), &self))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<i128, E> {
                v.parse()
                    .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(FlexVisitor)
    }
}

pub mod u128_flexible {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FlexVisitor;

        impl Visitor<'_> for FlexVisitor {
            type Value = u128;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("an unsigned integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
                Ok(v as u128)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
                u128::try_from(v)
                    .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
                Ok(v)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<u128, E> {
                if v.fract() == 0.0 && (0.0..u128::MAX as f64).contains(&v) {
                    Ok(v as u128)
                } else {
                    Err(E::invalid_value(Unexpected::Float(v), &self))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
                v.parse()
                    .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(FlexVisitor)
    }
}

pub mod u256_flexible {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FlexVisitor;

        impl Visitor<'_> for FlexVisitor {
            type Value = U256;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("an unsigned integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<U256, E> {
                Ok(U256::from(v))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<U256, E> {
                Ok(U256::from(v))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<U256, E> {
                if v.fract() == 0.0 && v.is_finite() && v >= 0.0 {
                    num_bigint::BigUint::from_f64(v)
                        .and_then(|big| crate::libraries::safe_cast::big_uint_to_u256(big).ok())
                        .ok_or_else(|| E::invalid_value(Unexpected::Float(v), &self))
                } else {
                    Err(E::invalid_value(Unexpected::Float(v), &self))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<U256, E> {
                U256::from_str_radix(v, 10)
                    .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(FlexVisitor)
    }
}
