//! Custom serde helpers for the collector's wire format.

/// Deserializes epoch seconds from any JSON number into `i64`.
///
/// The firmware serializes `time` through a float-capable JSON writer, so
/// `1700000000` and `1700000000.0` both occur. Fractions are truncated;
/// negative and non-finite values are rejected.
pub mod epoch_seconds {
    use serde::de::{self, Visitor};
    use serde::Deserializer;
    use std::fmt;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(EpochSecondsVisitor)
    }

    struct EpochSecondsVisitor;

    impl<'de> Visitor<'de> for EpochSecondsVisitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative number of seconds since the epoch")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::custom(format!("timestamp out of range: {}", v)))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            if v < 0 {
                return Err(E::custom(format!("negative timestamp: {}", v)));
            }
            Ok(v)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
            if !v.is_finite() || v < 0.0 || v >= i64::MAX as f64 {
                return Err(E::custom(format!("invalid timestamp: {}", v)));
            }
            Ok(v.trunc() as i64)
        }
    }
}
