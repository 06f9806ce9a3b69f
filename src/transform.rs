//! Read-only presentation transforms applied to decoded values.
//!
//! A [Transform] maps a decoded [Value] to a display form:
//! - **Numeric modifiers**: optional `scale` and `offset` applied as
//!   `value * scale + offset`, always producing a double.
//! - **Enum mapping**: for integers, a mapping from numeric codes to labels.
//! - **String decoding**: for byte blobs, UTF-8 or ASCII decoding with
//!   optional zero-termination and whitespace trim.
//!
//! Transforms are applied in that order and recurse elementwise into arrays.
//! They never participate in encode or decode.

use std::collections::HashMap;

use crate::errors::TransformError;
use crate::value::Value;

/// Character encoding for decoding byte blobs to strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8. Any valid UTF-8 byte sequence is accepted.
    Utf8,
    /// ASCII. Every byte must be in 0..=0x7F.
    Ascii,
}

/// Configuration for presenting decoded values.
///
/// Build with the `with_*` setters, then call [Transform::apply].
#[derive(Debug, Clone, Default)]
pub struct Transform {
    scale: Option<f64>,
    offset: Option<f64>,
    enum_map: Option<HashMap<i64, String>>,
    encoding: Option<Encoding>,
    zero_terminated: bool,
    trim: bool,
}

impl Transform {
    pub fn new() -> Self {
        Transform::default()
    }

    /// Multiplies numeric values before the offset. Must be finite.
    pub fn with_scale(mut self, scale: f64) -> Result<Self, TransformError> {
        if !scale.is_finite() {
            return Err(TransformError::InvalidScaleOffset);
        }
        self.scale = Some(scale);
        Ok(self)
    }

    /// Added to the (possibly scaled) numeric value. Must be finite.
    pub fn with_offset(mut self, offset: f64) -> Result<Self, TransformError> {
        if !offset.is_finite() {
            return Err(TransformError::InvalidScaleOffset);
        }
        self.offset = Some(offset);
        Ok(self)
    }

    /// Maps integer codes to string labels.
    pub fn with_enum_map(mut self, map: HashMap<i64, String>) -> Self {
        self.enum_map = Some(map);
        self
    }

    /// Decodes byte blobs to strings using `encoding`.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Truncates blobs at the first zero byte before decoding.
    pub fn zero_terminated(mut self) -> Self {
        self.zero_terminated = true;
        self
    }

    /// Trims leading and trailing whitespace from decoded strings.
    pub fn trimmed(mut self) -> Self {
        self.trim = true;
        self
    }

    /// Applies the transform to `value`.
    pub fn apply(&self, value: &Value) -> Result<Value, TransformError> {
        if let Value::Array(items) = value {
            let items: Result<Vec<Value>, TransformError> =
                items.iter().map(|item| self.apply(item)).collect();
            return Ok(Value::Array(items?));
        }

        let mut value = value.clone();

        if self.scale.is_some() || self.offset.is_some() {
            let number = value
                .as_f64()
                .ok_or(TransformError::InvalidType(value.kind_name()))?;
            value = Value::F64(number * self.scale.unwrap_or(1.0) + self.offset.unwrap_or(0.0));
        }

        if let Some(map) = &self.enum_map {
            let code = value
                .as_i64()
                .ok_or(TransformError::InvalidType(value.kind_name()))?;
            let label = map.get(&code).ok_or(TransformError::InvalidEnumValue(code))?;
            value = Value::String(label.clone());
        }

        if let Some(encoding) = &self.encoding {
            let Value::Bytes(data) = &value else {
                return Err(TransformError::InvalidType(value.kind_name()));
            };
            let mut data = data.as_slice();
            if self.zero_terminated {
                if let Some(end) = data.iter().position(|&b| b == 0) {
                    data = &data[..end];
                }
            }
            let text = match encoding {
                Encoding::Utf8 => std::str::from_utf8(data)
                    .map_err(|_| TransformError::InvalidEncoding("UTF-8"))?
                    .to_owned(),
                Encoding::Ascii => {
                    if data.iter().any(|&b| b > 0x7F) {
                        return Err(TransformError::InvalidEncoding("ASCII"));
                    }
                    data.iter().map(|&b| b as char).collect()
                }
            };
            let text = if self.trim {
                text.trim().to_owned()
            } else {
                text
            };
            value = Value::String(text);
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_and_offset() {
        let transform = Transform::new()
            .with_scale(2.0)
            .unwrap()
            .with_offset(1.0)
            .unwrap();
        assert_eq!(transform.apply(&Value::I64(10)).unwrap(), Value::F64(21.0));
        assert_eq!(transform.apply(&Value::U64(3)).unwrap(), Value::F64(7.0));
    }

    #[test]
    fn test_non_finite_scale_rejected() {
        assert_eq!(
            Transform::new().with_scale(f64::NAN).unwrap_err(),
            TransformError::InvalidScaleOffset
        );
        assert_eq!(
            Transform::new().with_offset(f64::INFINITY).unwrap_err(),
            TransformError::InvalidScaleOffset
        );
    }

    #[test]
    fn test_enum_mapping() {
        let transform =
            Transform::new().with_enum_map(HashMap::from([(1, "on".to_owned())]));
        assert_eq!(
            transform.apply(&Value::U64(1)).unwrap(),
            Value::String("on".to_owned())
        );
        assert_eq!(
            transform.apply(&Value::U64(2)).unwrap_err(),
            TransformError::InvalidEnumValue(2)
        );
    }

    #[test]
    fn test_string_decoding() {
        let transform = Transform::new()
            .with_encoding(Encoding::Utf8)
            .zero_terminated()
            .trimmed();
        let value = Value::Bytes(b" hi \0junk".to_vec());
        assert_eq!(
            transform.apply(&value).unwrap(),
            Value::String("hi".to_owned())
        );
    }

    #[test]
    fn test_ascii_rejects_high_bytes() {
        let transform = Transform::new().with_encoding(Encoding::Ascii);
        assert_eq!(
            transform.apply(&Value::Bytes(vec![0x80])).unwrap_err(),
            TransformError::InvalidEncoding("ASCII")
        );
    }

    #[test]
    fn test_applies_elementwise_to_arrays() {
        let transform = Transform::new().with_scale(10.0).unwrap();
        let value = Value::Array(vec![Value::U64(1), Value::U64(2)]);
        assert_eq!(
            transform.apply(&value).unwrap(),
            Value::Array(vec![Value::F64(10.0), Value::F64(20.0)])
        );
    }

    #[test]
    fn test_wrong_type() {
        let transform = Transform::new().with_scale(1.0).unwrap();
        assert_eq!(
            transform.apply(&Value::Bytes(vec![1])).unwrap_err(),
            TransformError::InvalidType("bytes")
        );
    }
}
