//! JSON-deserializable schema definitions.
//!
//! These types describe the shape of a record declaratively. They are
//! intended to be constructed from JSON (for example a schema file shipped
//! with your application) and then compiled into core types via `TryFrom`,
//! funneling through the same validation as hand-assembled schemas.
//!
//! Dependent shapes are expressed by context path (`len_from`, `count_from`);
//! arbitrary closure resolvers are API-only and have no definition form.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::bits::ByteOrder;
use crate::container::{Container, Layout};
use crate::errors::SchemaError;
use crate::field::{Count, Field, FieldKind, Len, Precision, Resolver, Width};
use crate::schema::Schema;
use crate::transform::{Encoding, Transform};

/// Top-level schema definition: the root container's layout and fields.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchemaDef {
    #[serde(default)]
    pub layout: LayoutDef,
    pub fields: Vec<FieldDef>,
}

/// Container layout.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default)]
pub enum LayoutDef {
    /// Bit-granular children.
    Packed,
    /// Byte-structured children.
    #[default]
    Aligned,
}

/// Byte order for multi-byte fields; defaults to big-endian (network order).
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default)]
pub enum ByteOrderDef {
    #[default]
    Big,
    Little,
}

/// Description of a single field.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FieldDef {
    /// Name used in the decoded result and in context paths.
    pub name: String,
    /// Shape of the field.
    pub kind: FieldKindDef,
    /// Optional presentation transform applied after decoding.
    #[serde(default)]
    pub transform: Option<TransformDef>,
}

/// Shape of a field in the schema.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum FieldKindDef {
    /// Single-bit flag.
    Bit,
    /// Unsigned bit field of `width_bits` bits.
    Bits { width_bits: usize },
    /// Unsigned bitmask; `width_bits` must be 8, 16, 32, or 64.
    Mask {
        width_bits: usize,
        #[serde(default)]
        order: ByteOrderDef,
    },
    /// Fixed-width integer; `width_bits` must be 8, 16, 32, or 64.
    Int {
        width_bits: usize,
        #[serde(default)]
        signed: bool,
        #[serde(default)]
        order: ByteOrderDef,
    },
    /// IEEE-754 float; `width_bits` must be 32 or 64.
    Real {
        width_bits: usize,
        #[serde(default)]
        order: ByteOrderDef,
    },
    /// Raw byte blob with a fixed length or one read from `len_from`.
    Bytes {
        #[serde(default)]
        len: Option<usize>,
        #[serde(default)]
        len_from: Option<String>,
    },
    /// UTF-8 character blob, sized like `Bytes`.
    Str {
        #[serde(default)]
        len: Option<usize>,
        #[serde(default)]
        len_from: Option<String>,
    },
    /// Nested record.
    Struct {
        #[serde(default)]
        layout: LayoutDef,
        fields: Vec<FieldDef>,
    },
    /// Repeated element with a fixed count or one read from `count_from`.
    Repeat {
        #[serde(default)]
        count: Option<usize>,
        #[serde(default)]
        count_from: Option<String>,
        element: Box<FieldDef>,
    },
}

/// Text encoding for string-decoding transforms.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub enum EncodingDef {
    Utf8,
    Ascii,
}

/// Complete description of a presentation transform.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransformDef {
    /// Optional multiplicative scale applied to numeric values.
    #[serde(default)]
    pub scale: Option<f64>,
    /// Optional additive offset applied after scaling.
    #[serde(default)]
    pub offset: Option<f64>,
    /// Optional mapping from integer codes to labels.
    #[serde(default)]
    pub enum_map: Option<HashMap<i64, String>>,
    /// Optional text encoding when interpreting bytes as strings.
    #[serde(default)]
    pub encoding: Option<EncodingDef>,
    /// Whether string values stop at the first zero byte.
    #[serde(default)]
    pub zero_terminated: bool,
    /// Whether leading/trailing whitespace is trimmed.
    #[serde(default)]
    pub trim: bool,
}

impl From<LayoutDef> for Layout {
    fn from(def: LayoutDef) -> Self {
        match def {
            LayoutDef::Packed => Layout::Packed,
            LayoutDef::Aligned => Layout::Aligned,
        }
    }
}

impl From<ByteOrderDef> for ByteOrder {
    fn from(def: ByteOrderDef) -> Self {
        match def {
            ByteOrderDef::Big => ByteOrder::Big,
            ByteOrderDef::Little => ByteOrder::Little,
        }
    }
}

impl TryFrom<SchemaDef> for Schema {
    type Error = SchemaError;

    fn try_from(def: SchemaDef) -> Result<Self, SchemaError> {
        let mut root = Container::new(def.layout.into());
        for field in def.fields {
            root.push(field.try_into()?)?;
        }
        Schema::new(root)
    }
}

impl TryFrom<FieldDef> for Field {
    type Error = SchemaError;

    fn try_from(def: FieldDef) -> Result<Self, SchemaError> {
        let kind = compile_kind(&def.name, def.kind)?;
        let field = Field::new(def.name.clone(), kind);
        match def.transform {
            Some(transform) => Ok(field.with_transform(compile_transform(&def.name, transform)?)),
            None => Ok(field),
        }
    }
}

fn compile_kind(name: &str, def: FieldKindDef) -> Result<FieldKind, SchemaError> {
    Ok(match def {
        FieldKindDef::Bit => FieldKind::Bit,
        FieldKindDef::Bits { width_bits } => FieldKind::Bits { width_bits },
        FieldKindDef::Mask { width_bits, order } => FieldKind::Mask {
            width: width_from_bits(name, width_bits)?,
            order: order.into(),
        },
        FieldKindDef::Int {
            width_bits,
            signed,
            order,
        } => FieldKind::Int {
            width: width_from_bits(name, width_bits)?,
            signed,
            order: order.into(),
        },
        FieldKindDef::Real { width_bits, order } => FieldKind::Real {
            precision: match width_bits {
                32 => Precision::Single,
                64 => Precision::Double,
                _ => {
                    return Err(SchemaError::InvalidWidth {
                        path: name.to_owned(),
                        width_bits,
                    });
                }
            },
            order: order.into(),
        },
        FieldKindDef::Bytes { len, len_from } => FieldKind::Bytes {
            len: compile_len(name, len, len_from)?,
        },
        FieldKindDef::Str { len, len_from } => FieldKind::Str {
            len: compile_len(name, len, len_from)?,
        },
        FieldKindDef::Struct { layout, fields } => {
            let mut container = Container::new(layout.into());
            for field in fields {
                container.push(field.try_into()?)?;
            }
            FieldKind::Struct(container)
        }
        FieldKindDef::Repeat {
            count,
            count_from,
            element,
        } => FieldKind::Repeat {
            count: match (count, count_from) {
                (Some(count), None) => Count::Fixed(count),
                (None, Some(path)) => Count::From(Resolver::path(path)),
                _ => {
                    return Err(SchemaError::InvalidDefinition {
                        path: name.to_owned(),
                        reason: "exactly one of `count` and `count_from` is required".to_owned(),
                    });
                }
            },
            element: Box::new((*element).try_into()?),
        },
    })
}

fn compile_len(
    name: &str,
    len: Option<usize>,
    len_from: Option<String>,
) -> Result<Len, SchemaError> {
    match (len, len_from) {
        (Some(len), None) => Ok(Len::Fixed(len)),
        (None, Some(path)) => Ok(Len::From(Resolver::path(path))),
        _ => Err(SchemaError::InvalidDefinition {
            path: name.to_owned(),
            reason: "exactly one of `len` and `len_from` is required".to_owned(),
        }),
    }
}

fn width_from_bits(name: &str, width_bits: usize) -> Result<Width, SchemaError> {
    match width_bits {
        8 => Ok(Width::W8),
        16 => Ok(Width::W16),
        32 => Ok(Width::W32),
        64 => Ok(Width::W64),
        _ => Err(SchemaError::InvalidWidth {
            path: name.to_owned(),
            width_bits,
        }),
    }
}

fn compile_transform(name: &str, def: TransformDef) -> Result<Transform, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidDefinition {
        path: name.to_owned(),
        reason,
    };
    let mut transform = Transform::new();
    if let Some(scale) = def.scale {
        transform = transform
            .with_scale(scale)
            .map_err(|e| invalid(e.to_string()))?;
    }
    if let Some(offset) = def.offset {
        transform = transform
            .with_offset(offset)
            .map_err(|e| invalid(e.to_string()))?;
    }
    if let Some(map) = def.enum_map {
        transform = transform.with_enum_map(map);
    }
    if let Some(encoding) = def.encoding {
        transform = transform.with_encoding(match encoding {
            EncodingDef::Utf8 => Encoding::Utf8,
            EncodingDef::Ascii => Encoding::Ascii,
        });
    }
    if def.zero_terminated {
        transform = transform.zero_terminated();
    }
    if def.trim {
        transform = transform.trimmed();
    }
    Ok(transform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_compile_length_prefixed_schema() {
        let def: SchemaDef = serde_json::from_str(
            r#"{
                "fields": [
                    { "name": "tag", "kind": { "type": "Int", "width_bits": 8 } },
                    { "name": "body", "kind": { "type": "Bytes", "len_from": "tag" } }
                ]
            }"#,
        )
        .unwrap();
        let schema: Schema = def.try_into().unwrap();

        let decoded = schema.decode(&[0x02, 0xAA, 0xBB]).unwrap();
        assert_eq!(decoded.values.get("tag"), Some(&Value::U64(2)));
        assert_eq!(
            decoded.values.get("body"),
            Some(&Value::Bytes(vec![0xAA, 0xBB]))
        );
    }

    #[test]
    fn test_compile_packed_struct_and_repeat() {
        let def: SchemaDef = serde_json::from_str(
            r#"{
                "fields": [
                    {
                        "name": "header",
                        "kind": {
                            "type": "Struct",
                            "layout": "Packed",
                            "fields": [
                                { "name": "version", "kind": { "type": "Bits", "width_bits": 4 } },
                                { "name": "hlen", "kind": { "type": "Bits", "width_bits": 4 } }
                            ]
                        }
                    },
                    { "name": "count", "kind": { "type": "Int", "width_bits": 8 } },
                    {
                        "name": "items",
                        "kind": {
                            "type": "Repeat",
                            "count_from": "count",
                            "element": {
                                "name": "item",
                                "kind": { "type": "Int", "width_bits": 16, "order": "Little" }
                            }
                        }
                    }
                ]
            }"#,
        )
        .unwrap();
        let schema: Schema = def.try_into().unwrap();

        let decoded = schema.decode(&[0x45, 0x02, 0x01, 0x00, 0x00, 0x01]).unwrap();
        assert_eq!(decoded.values.get("header.version"), Some(&Value::U64(4)));
        assert_eq!(decoded.values.get("header.hlen"), Some(&Value::U64(5)));
        assert_eq!(
            decoded.values.get("items"),
            Some(&Value::Array(vec![Value::U64(1), Value::U64(256)]))
        );
    }

    #[test]
    fn test_compile_transform_def() {
        let def: SchemaDef = serde_json::from_str(
            r#"{
                "fields": [
                    {
                        "name": "temp",
                        "kind": { "type": "Int", "width_bits": 16 },
                        "transform": { "scale": 0.01, "offset": -40.0 }
                    }
                ]
            }"#,
        )
        .unwrap();
        let schema: Schema = def.try_into().unwrap();

        let decoded = schema.decode(&[0x13, 0x88]).unwrap();
        assert_eq!(
            schema.presented("temp", &decoded.values).unwrap(),
            Value::F64(5000.0 * 0.01 - 40.0)
        );
    }

    #[test]
    fn test_bytes_def_requires_exactly_one_length() {
        let def: SchemaDef = serde_json::from_str(
            r#"{
                "fields": [
                    { "name": "body", "kind": { "type": "Bytes" } }
                ]
            }"#,
        )
        .unwrap();
        let result: Result<Schema, SchemaError> = def.try_into();
        assert!(matches!(
            result.unwrap_err(),
            SchemaError::InvalidDefinition { ref path, .. } if path == "body"
        ));
    }

    #[test]
    fn test_bad_width_rejected() {
        let def: SchemaDef = serde_json::from_str(
            r#"{
                "fields": [
                    { "name": "v", "kind": { "type": "Int", "width_bits": 24 } }
                ]
            }"#,
        )
        .unwrap();
        let result: Result<Schema, SchemaError> = def.try_into();
        assert_eq!(
            result.unwrap_err(),
            SchemaError::InvalidWidth {
                path: "v".to_owned(),
                width_bits: 24
            }
        );
    }
}
