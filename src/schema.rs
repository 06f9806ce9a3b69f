//! Schema: validated record layout plus the encode and decode passes.
//!
//! Both passes share one left-to-right traversal in declaration order, because
//! dependent resolution only ever looks backward at already-materialized
//! siblings. A schema whose resolver needs a later field is rejected when the
//! schema is built, never at run time.

use std::collections::HashSet;

use crate::bits::{BitOrder, BitView, sign_extend};
use crate::container::{Container, Layout};
use crate::context::Context;
use crate::errors::{BitsError, CodecError, SchemaError};
use crate::field::{Count, Field, FieldKind, Len, Precision};
use crate::value::{Mask, Record, Value};

/// Result of a completed decode pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Decoded values in declaration order.
    pub values: Record,
    /// Total encoded size of the record in bits.
    pub size_bits: usize,
    /// Whole bytes consumed from the input. Trailing input beyond the record
    /// is permitted and left unread.
    pub consumed_bytes: usize,
}

/// A validated, immutable record layout.
///
/// Safe to share across threads: each pass allocates its own view and
/// context, and nothing in a pass mutates the schema.
#[derive(Debug, Clone)]
pub struct Schema {
    root: Container,
    min_bits: usize,
}

impl Schema {
    /// Validates `root` eagerly: declared widths, reference existence, and
    /// reference order. Duplicate names and layout violations are already
    /// rejected while containers are built.
    pub fn new(root: Container) -> Result<Self, SchemaError> {
        let mut all = HashSet::new();
        collect_names(&root, &mut all);

        let mut seen: Vec<Vec<String>> = Vec::new();
        let mut path: Vec<String> = Vec::new();
        validate_container(&root, &mut seen, &all, &mut path)?;

        let min_bits = root.min_size_bits();
        Ok(Schema { root, min_bits })
    }

    pub fn root(&self) -> &Container {
        &self.root
    }

    /// Lower bound on the encoded size in bits, counting dependent shapes as
    /// empty. Any input shorter than this fails every decode.
    pub fn min_size_bits(&self) -> usize {
        self.min_bits
    }

    /// Decodes one record from the front of `bytes`.
    ///
    /// Walks the schema in declaration order, resolving each dependent shape
    /// from the values decoded before it. Truncated input fails with
    /// [CodecError::OutOfRange] at the exact field and bit offset.
    pub fn decode(&self, bytes: &[u8]) -> Result<Decoded, CodecError> {
        let mut view = BitView::from_bytes(bytes);
        let mut ctx = Context::new();
        let mut path = Vec::new();
        decode_fields(&self.root, &mut view, &mut ctx, &mut path)?;
        let size_bits = view.position_bits();
        Ok(Decoded {
            values: ctx.into_root(),
            size_bits,
            consumed_bytes: size_bits.div_ceil(8),
        })
    }

    /// Encodes `values` into a fresh byte buffer.
    ///
    /// The same traversal as decode, with resolvers consulting assigned
    /// values: every field must be assigned, in-domain, and consistent with
    /// the shapes its siblings resolve to.
    pub fn encode(&self, values: &Record) -> Result<Vec<u8>, CodecError> {
        let mut view = BitView::new();
        let mut ctx = Context::new();
        let mut path = Vec::new();
        encode_fields(&self.root, values, &mut view, &mut ctx, &mut path)?;
        Ok(view.into_bytes())
    }

    /// Encoded size in bits of a complete assignment, after resolving every
    /// dependent shape in it.
    pub fn size_bits(&self, values: &Record) -> Result<usize, CodecError> {
        let mut view = BitView::new();
        let mut ctx = Context::new();
        let mut path = Vec::new();
        encode_fields(&self.root, values, &mut view, &mut ctx, &mut path)?;
        Ok(view.total_bits())
    }

    /// Fetches `path` from a decoded record and applies the field's
    /// presentation transform, if it declares one.
    pub fn presented(&self, path: &str, values: &Record) -> Result<Value, CodecError> {
        let value = values
            .get(path)
            .ok_or_else(|| CodecError::UnresolvedReference {
                path: path.to_owned(),
                reference: path.to_owned(),
            })?;
        match self.root.field(path).and_then(Field::transform) {
            Some(transform) => transform
                .apply(value)
                .map_err(|source| CodecError::Transform {
                    path: path.to_owned(),
                    source,
                }),
            None => Ok(value.clone()),
        }
    }
}

fn collect_names(container: &Container, all: &mut HashSet<String>) {
    for field in container.fields() {
        all.insert(field.name().to_owned());
        match field.kind() {
            FieldKind::Struct(child) => collect_names(child, all),
            FieldKind::Repeat { element, .. } => {
                all.insert(element.name().to_owned());
                if let FieldKind::Struct(child) = element.kind() {
                    collect_names(child, all);
                }
            }
            _ => {}
        }
    }
}

fn validate_container(
    container: &Container,
    seen: &mut Vec<Vec<String>>,
    all: &HashSet<String>,
    path: &mut Vec<String>,
) -> Result<(), SchemaError> {
    seen.push(Vec::new());
    for field in container.fields() {
        path.push(field.name().to_owned());
        validate_field(field, seen, all, path)?;
        path.pop();
        if let Some(scope) = seen.last_mut() {
            scope.push(field.name().to_owned());
        }
    }
    seen.pop();
    Ok(())
}

fn validate_field(
    field: &Field,
    seen: &mut Vec<Vec<String>>,
    all: &HashSet<String>,
    path: &mut Vec<String>,
) -> Result<(), SchemaError> {
    match field.kind() {
        FieldKind::Bits { width_bits } if *width_bits == 0 || *width_bits > 64 => {
            return Err(SchemaError::InvalidWidth {
                path: path.join("."),
                width_bits: *width_bits,
            });
        }
        FieldKind::Repeat {
            count: Count::Fixed(0),
            ..
        } => {
            return Err(SchemaError::EmptyRepeat { path: path.join(".") });
        }
        _ => {}
    }

    // A dep is resolvable when its first segment names a field that is fully
    // declared before this one in some enclosing scope; everything under an
    // already-declared field is materialized by the time this one runs.
    for dep in field_deps(field.kind()) {
        let first = dep.split('.').next().unwrap_or(dep);
        let visible = seen
            .iter()
            .any(|scope| scope.iter().any(|name| name == first));
        if !visible {
            return Err(if all.contains(first) {
                SchemaError::ForwardReference {
                    path: path.join("."),
                    reference: dep.to_owned(),
                }
            } else {
                SchemaError::UnknownReference {
                    path: path.join("."),
                    reference: dep.to_owned(),
                }
            });
        }
    }

    match field.kind() {
        FieldKind::Struct(child) => validate_container(child, seen, all, path),
        FieldKind::Repeat { element, .. } => {
            path.push(element.name().to_owned());
            let result = validate_field(element, seen, all, path);
            path.pop();
            result
        }
        _ => Ok(()),
    }
}

fn field_deps(kind: &FieldKind) -> &[String] {
    match kind {
        FieldKind::Bytes {
            len: Len::From(resolver),
        }
        | FieldKind::Str {
            len: Len::From(resolver),
        } => resolver.deps(),
        FieldKind::Dynamic(resolver) => resolver.deps(),
        FieldKind::Repeat {
            count: Count::From(resolver),
            ..
        } => resolver.deps(),
        _ => &[],
    }
}

fn decode_fields(
    container: &Container,
    view: &mut BitView,
    ctx: &mut Context,
    path: &mut Vec<String>,
) -> Result<(), CodecError> {
    for field in container.fields() {
        path.push(field.name().to_owned());
        let value = decode_kind(field.kind(), container.layout(), view, ctx, path)?;
        ctx.bind(field.name(), value);
        path.pop();
    }
    Ok(())
}

fn decode_kind(
    kind: &FieldKind,
    layout: Layout,
    view: &mut BitView,
    ctx: &mut Context,
    path: &mut Vec<String>,
) -> Result<Value, CodecError> {
    match kind {
        FieldKind::Bit => {
            let bit = view
                .read_bits(1, BitOrder::MsbFirst)
                .map_err(|e| bits_err(e, path))?;
            Ok(Value::Bool(bit != 0))
        }
        FieldKind::Bits { width_bits } => {
            let value = view
                .read_bits(*width_bits, BitOrder::MsbFirst)
                .map_err(|e| bits_err(e, path))?;
            Ok(Value::U64(value))
        }
        FieldKind::Mask { width, order } => {
            let value = view
                .read_uint(width.bits(), *order)
                .map_err(|e| bits_err(e, path))?;
            Ok(Value::Mask(Mask(value)))
        }
        FieldKind::Int {
            width,
            signed,
            order,
        } => {
            let raw = view
                .read_uint(width.bits(), *order)
                .map_err(|e| bits_err(e, path))?;
            Ok(if *signed {
                Value::I64(sign_extend(raw, width.bits()))
            } else {
                Value::U64(raw)
            })
        }
        FieldKind::Real { precision, order } => {
            let raw = view
                .read_uint(precision.bits(), *order)
                .map_err(|e| bits_err(e, path))?;
            Ok(match precision {
                Precision::Single => Value::F32(f32::from_bits(raw as u32)),
                Precision::Double => Value::F64(f64::from_bits(raw)),
            })
        }
        FieldKind::Bytes { len } => {
            let len = resolve_len(len, ctx, path)?;
            let data = view.read_bytes(len).map_err(|e| bits_err(e, path))?;
            Ok(Value::Bytes(data))
        }
        FieldKind::Str { len } => {
            let len = resolve_len(len, ctx, path)?;
            let data = view.read_bytes(len).map_err(|e| bits_err(e, path))?;
            let text = String::from_utf8(data).map_err(|_| CodecError::ShapeConflict {
                path: path.join("."),
                reason: "blob is not valid UTF-8".to_owned(),
            })?;
            Ok(Value::String(text))
        }
        FieldKind::Struct(child) => {
            if layout == Layout::Packed && child.layout() == Layout::Aligned {
                view.byte_align();
            }
            ctx.enter();
            decode_fields(child, view, ctx, path)?;
            let record = ctx.exit();
            if layout != child.layout() {
                view.byte_align();
            }
            Ok(Value::Struct(record))
        }
        FieldKind::Dynamic(resolver) => {
            let resolved = resolver.resolve(ctx).map_err(|e| e.at(&path.join(".")))?;
            check_resolved(&resolved, layout, path)?;
            decode_kind(&resolved, layout, view, ctx, path)
        }
        FieldKind::Repeat { count, element } => {
            let count = resolve_count(count, ctx, path)?;
            let mut items = Vec::new();
            for index in 0..count {
                path.push(index.to_string());
                let value = decode_kind(element.kind(), layout, view, ctx, path)?;
                path.pop();
                items.push(value);
            }
            Ok(Value::Array(items))
        }
    }
}

fn encode_fields(
    container: &Container,
    values: &Record,
    view: &mut BitView,
    ctx: &mut Context,
    path: &mut Vec<String>,
) -> Result<(), CodecError> {
    for field in container.fields() {
        path.push(field.name().to_owned());
        let value = values
            .value_of(field.name())
            .ok_or_else(|| CodecError::MissingValue { path: path.join(".") })?;
        encode_kind(field.kind(), container.layout(), value, view, ctx, path)?;
        ctx.bind(field.name(), value.clone());
        path.pop();
    }
    Ok(())
}

fn encode_kind(
    kind: &FieldKind,
    layout: Layout,
    value: &Value,
    view: &mut BitView,
    ctx: &mut Context,
    path: &mut Vec<String>,
) -> Result<(), CodecError> {
    match kind {
        FieldKind::Bit => {
            let bit = value
                .as_bool()
                .ok_or_else(|| wrong_type(path, "bool", value))?;
            view.write_bits(bit as u64, 1, BitOrder::MsbFirst)
                .map_err(|e| bits_err(e, path))
        }
        FieldKind::Bits { width_bits } => {
            let raw = value
                .as_u64()
                .ok_or_else(|| wrong_type(path, "unsigned integer", value))?;
            view.write_bits(raw, *width_bits, BitOrder::MsbFirst)
                .map_err(|e| bits_err(e, path))
        }
        FieldKind::Mask { width, order } => {
            let raw = value
                .as_u64()
                .ok_or_else(|| wrong_type(path, "mask", value))?;
            view.write_uint(raw, width.bits(), *order)
                .map_err(|e| bits_err(e, path))
        }
        FieldKind::Int {
            width,
            signed: false,
            order,
        } => {
            let raw = value
                .as_u64()
                .ok_or_else(|| wrong_type(path, "unsigned integer", value))?;
            view.write_uint(raw, width.bits(), *order)
                .map_err(|e| bits_err(e, path))
        }
        FieldKind::Int {
            width,
            signed: true,
            order,
        } => {
            let signed = value
                .as_i64()
                .ok_or_else(|| wrong_type(path, "signed integer", value))?;
            let bits = width.bits();
            let raw = if bits < 64 {
                let min = -(1i64 << (bits - 1));
                let max = (1i64 << (bits - 1)) - 1;
                if signed < min || signed > max {
                    return Err(CodecError::ValueOutOfDomain {
                        path: path.join("."),
                        value: signed.to_string(),
                        width_bits: bits,
                    });
                }
                (signed as u64) & ((1u64 << bits) - 1)
            } else {
                signed as u64
            };
            view.write_uint(raw, bits, *order)
                .map_err(|e| bits_err(e, path))
        }
        FieldKind::Real { precision, order } => {
            let number = value
                .as_f64()
                .ok_or_else(|| wrong_type(path, "float", value))?;
            let raw = match precision {
                Precision::Single => (number as f32).to_bits() as u64,
                Precision::Double => number.to_bits(),
            };
            view.write_uint(raw, precision.bits(), *order)
                .map_err(|e| bits_err(e, path))
        }
        FieldKind::Bytes { len } => {
            let data = value
                .as_bytes()
                .ok_or_else(|| wrong_type(path, "bytes", value))?;
            let len = resolve_len(len, ctx, path)?;
            if data.len() != len {
                return Err(CodecError::ShapeConflict {
                    path: path.join("."),
                    reason: format!("resolved length {len} but {} bytes assigned", data.len()),
                });
            }
            view.write_bytes(data).map_err(|e| bits_err(e, path))
        }
        FieldKind::Str { len } => {
            let text = value
                .as_str()
                .ok_or_else(|| wrong_type(path, "string", value))?;
            let len = resolve_len(len, ctx, path)?;
            if text.len() != len {
                return Err(CodecError::ShapeConflict {
                    path: path.join("."),
                    reason: format!("resolved length {len} but {} bytes assigned", text.len()),
                });
            }
            view.write_bytes(text.as_bytes())
                .map_err(|e| bits_err(e, path))
        }
        FieldKind::Struct(child) => {
            let record = value
                .as_struct()
                .ok_or_else(|| wrong_type(path, "struct", value))?;
            if layout == Layout::Packed && child.layout() == Layout::Aligned {
                view.byte_align();
            }
            ctx.enter();
            encode_fields(child, record, view, ctx, path)?;
            ctx.exit();
            if layout != child.layout() {
                view.byte_align();
            }
            Ok(())
        }
        FieldKind::Dynamic(resolver) => {
            let resolved = resolver.resolve(ctx).map_err(|e| e.at(&path.join(".")))?;
            check_resolved(&resolved, layout, path)?;
            encode_kind(&resolved, layout, value, view, ctx, path)
        }
        FieldKind::Repeat { count, element } => {
            let items = value
                .as_array()
                .ok_or_else(|| wrong_type(path, "array", value))?;
            let count = resolve_count(count, ctx, path)?;
            if items.len() != count {
                return Err(CodecError::ShapeConflict {
                    path: path.join("."),
                    reason: format!(
                        "resolved count {count} but {} elements assigned",
                        items.len()
                    ),
                });
            }
            for (index, item) in items.iter().enumerate() {
                path.push(index.to_string());
                encode_kind(element.kind(), layout, item, view, ctx, path)?;
                path.pop();
            }
            Ok(())
        }
    }
}

/// A resolver's output must be a concrete, layout-compatible shape.
fn check_resolved(kind: &FieldKind, layout: Layout, path: &[String]) -> Result<(), CodecError> {
    let reason = match kind {
        FieldKind::Dynamic(_) => Some("resolver produced another dependent field".to_owned()),
        FieldKind::Bits { width_bits } if *width_bits == 0 || *width_bits > 64 => {
            Some(format!("resolved width of {width_bits} bits is invalid"))
        }
        FieldKind::Bit if layout == Layout::Aligned => {
            Some("resolved bit-granular field in a byte-structured container".to_owned())
        }
        FieldKind::Bits { width_bits } if layout == Layout::Aligned && width_bits % 8 != 0 => {
            Some("resolved bit-granular field in a byte-structured container".to_owned())
        }
        _ => None,
    };
    match reason {
        Some(reason) => Err(CodecError::ShapeConflict {
            path: path.join("."),
            reason,
        }),
        None => Ok(()),
    }
}

fn resolve_len(len: &Len, ctx: &Context, path: &[String]) -> Result<usize, CodecError> {
    match len {
        Len::Fixed(len) => Ok(*len),
        Len::From(resolver) => resolver.resolve(ctx).map_err(|e| e.at(&path.join("."))),
    }
}

fn resolve_count(count: &Count, ctx: &Context, path: &[String]) -> Result<usize, CodecError> {
    match count {
        Count::Fixed(count) => Ok(*count),
        Count::From(resolver) => resolver.resolve(ctx).map_err(|e| e.at(&path.join("."))),
    }
}

fn bits_err(err: BitsError, path: &[String]) -> CodecError {
    let path = path.join(".");
    match err {
        BitsError::OutOfRange {
            at,
            wanted,
            available,
        } => CodecError::OutOfRange {
            path,
            offset_bits: at,
            wanted_bits: wanted,
            available_bits: available,
        },
        BitsError::InvalidWidth(width) => CodecError::ShapeConflict {
            path,
            reason: format!("invalid width of {width} bits"),
        },
        BitsError::ValueTooWide { value, width } => CodecError::ValueOutOfDomain {
            path,
            value: format!("{value:#x}"),
            width_bits: width,
        },
    }
}

fn wrong_type(path: &[String], expected: &'static str, value: &Value) -> CodecError {
    CodecError::WrongType {
        path: path.join("."),
        expected,
        found: value.kind_name(),
    }
}
