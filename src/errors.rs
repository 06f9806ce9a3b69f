//! Error types for schema assembly, encode/decode passes, and transforms.

use thiserror::Error;

/// Errors produced by [crate::bits::BitView] reads and writes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BitsError {
    /// Requested more bits than remain unread in the buffer.
    #[error("requested {wanted} bits at bit {at}, {available} remain")]
    OutOfRange {
        at: usize,
        wanted: usize,
        available: usize,
    },
    /// Width is zero, above 64 bits, or not a byte multiple where one is required.
    #[error("invalid bit width {0}")]
    InvalidWidth(usize),
    /// Value does not fit the requested width.
    #[error("value {value:#x} does not fit in {width} bits")]
    ValueTooWide { value: u64, width: usize },
}

/// Errors detected while assembling a schema, before any pass runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two children of one container share a name.
    #[error("duplicate field name `{0}`")]
    DuplicateName(String),
    /// A field declares a width outside its kind's allowed range.
    #[error("`{path}`: invalid width of {width_bits} bits")]
    InvalidWidth { path: String, width_bits: usize },
    /// A bit-granular field sits directly in a byte-structured container.
    #[error("`{path}`: bit-granular field in a byte-structured container")]
    MisalignedChild { path: String },
    /// A resolver reads a field declared after the field that depends on it.
    #[error("`{path}`: resolver reads `{reference}`, which is declared later")]
    ForwardReference { path: String, reference: String },
    /// A resolver reads a field that does not exist anywhere in the schema.
    #[error("`{path}`: resolver reads unknown field `{reference}`")]
    UnknownReference { path: String, reference: String },
    /// A repeat field declares a fixed count of zero.
    #[error("`{path}`: repeat count is zero")]
    EmptyRepeat { path: String },
    /// A schema definition is internally inconsistent.
    #[error("`{path}`: {reason}")]
    InvalidDefinition { path: String, reason: String },
}

/// Errors that abort an encode or decode pass.
///
/// Every variant carries the dotted path of the failing field; offsets are
/// included where they locate the failure in the buffer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Decode ran past the end of the input buffer.
    #[error("`{path}` at bit {offset_bits}: requested {wanted_bits} bits, {available_bits} remain")]
    OutOfRange {
        path: String,
        offset_bits: usize,
        wanted_bits: usize,
        available_bits: usize,
    },
    /// An assigned value does not fit the field's declared width.
    #[error("`{path}`: {value} does not fit a {width_bits}-bit field")]
    ValueOutOfDomain {
        path: String,
        value: String,
        width_bits: usize,
    },
    /// An assigned value has the wrong type for the field kind.
    #[error("`{path}`: expected {expected}, got {found}")]
    WrongType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
    /// A resolver read a path that is not materialized at this point of the pass.
    #[error("`{path}`: reference `{reference}` is not resolved at this point")]
    UnresolvedReference { path: String, reference: String },
    /// A resolver produced a shape that conflicts with the data or assignment.
    #[error("`{path}`: {reason}")]
    ShapeConflict { path: String, reason: String },
    /// Encode found no assigned value for a field.
    #[error("`{path}`: no value assigned")]
    MissingValue { path: String },
    /// A presentation transform failed on the field's value.
    #[error("`{path}`: {source}")]
    Transform {
        path: String,
        #[source]
        source: TransformError,
    },
}

impl CodecError {
    /// Fills in the field path when the error was raised below the traversal
    /// (buffer or context level) without one.
    pub(crate) fn at(mut self, path: &str) -> CodecError {
        let slot = match &mut self {
            CodecError::OutOfRange { path, .. }
            | CodecError::ValueOutOfDomain { path, .. }
            | CodecError::WrongType { path, .. }
            | CodecError::UnresolvedReference { path, .. }
            | CodecError::ShapeConflict { path, .. }
            | CodecError::MissingValue { path }
            | CodecError::Transform { path, .. } => path,
        };
        if slot.is_empty() {
            *slot = path.to_owned();
        }
        self
    }
}

/// Errors that can occur when applying a [crate::transform::Transform].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// The value type does not match what the transform expects.
    #[error("transform cannot apply to a {0} value")]
    InvalidType(&'static str),
    /// An integer value has no entry in the enum map.
    #[error("no enum label for value {0}")]
    InvalidEnumValue(i64),
    /// Byte sequence is not valid for the chosen encoding.
    #[error("bytes are not valid {0}")]
    InvalidEncoding(&'static str),
    /// Scale or offset is non-finite (NaN or infinity).
    #[error("scale and offset must be finite")]
    InvalidScaleOffset,
}
