//! Field declarations: the typed units a schema is assembled from.

use std::fmt;
use std::sync::Arc;

use crate::bits::ByteOrder;
use crate::container::Container;
use crate::context::Context;
use crate::errors::CodecError;
use crate::transform::Transform;

/// Fixed widths for integer and mask fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    pub fn bits(self) -> usize {
        match self {
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
            Width::W64 => 64,
        }
    }
}

/// IEEE-754 precision for real fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    pub fn bits(self) -> usize {
        match self {
            Precision::Single => 32,
            Precision::Double => 64,
        }
    }
}

/// A pure function from the pass context to a concrete shape or size.
///
/// The paths a resolver consults are declared up front (`deps`), which is
/// what lets [crate::schema::Schema::new] reject forward references at
/// assembly time instead of at first use. Resolvers are stateless templates:
/// each pass produces one concrete resolution and discards it when the pass
/// completes.
#[derive(Clone)]
pub struct Resolver<T> {
    deps: Vec<String>,
    func: Arc<dyn Fn(&Context) -> Result<T, CodecError> + Send + Sync>,
}

impl<T> Resolver<T> {
    /// Builds a resolver from an explicit dep list and function. Every
    /// context path the function reads must appear in `deps`.
    pub fn with<I, S, F>(deps: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Context) -> Result<T, CodecError> + Send + Sync + 'static,
    {
        Resolver {
            deps: deps.into_iter().map(Into::into).collect(),
            func: Arc::new(func),
        }
    }

    /// Context paths this resolver consults.
    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    pub(crate) fn resolve(&self, ctx: &Context) -> Result<T, CodecError> {
        (self.func)(ctx)
    }
}

impl Resolver<usize> {
    /// Reads `path` from the context as an unsigned integer: the common case
    /// for length, count, and tag fields.
    pub fn path(path: impl Into<String>) -> Self {
        let path = path.into();
        let dep = path.clone();
        Resolver::with([dep], move |ctx: &Context| ctx.get_usize(&path))
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}

/// Length of a blob field: fixed at assembly or resolved from siblings.
#[derive(Debug, Clone)]
pub enum Len {
    Fixed(usize),
    From(Resolver<usize>),
}

/// Element count of a repeat field.
#[derive(Debug, Clone)]
pub enum Count {
    Fixed(usize),
    From(Resolver<usize>),
}

/// The closed set of field shapes.
///
/// Encode, decode, and size logic match on this exhaustively; a new shape is
/// a new arm, never runtime discovery.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Single-bit flag.
    Bit,
    /// Unsigned bit field of 1..=64 bits, bit-packed.
    Bits { width_bits: usize },
    /// Unsigned bitmask with a fixed byte-multiple width.
    Mask { width: Width, order: ByteOrder },
    /// Fixed-width integer with explicit byte order.
    Int {
        width: Width,
        signed: bool,
        order: ByteOrder,
    },
    /// IEEE-754 float with explicit byte order.
    Real {
        precision: Precision,
        order: ByteOrder,
    },
    /// Raw byte blob. Length is fixed or resolved, never implied.
    Bytes { len: Len },
    /// UTF-8 character blob with an externally determined byte length.
    Str { len: Len },
    /// Nested composite record.
    Struct(Container),
    /// Field whose concrete kind is chosen from sibling values at pass time.
    Dynamic(Resolver<FieldKind>),
    /// `count` instances of the element template, in sequence.
    Repeat { count: Count, element: Box<Field> },
}

/// A named, typed unit of a record.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    kind: FieldKind,
    transform: Option<Transform>,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Field {
            name: name.into(),
            kind,
            transform: None,
        }
    }

    /// Attaches a presentation transform, applied by
    /// [crate::schema::Schema::presented] after decoding.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    /// Encoded size in bits when no dependent shape is involved, `None`
    /// otherwise.
    pub fn fixed_size_bits(&self) -> Option<usize> {
        match &self.kind {
            FieldKind::Bit => Some(1),
            FieldKind::Bits { width_bits } => Some(*width_bits),
            FieldKind::Mask { width, .. } => Some(width.bits()),
            FieldKind::Int { width, .. } => Some(width.bits()),
            FieldKind::Real { precision, .. } => Some(precision.bits()),
            FieldKind::Bytes { len: Len::Fixed(n) } | FieldKind::Str { len: Len::Fixed(n) } => {
                Some(n * 8)
            }
            FieldKind::Bytes { .. } | FieldKind::Str { .. } => None,
            FieldKind::Struct(container) => container.fixed_size_bits(),
            FieldKind::Dynamic(_) => None,
            FieldKind::Repeat {
                count: Count::Fixed(n),
                element,
            } => element.fixed_size_bits().map(|size| size * n),
            FieldKind::Repeat { .. } => None,
        }
    }

    /// Lower bound on the encoded size, counting dependent shapes as empty.
    pub(crate) fn min_size_bits(&self) -> usize {
        match &self.kind {
            FieldKind::Bytes { len: Len::From(_) } | FieldKind::Str { len: Len::From(_) } => 0,
            FieldKind::Struct(container) => container.min_size_bits(),
            FieldKind::Dynamic(_) => 0,
            FieldKind::Repeat {
                count: Count::Fixed(n),
                element,
            } => element.min_size_bits() * n,
            FieldKind::Repeat { .. } => 0,
            _ => self.fixed_size_bits().unwrap_or(0),
        }
    }

    /// Resolves the remaining segments of a schema path inside this field.
    pub(crate) fn child(&self, path: &str) -> Option<&Field> {
        match &self.kind {
            FieldKind::Struct(container) => container.field(path),
            FieldKind::Repeat { element, .. } => match path.split_once('.') {
                None => path.parse::<usize>().ok().map(|_| element.as_ref()),
                Some((index, rest)) => {
                    index.parse::<usize>().ok()?;
                    element.child_or_self(rest)
                }
            },
            _ => None,
        }
    }

    fn child_or_self(&self, path: &str) -> Option<&Field> {
        if path.is_empty() {
            Some(self)
        } else {
            self.child(path)
        }
    }
}

// Shorthand constructors for the common field shapes.
impl Field {
    pub fn bit(name: impl Into<String>) -> Self {
        Field::new(name, FieldKind::Bit)
    }

    pub fn bits(name: impl Into<String>, width_bits: usize) -> Self {
        Field::new(name, FieldKind::Bits { width_bits })
    }

    pub fn mask(name: impl Into<String>, width: Width, order: ByteOrder) -> Self {
        Field::new(name, FieldKind::Mask { width, order })
    }

    /// Unsigned 8-bit integer; byte order is irrelevant at this width.
    pub fn u8(name: impl Into<String>) -> Self {
        Field::uint(name, Width::W8, ByteOrder::Big)
    }

    pub fn i8(name: impl Into<String>) -> Self {
        Field::int(name, Width::W8, ByteOrder::Big)
    }

    pub fn uint(name: impl Into<String>, width: Width, order: ByteOrder) -> Self {
        Field::new(
            name,
            FieldKind::Int {
                width,
                signed: false,
                order,
            },
        )
    }

    pub fn int(name: impl Into<String>, width: Width, order: ByteOrder) -> Self {
        Field::new(
            name,
            FieldKind::Int {
                width,
                signed: true,
                order,
            },
        )
    }

    pub fn float(name: impl Into<String>, order: ByteOrder) -> Self {
        Field::new(
            name,
            FieldKind::Real {
                precision: Precision::Single,
                order,
            },
        )
    }

    pub fn double(name: impl Into<String>, order: ByteOrder) -> Self {
        Field::new(
            name,
            FieldKind::Real {
                precision: Precision::Double,
                order,
            },
        )
    }

    pub fn bytes(name: impl Into<String>, len: usize) -> Self {
        Field::new(name, FieldKind::Bytes { len: Len::Fixed(len) })
    }

    /// Byte blob whose length is read from `path` during the pass.
    pub fn bytes_from(name: impl Into<String>, path: impl Into<String>) -> Self {
        Field::new(
            name,
            FieldKind::Bytes {
                len: Len::From(Resolver::path(path)),
            },
        )
    }

    pub fn string(name: impl Into<String>, len: usize) -> Self {
        Field::new(name, FieldKind::Str { len: Len::Fixed(len) })
    }

    pub fn string_from(name: impl Into<String>, path: impl Into<String>) -> Self {
        Field::new(
            name,
            FieldKind::Str {
                len: Len::From(Resolver::path(path)),
            },
        )
    }

    pub fn nested(name: impl Into<String>, container: Container) -> Self {
        Field::new(name, FieldKind::Struct(container))
    }

    pub fn dynamic(name: impl Into<String>, resolver: Resolver<FieldKind>) -> Self {
        Field::new(name, FieldKind::Dynamic(resolver))
    }

    pub fn repeat(name: impl Into<String>, count: usize, element: Field) -> Self {
        Field::new(
            name,
            FieldKind::Repeat {
                count: Count::Fixed(count),
                element: Box::new(element),
            },
        )
    }

    /// Repeat whose element count is read from `path` during the pass.
    pub fn repeat_from(
        name: impl Into<String>,
        path: impl Into<String>,
        element: Field,
    ) -> Self {
        Field::new(
            name,
            FieldKind::Repeat {
                count: Count::From(Resolver::path(path)),
                element: Box::new(element),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;

    #[test]
    fn test_fixed_size_bits() {
        assert_eq!(Field::bit("f").fixed_size_bits(), Some(1));
        assert_eq!(Field::bits("f", 11).fixed_size_bits(), Some(11));
        assert_eq!(
            Field::uint("f", Width::W32, ByteOrder::Big).fixed_size_bits(),
            Some(32)
        );
        assert_eq!(Field::bytes("f", 4).fixed_size_bits(), Some(32));
        assert_eq!(Field::bytes_from("f", "len").fixed_size_bits(), None);
        assert_eq!(
            Field::repeat("f", 3, Field::u8("e")).fixed_size_bits(),
            Some(24)
        );
        assert_eq!(
            Field::repeat_from("f", "n", Field::u8("e")).fixed_size_bits(),
            None
        );
    }

    #[test]
    fn test_min_size_bits_counts_dependents_as_empty() {
        assert_eq!(Field::bytes_from("f", "len").min_size_bits(), 0);
        assert_eq!(Field::u8("f").min_size_bits(), 8);

        let container = Container::aligned()
            .with(Field::u8("tag"))
            .unwrap()
            .with(Field::bytes_from("body", "tag"))
            .unwrap();
        assert_eq!(Field::nested("r", container).min_size_bits(), 8);
    }

    #[test]
    fn test_resolver_reports_deps() {
        let resolver = Resolver::path("header.len");
        assert_eq!(resolver.deps(), ["header.len"]);
    }

    #[test]
    fn test_schema_path_descends_repeats() {
        let element = Container::aligned().with(Field::u8("id")).unwrap();
        let field = Field::repeat_from("items", "count", Field::nested("item", element));
        assert_eq!(
            field.child("0.id").map(Field::name),
            Some("id")
        );
        assert!(field.child("x.id").is_none());
    }
}
