//! Ordered field collections.

use crate::errors::SchemaError;
use crate::field::{Field, FieldKind};

/// How a container lays out its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Children are bit-granular; nothing is padded between them.
    Packed,
    /// Every child occupies a whole number of bytes.
    #[default]
    Aligned,
}

/// Ordered, uniquely named collection of fields, itself usable as a field
/// through [FieldKind::Struct].
///
/// Insertion order is encoding order and the only valid decode order.
#[derive(Debug, Clone)]
pub struct Container {
    layout: Layout,
    fields: Vec<Field>,
}

impl Container {
    pub fn new(layout: Layout) -> Self {
        Container {
            layout,
            fields: Vec::new(),
        }
    }

    /// Bit-granular container.
    pub fn packed() -> Self {
        Container::new(Layout::Packed)
    }

    /// Byte-structured container.
    pub fn aligned() -> Self {
        Container::new(Layout::Aligned)
    }

    /// Appends `field`, rejecting duplicate names and layout violations.
    pub fn push(&mut self, field: Field) -> Result<(), SchemaError> {
        if self.fields.iter().any(|f| f.name() == field.name()) {
            return Err(SchemaError::DuplicateName(field.name().to_owned()));
        }
        if self.layout == Layout::Aligned {
            check_byte_granular(&field)?;
        }
        self.fields.push(field);
        Ok(())
    }

    /// Builder-style [Container::push].
    pub fn with(mut self, field: Field) -> Result<Self, SchemaError> {
        self.push(field)?;
        Ok(self)
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Children in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Looks up a declared field by dotted path. Numeric segments step over
    /// repeat indices into the element template.
    pub fn field(&self, path: &str) -> Option<&Field> {
        match path.split_once('.') {
            None => self.fields.iter().find(|f| f.name() == path),
            Some((head, rest)) => {
                let field = self.fields.iter().find(|f| f.name() == head)?;
                field.child(rest)
            }
        }
    }

    /// Total encoded size in bits when every descendant is fixed, `None` as
    /// soon as any dependent shape is involved.
    pub fn fixed_size_bits(&self) -> Option<usize> {
        let mut bits = 0usize;
        for field in &self.fields {
            let size = field.fixed_size_bits()?;
            match field.kind() {
                FieldKind::Struct(child) if child.layout() != self.layout => {
                    // Byte-structured children of a packed parent start and
                    // end on byte boundaries; packed children of an aligned
                    // parent end on one.
                    if child.layout() == Layout::Aligned {
                        bits = bits.next_multiple_of(8);
                    }
                    bits += size;
                    bits = bits.next_multiple_of(8);
                }
                _ => bits += size,
            }
        }
        Some(bits)
    }

    /// Lower bound on the encoded size; alignment padding only ever adds.
    pub(crate) fn min_size_bits(&self) -> usize {
        self.fields.iter().map(Field::min_size_bits).sum()
    }
}

/// Aligned containers accept only children that occupy whole bytes.
fn check_byte_granular(field: &Field) -> Result<(), SchemaError> {
    let ok = match field.kind() {
        FieldKind::Bit => false,
        FieldKind::Bits { width_bits } => width_bits % 8 == 0,
        FieldKind::Repeat { element, .. } => return check_byte_granular(element),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(SchemaError::MisalignedChild {
            path: field.name().to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::ByteOrder;
    use crate::field::Width;

    #[test]
    fn test_duplicate_name_rejected() {
        let result = Container::aligned()
            .with(Field::u8("id"))
            .unwrap()
            .with(Field::u8("id"));
        assert_eq!(
            result.unwrap_err(),
            SchemaError::DuplicateName("id".to_owned())
        );
    }

    #[test]
    fn test_bit_field_rejected_in_aligned_container() {
        let result = Container::aligned().with(Field::bit("flag"));
        assert_eq!(
            result.unwrap_err(),
            SchemaError::MisalignedChild {
                path: "flag".to_owned()
            }
        );

        let result = Container::aligned().with(Field::bits("nibble", 4));
        assert!(result.is_err());

        // Byte-multiple bit fields are fine.
        assert!(Container::aligned().with(Field::bits("word", 16)).is_ok());
    }

    #[test]
    fn test_packed_container_accepts_mixed_granularity() {
        let container = Container::packed()
            .with(Field::bit("flag"))
            .unwrap()
            .with(Field::bits("len", 7))
            .unwrap()
            .with(Field::uint("crc", Width::W16, ByteOrder::Big))
            .unwrap();
        assert_eq!(container.fixed_size_bits(), Some(24));
    }

    #[test]
    fn test_fixed_size_accounts_for_alignment() {
        let aligned_child = Container::aligned().with(Field::u8("b")).unwrap();
        let container = Container::packed()
            .with(Field::bits("head", 3))
            .unwrap()
            .with(Field::nested("body", aligned_child))
            .unwrap();
        // 3 bits, pad to 8, then 8 bits, already aligned after.
        assert_eq!(container.fixed_size_bits(), Some(16));
    }

    #[test]
    fn test_fixed_size_undefined_with_dependents() {
        let container = Container::aligned()
            .with(Field::u8("len"))
            .unwrap()
            .with(Field::bytes_from("body", "len"))
            .unwrap();
        assert_eq!(container.fixed_size_bits(), None);
        assert_eq!(container.min_size_bits(), 8);
    }

    #[test]
    fn test_field_path_lookup() {
        let inner = Container::aligned().with(Field::u8("len")).unwrap();
        let container = Container::aligned()
            .with(Field::nested("header", inner))
            .unwrap();
        assert_eq!(
            container.field("header.len").map(Field::name),
            Some("len")
        );
        assert!(container.field("header.missing").is_none());
    }
}
