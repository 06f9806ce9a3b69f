//! # bitframe
//!
//! Bit-precise codec for structured binary records.
//!
//! Declare a record's shape as named, typed fields — bit flags, integers and
//! floats in either byte order, byte/character blobs, nested records — then
//! encode assigned values into a byte stream or decode a byte stream back
//! into named values with the same declaration. A field's width, element
//! count, or concrete kind may be resolved at run time from sibling values
//! materialized earlier in the record, so length-prefixed blobs, counted
//! arrays, and tag-selected variants are all expressible.
//!
//! ## Example
//!
//! ```
//! use bitframe::container::Container;
//! use bitframe::field::Field;
//! use bitframe::schema::Schema;
//! use bitframe::value::{Record, Value};
//!
//! // A tag byte followed by a blob whose length is the tag's value.
//! let root = Container::aligned()
//!     .with(Field::u8("tag"))?
//!     .with(Field::bytes_from("body", "tag"))?;
//! let schema = Schema::new(root)?;
//!
//! let decoded = schema.decode(&[0x03, 0xAA, 0xBB, 0xCC])?;
//! assert_eq!(decoded.values.get("tag"), Some(&Value::U64(3)));
//! assert_eq!(
//!     decoded.values.get("body"),
//!     Some(&Value::Bytes(vec![0xAA, 0xBB, 0xCC])),
//! );
//!
//! let bytes = schema.encode(&decoded.values)?;
//! assert_eq!(bytes, vec![0x03, 0xAA, 0xBB, 0xCC]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bits;
pub mod container;
pub mod context;
pub mod errors;
pub mod field;
pub mod schema;
#[cfg(feature = "serde")]
pub mod serde;
pub mod transform;
pub mod value;
