//! Per-pass value scopes consulted by resolvers.

use crate::errors::CodecError;
use crate::value::{Record, Value};

/// Stack of name scopes built up during one encode or decode pass.
///
/// Each enclosing container instance contributes one scope; values land in
/// the innermost scope as the traversal materializes them. Lookups search
/// innermost-outward, so a resolver sees its own record's earlier siblings
/// first, then ancestor siblings, and finally absolute paths from the record
/// root. A context never outlives its pass.
#[derive(Debug, Default)]
pub struct Context {
    scopes: Vec<Record>,
}

impl Context {
    pub(crate) fn new() -> Self {
        Context {
            scopes: vec![Record::new()],
        }
    }

    pub(crate) fn enter(&mut self) {
        self.scopes.push(Record::new());
    }

    pub(crate) fn exit(&mut self) -> Record {
        self.scopes.pop().unwrap_or_default()
    }

    pub(crate) fn bind(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.set(name, value);
        }
    }

    pub(crate) fn into_root(mut self) -> Record {
        self.scopes.drain(..).next().unwrap_or_default()
    }

    /// Resolves `path` against the values materialized so far.
    ///
    /// Fails with [CodecError::UnresolvedReference] when the path is not
    /// reachable yet; a reference to a field declared later in traversal
    /// order is a schema error and is rejected when the schema is built.
    pub fn get(&self, path: &str) -> Result<&Value, CodecError> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(path) {
                return Ok(value);
            }
        }
        Err(CodecError::UnresolvedReference {
            path: String::new(),
            reference: path.to_owned(),
        })
    }

    /// [Context::get] with an unsigned-integer view of the value.
    pub fn get_u64(&self, path: &str) -> Result<u64, CodecError> {
        let value = self.get(path)?;
        value.as_u64().ok_or_else(|| CodecError::WrongType {
            path: path.to_owned(),
            expected: "unsigned integer",
            found: value.kind_name(),
        })
    }

    /// [Context::get_u64] narrowed to `usize`, for lengths and counts.
    pub fn get_usize(&self, path: &str) -> Result<usize, CodecError> {
        let value = self.get_u64(path)?;
        usize::try_from(value).map_err(|_| CodecError::ShapeConflict {
            path: String::new(),
            reason: format!("resolved size {value} is out of range"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_searches_innermost_first() {
        let mut ctx = Context::new();
        ctx.bind("len", Value::U64(1));
        ctx.enter();
        ctx.bind("len", Value::U64(2));
        assert_eq!(ctx.get_u64("len").unwrap(), 2);
        ctx.exit();
        assert_eq!(ctx.get_u64("len").unwrap(), 1);
    }

    #[test]
    fn test_lookup_reaches_outer_scopes() {
        let mut ctx = Context::new();
        ctx.bind("count", Value::U64(3));
        ctx.enter();
        assert_eq!(ctx.get_u64("count").unwrap(), 3);
    }

    #[test]
    fn test_dotted_lookup_through_bound_structs() {
        let mut ctx = Context::new();
        let header = Record::new().with("len", Value::U64(9));
        ctx.bind("header", Value::Struct(header));
        assert_eq!(ctx.get_u64("header.len").unwrap(), 9);
    }

    #[test]
    fn test_unresolved_reference() {
        let ctx = Context::new();
        assert!(matches!(
            ctx.get("missing").unwrap_err(),
            CodecError::UnresolvedReference { .. }
        ));
    }

    #[test]
    fn test_wrong_type_for_numeric_view() {
        let mut ctx = Context::new();
        ctx.bind("blob", Value::Bytes(vec![1, 2]));
        assert!(matches!(
            ctx.get_u64("blob").unwrap_err(),
            CodecError::WrongType { .. }
        ));
    }
}
