// Tuple layer: field values, schemas and the tuples stored on heap pages.
//
// Fields have a canonical fixed-width byte encoding so that every tuple of
// a given schema occupies the same number of bytes on a page.

use std::fmt;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};

use crate::common::types::{RecordId, STRING_LEN};
use crate::storage::page::PageError;

/// The two column types the engine stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Str,
}

impl FieldType {
    /// Encoded width of a field of this type, in bytes.
    pub fn byte_len(self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Str => 4 + STRING_LEN,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "int"),
            FieldType::Str => write!(f, "string"),
        }
    }
}

/// A single column value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::Str(_) => FieldType::Str,
        }
    }

    /// Serialize into `buf`, which must be exactly `byte_len()` bytes.
    ///
    /// INT is 4-byte big-endian two's complement. STR is a 4-byte
    /// big-endian length followed by `STRING_LEN` content bytes, zero
    /// padded; longer strings are truncated.
    pub fn write_to(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), self.field_type().byte_len());
        match self {
            Field::Int(v) => BigEndian::write_i32(buf, *v),
            Field::Str(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_LEN);
                BigEndian::write_u32(&mut buf[0..4], len as u32);
                buf[4..4 + len].copy_from_slice(&bytes[..len]);
                buf[4 + len..].fill(0);
            }
        }
    }

    /// Decode a field of the given type from `buf`.
    pub fn read_from(field_type: FieldType, buf: &[u8]) -> Field {
        match field_type {
            FieldType::Int => Field::Int(BigEndian::read_i32(buf)),
            FieldType::Str => {
                let len = (BigEndian::read_u32(&buf[0..4]) as usize).min(STRING_LEN);
                let content = String::from_utf8_lossy(&buf[4..4 + len]).into_owned();
                Field::Str(content)
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}

/// One column of a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdItem {
    pub field_type: FieldType,
    pub name: Option<String>,
}

/// An immutable ordered sequence of column types with optional names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    pub fn new(types: Vec<FieldType>, names: Vec<Option<String>>) -> Self {
        debug_assert_eq!(types.len(), names.len());
        let items = types
            .into_iter()
            .zip(names)
            .map(|(field_type, name)| TdItem { field_type, name })
            .collect();
        TupleDesc { items }
    }

    pub fn with_types(types: Vec<FieldType>) -> Self {
        let names = vec![None; types.len()];
        TupleDesc::new(types, names)
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, i: usize) -> FieldType {
        self.items[i].field_type
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.items[i].name.as_deref()
    }

    pub fn items(&self) -> impl Iterator<Item = &TdItem> {
        self.items.iter()
    }

    /// Index of the named column, if any.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.name.as_deref() == Some(name))
    }

    /// Encoded width of one tuple of this schema, in bytes.
    pub fn tuple_bytes(&self) -> usize {
        self.items.iter().map(|item| item.field_type.byte_len()).sum()
    }

    /// Same column types, regardless of names.
    pub fn compatible(&self, other: &TupleDesc) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| a.field_type == b.field_type)
    }

    /// Copy of this schema with every column name prefixed `alias.name`.
    pub fn prefixed(&self, alias: &str) -> TupleDesc {
        let items = self
            .items
            .iter()
            .map(|item| TdItem {
                field_type: item.field_type,
                name: item.name.as_ref().map(|n| format!("{}.{}", alias, n)),
            })
            .collect();
        TupleDesc { items }
    }
}

/// A row: a schema reference, one field per column, and the slot the row
/// occupies once it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> Self {
        Tuple {
            desc,
            fields,
            record_id: None,
        }
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn set_field(&mut self, i: usize, field: Field) {
        self.fields[i] = field;
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    /// Check arity and column types against `desc`.
    pub fn check_schema(&self, desc: &TupleDesc) -> Result<(), PageError> {
        if self.fields.len() != desc.num_fields() {
            return Err(PageError::SchemaMismatch(format!(
                "tuple has {} fields, schema has {}",
                self.fields.len(),
                desc.num_fields()
            )));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if field.field_type() != desc.field_type(i) {
                return Err(PageError::SchemaMismatch(format!(
                    "field {} is {}, schema wants {}",
                    i,
                    field.field_type(),
                    desc.field_type(i)
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        write!(f, "(")?;
        for field in &self.fields {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
            first = false;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_widths() {
        assert_eq!(FieldType::Int.byte_len(), 4);
        assert_eq!(FieldType::Str.byte_len(), 132);

        let desc = TupleDesc::with_types(vec![FieldType::Int, FieldType::Str]);
        assert_eq!(desc.tuple_bytes(), 136);
    }

    #[test]
    fn int_field_round_trip() {
        for v in [0, 1, -1, i32::MAX, i32::MIN, 424242] {
            let mut buf = [0u8; 4];
            Field::Int(v).write_to(&mut buf);
            assert_eq!(Field::read_from(FieldType::Int, &buf), Field::Int(v));
        }
        // big-endian two's complement on the wire
        let mut buf = [0u8; 4];
        Field::Int(1).write_to(&mut buf);
        assert_eq!(buf, [0, 0, 0, 1]);
        Field::Int(-1).write_to(&mut buf);
        assert_eq!(buf, [0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn str_field_round_trip() {
        let mut buf = [0u8; 132];
        Field::Str("hello".into()).write_to(&mut buf);
        assert_eq!(&buf[0..4], &[0, 0, 0, 5]);
        assert_eq!(&buf[4..9], b"hello");
        assert!(buf[9..].iter().all(|&b| b == 0));
        assert_eq!(
            Field::read_from(FieldType::Str, &buf),
            Field::Str("hello".into())
        );
    }

    #[test]
    fn str_field_truncates_to_payload() {
        let long = "x".repeat(STRING_LEN + 40);
        let mut buf = [0u8; 132];
        Field::Str(long).write_to(&mut buf);
        match Field::read_from(FieldType::Str, &buf) {
            Field::Str(s) => assert_eq!(s.len(), STRING_LEN),
            other => panic!("unexpected field {:?}", other),
        }
    }

    #[test]
    fn named_column_lookup() {
        let desc = TupleDesc::new(
            vec![FieldType::Int, FieldType::Int],
            vec![Some("a".into()), Some("b".into())],
        );
        assert_eq!(desc.index_of("b"), Some(1));
        assert_eq!(desc.index_of("c"), None);

        let aliased = desc.prefixed("t");
        assert_eq!(aliased.index_of("t.a"), Some(0));
        assert!(aliased.compatible(&desc));
    }

    #[test]
    fn schema_check_rejects_wrong_shape() {
        let desc = Arc::new(TupleDesc::with_types(vec![FieldType::Int]));
        let t = Tuple::new(desc.clone(), vec![Field::Str("oops".into())]);
        assert!(t.check_schema(&desc).is_err());

        let t = Tuple::new(desc.clone(), vec![Field::Int(1), Field::Int(2)]);
        assert!(t.check_schema(&desc).is_err());

        let t = Tuple::new(desc.clone(), vec![Field::Int(7)]);
        assert!(t.check_schema(&desc).is_ok());
    }
}
