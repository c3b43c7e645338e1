//! Tuples, fields, and schemas.
//!
//! Fields are fixed-width on disk: an integer is 4 bytes, a string is a
//! 4-byte length prefix followed by a `STRING_LEN`-byte buffer. Every tuple
//! of a given schema therefore occupies the same number of bytes, which is
//! what makes the heap page's slot arithmetic work.

use crate::error::{DbError, DbResult};
use crate::storage::page::PageId;

/// Maximum number of bytes a string field stores.
pub const STRING_LEN: usize = 128;

/// The data types a field can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Str,
}

impl Type {
    /// On-disk width of a field of this type.
    pub fn byte_len(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::Str => 4 + STRING_LEN,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Str => write!(f, "string"),
        }
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn type_of(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Str(_) => Type::Str,
        }
    }

    /// Encodes the field into `buf`, which must be exactly
    /// `type_of().byte_len()` bytes. Strings longer than `STRING_LEN` bytes
    /// are truncated.
    pub fn write_to(&self, buf: &mut [u8]) {
        match self {
            Field::Int(v) => buf.copy_from_slice(&v.to_le_bytes()),
            Field::Str(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_LEN);
                buf[..4].copy_from_slice(&(len as u32).to_le_bytes());
                buf[4..4 + len].copy_from_slice(&bytes[..len]);
                buf[4 + len..].fill(0);
            }
        }
    }

    /// Decodes a field of type `ty` from `buf`.
    pub fn read_from(ty: Type, buf: &[u8]) -> DbResult<Field> {
        match ty {
            Type::Int => {
                let v = i32::from_le_bytes(buf[..4].try_into().unwrap());
                Ok(Field::Int(v))
            }
            Type::Str => {
                let len = u32::from_le_bytes(buf[..4].try_into().unwrap()) as usize;
                if len > STRING_LEN {
                    return Err(DbError::IllegalArgument(format!(
                        "string field length {} exceeds {}",
                        len, STRING_LEN
                    )));
                }
                let s = String::from_utf8_lossy(&buf[4..4 + len]).into_owned();
                Ok(Field::Str(s))
            }
        }
    }

    /// Total order between fields of the same type; comparing an int with a
    /// string is a caller bug.
    pub fn compare(&self, other: &Field) -> DbResult<std::cmp::Ordering> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Ok(a.cmp(b)),
            (Field::Str(a), Field::Str(b)) => Ok(a.cmp(b)),
            _ => Err(DbError::IllegalArgument(format!(
                "cannot compare {} with {}",
                self.type_of(),
                other.type_of()
            ))),
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}

/// One column of a schema: a type and an optional name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdItem {
    pub field_type: Type,
    pub name: Option<String>,
}

/// The schema of a tuple.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    /// Schema with named columns. `names` may contain `None` entries.
    pub fn new(types: Vec<Type>, names: Vec<Option<String>>) -> Self {
        let items = types
            .into_iter()
            .zip(names)
            .map(|(field_type, name)| TdItem { field_type, name })
            .collect();
        Self { items }
    }

    /// Schema with anonymous columns.
    pub fn of_types(types: Vec<Type>) -> Self {
        let items = types
            .into_iter()
            .map(|field_type| TdItem {
                field_type,
                name: None,
            })
            .collect();
        Self { items }
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, i: usize) -> DbResult<Type> {
        self.items
            .get(i)
            .map(|item| item.field_type)
            .ok_or_else(|| DbError::NoSuchElement(format!("field index {}", i)))
    }

    pub fn field_name(&self, i: usize) -> DbResult<Option<&str>> {
        self.items
            .get(i)
            .map(|item| item.name.as_deref())
            .ok_or_else(|| DbError::NoSuchElement(format!("field index {}", i)))
    }

    /// Index of the first column with the given name.
    pub fn field_name_to_index(&self, name: &str) -> DbResult<usize> {
        self.items
            .iter()
            .position(|item| item.name.as_deref() == Some(name))
            .ok_or_else(|| DbError::NoSuchElement(format!("field named '{}'", name)))
    }

    /// On-disk size of one tuple of this schema, in bytes.
    pub fn byte_size(&self) -> usize {
        self.items.iter().map(|item| item.field_type.byte_len()).sum()
    }

    /// Concatenation of two schemas, `left`'s columns first.
    pub fn merge(left: &TupleDesc, right: &TupleDesc) -> TupleDesc {
        let mut items = left.items.clone();
        items.extend(right.items.iter().cloned());
        TupleDesc { items }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TdItem> {
        self.items.iter()
    }
}

/// Schemas are equal when their column types match pairwise; names do not
/// participate.
impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for TupleDesc {}

impl std::fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}({})", item.field_type, item.name.as_deref().unwrap_or("?"))?;
        }
        Ok(())
    }
}

/// Physical location of a tuple: a page and a slot within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

/// A row: a schema, its field values, and (once stored) its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: TupleDesc,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Builds a tuple, checking that the fields match the schema.
    pub fn new(desc: TupleDesc, fields: Vec<Field>) -> DbResult<Self> {
        if fields.len() != desc.num_fields() {
            return Err(DbError::IllegalArgument(format!(
                "expected {} fields, got {}",
                desc.num_fields(),
                fields.len()
            )));
        }
        for (i, field) in fields.iter().enumerate() {
            if field.type_of() != desc.field_type(i)? {
                return Err(DbError::IllegalArgument(format!(
                    "field {} has type {}, schema says {}",
                    i,
                    field.type_of(),
                    desc.field_type(i)?
                )));
            }
        }
        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }

    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn field(&self, i: usize) -> DbResult<&Field> {
        self.fields
            .get(i)
            .ok_or_else(|| DbError::NoSuchElement(format!("field index {}", i)))
    }

    pub fn set_field(&mut self, i: usize, field: Field) -> DbResult<()> {
        if field.type_of() != self.desc.field_type(i)? {
            return Err(DbError::IllegalArgument(format!(
                "field {} has type {}, schema says {}",
                i,
                field.type_of(),
                self.desc.field_type(i)?
            )));
        }
        self.fields[i] = field;
        Ok(())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    /// Encodes all fields into `buf` (exactly `desc.byte_size()` bytes).
    pub fn write_to(&self, buf: &mut [u8]) {
        let mut offset = 0;
        for field in &self.fields {
            let len = field.type_of().byte_len();
            field.write_to(&mut buf[offset..offset + len]);
            offset += len;
        }
    }

    /// Decodes a tuple of schema `desc` from `buf`.
    pub fn read_from(desc: &TupleDesc, buf: &[u8]) -> DbResult<Tuple> {
        let mut fields = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for i in 0..desc.num_fields() {
            let ty = desc.field_type(i)?;
            let len = ty.byte_len();
            fields.push(Field::read_from(ty, &buf[offset..offset + len])?);
            offset += len;
        }
        Tuple::new(desc.clone(), fields)
    }
}

impl std::fmt::Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_int_desc() -> TupleDesc {
        TupleDesc::of_types(vec![Type::Int, Type::Int])
    }

    #[test]
    fn test_byte_size() {
        assert_eq!(two_int_desc().byte_size(), 8);
        let mixed = TupleDesc::of_types(vec![Type::Int, Type::Str]);
        assert_eq!(mixed.byte_size(), 4 + 132);
    }

    #[test]
    fn test_desc_equality_ignores_names() {
        let named = TupleDesc::new(
            vec![Type::Int, Type::Int],
            vec![Some("a".into()), Some("b".into())],
        );
        assert_eq!(named, two_int_desc());
        assert_ne!(two_int_desc(), TupleDesc::of_types(vec![Type::Int]));
    }

    #[test]
    fn test_field_name_lookup() {
        let desc = TupleDesc::new(
            vec![Type::Int, Type::Str],
            vec![Some("id".into()), Some("name".into())],
        );
        assert_eq!(desc.field_name_to_index("name").unwrap(), 1);
        assert!(matches!(
            desc.field_name_to_index("missing"),
            Err(DbError::NoSuchElement(_))
        ));
    }

    #[test]
    fn test_merge() {
        let merged = TupleDesc::merge(
            &two_int_desc(),
            &TupleDesc::of_types(vec![Type::Str]),
        );
        assert_eq!(merged.num_fields(), 3);
        assert_eq!(merged.field_type(2).unwrap(), Type::Str);
    }

    #[test]
    fn test_tuple_arity_checked() {
        let result = Tuple::new(two_int_desc(), vec![Field::Int(1)]);
        assert!(matches!(result, Err(DbError::IllegalArgument(_))));

        let result = Tuple::new(
            two_int_desc(),
            vec![Field::Int(1), Field::Str("x".into())],
        );
        assert!(matches!(result, Err(DbError::IllegalArgument(_))));
    }

    #[test]
    fn test_tuple_encode_decode() {
        let desc = TupleDesc::of_types(vec![Type::Int, Type::Str]);
        let tuple = Tuple::new(
            desc.clone(),
            vec![Field::Int(-42), Field::Str("hello".into())],
        )
        .unwrap();

        let mut buf = vec![0u8; desc.byte_size()];
        tuple.write_to(&mut buf);

        let decoded = Tuple::read_from(&desc, &buf).unwrap();
        assert_eq!(decoded.field(0).unwrap(), &Field::Int(-42));
        assert_eq!(decoded.field(1).unwrap(), &Field::Str("hello".into()));
    }

    #[test]
    fn test_cross_type_compare_rejected() {
        let err = Field::Int(1).compare(&Field::Str("1".into()));
        assert!(matches!(err, Err(DbError::IllegalArgument(_))));
    }

    #[test]
    fn test_field_ordering() {
        use std::cmp::Ordering;
        assert_eq!(
            Field::Int(1).compare(&Field::Int(2)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Field::Str("b".into()).compare(&Field::Str("a".into())).unwrap(),
            Ordering::Greater
        );
    }
}
