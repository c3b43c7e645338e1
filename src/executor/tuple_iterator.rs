//! In-memory operator over a fixed list of tuples.

use crate::access::tuple::{Tuple, TupleDesc};
use crate::error::{DbError, DbResult};
use crate::executor::OpIterator;

pub struct TupleIterator {
    desc: TupleDesc,
    tuples: Vec<Tuple>,
    /// Position of the next tuple; `None` while unopened or closed.
    cursor: Option<usize>,
}

impl TupleIterator {
    pub fn new(desc: TupleDesc, tuples: Vec<Tuple>) -> Self {
        Self {
            desc,
            tuples,
            cursor: None,
        }
    }
}

impl OpIterator for TupleIterator {
    fn open(&mut self) -> DbResult<()> {
        self.cursor = Some(0);
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        Ok(self.cursor.is_some_and(|c| c < self.tuples.len()))
    }

    fn next(&mut self) -> DbResult<Tuple> {
        match self.cursor {
            Some(c) if c < self.tuples.len() => {
                self.cursor = Some(c + 1);
                Ok(self.tuples[c].clone())
            }
            Some(_) => Err(DbError::NoSuchElement("iterator exhausted".into())),
            None => Err(DbError::NoSuchElement("iterator is not open".into())),
        }
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.cursor = Some(0);
        Ok(())
    }

    fn close(&mut self) {
        self.cursor = None;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tuple::{Field, Type};

    fn make(values: &[i32]) -> TupleIterator {
        let desc = TupleDesc::of_types(vec![Type::Int]);
        let tuples = values
            .iter()
            .map(|&v| Tuple::new(desc.clone(), vec![Field::Int(v)]).unwrap())
            .collect();
        TupleIterator::new(desc, tuples)
    }

    #[test]
    fn test_cursor_contract() {
        let mut it = make(&[1, 2, 3]);
        assert!(!it.has_next().unwrap());
        assert!(it.next().is_err());

        it.open().unwrap();
        let mut seen = vec![];
        while it.has_next().unwrap() {
            seen.push(match it.next().unwrap().field(0).unwrap() {
                Field::Int(v) => *v,
                _ => unreachable!(),
            });
        }
        assert_eq!(seen, vec![1, 2, 3]);

        it.rewind().unwrap();
        assert!(it.has_next().unwrap());

        it.close();
        assert!(it.next().is_err());
        it.close();
    }
}
