//! Relational select.

use crate::access::tuple::{Tuple, TupleDesc};
use crate::error::{DbError, DbResult};
use crate::executor::predicate::Predicate;
use crate::executor::OpIterator;

/// Passes through the child's tuples that satisfy the predicate.
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn OpIterator>,
    desc: TupleDesc,
    open: bool,
    /// Next passing tuple, pulled ahead by `has_next`.
    buffered: Option<Tuple>,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator>) -> Self {
        let desc = child.tuple_desc().clone();
        Self {
            predicate,
            child,
            desc,
            open: false,
            buffered: None,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl OpIterator for Filter {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        self.open = true;
        self.buffered = None;
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        if !self.open {
            return Ok(false);
        }
        if self.buffered.is_some() {
            return Ok(true);
        }
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.eval(&tuple)? {
                self.buffered = Some(tuple);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn next(&mut self) -> DbResult<Tuple> {
        if !self.open {
            return Err(DbError::NoSuchElement("filter is not open".into()));
        }
        if self.has_next()? {
            Ok(self.buffered.take().expect("buffered by has_next"))
        } else {
            Err(DbError::NoSuchElement("filter exhausted".into()))
        }
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.child.rewind()?;
        self.buffered = None;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.open = false;
        self.buffered = None;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tuple::{Field, Type};
    use crate::executor::predicate::CmpOp;
    use crate::executor::tuple_iterator::TupleIterator;

    fn ints(values: &[i32]) -> Box<dyn OpIterator> {
        let desc = TupleDesc::of_types(vec![Type::Int]);
        let tuples = values
            .iter()
            .map(|&v| Tuple::new(desc.clone(), vec![Field::Int(v)]).unwrap())
            .collect();
        Box::new(TupleIterator::new(desc, tuples))
    }

    fn drain(filter: &mut Filter) -> Vec<i32> {
        let mut out = vec![];
        while filter.has_next().unwrap() {
            out.push(match filter.next().unwrap().field(0).unwrap() {
                Field::Int(v) => *v,
                _ => unreachable!(),
            });
        }
        out
    }

    #[test]
    fn test_filters_by_predicate() {
        let predicate = Predicate::new(0, CmpOp::GreaterThan, Field::Int(2));
        let mut filter = Filter::new(predicate, ints(&[1, 2, 3, 4, 1, 5]));
        filter.open().unwrap();
        assert_eq!(drain(&mut filter), vec![3, 4, 5]);
    }

    #[test]
    fn test_rewind_restarts() {
        let predicate = Predicate::new(0, CmpOp::LessThan, Field::Int(3));
        let mut filter = Filter::new(predicate, ints(&[1, 2, 3]));
        filter.open().unwrap();
        assert_eq!(drain(&mut filter), vec![1, 2]);
        filter.rewind().unwrap();
        assert_eq!(drain(&mut filter), vec![1, 2]);
    }

    #[test]
    fn test_unopened_filter_yields_nothing() {
        let predicate = Predicate::new(0, CmpOp::Equals, Field::Int(1));
        let mut filter = Filter::new(predicate, ints(&[1]));
        assert!(!filter.has_next().unwrap());
        assert!(matches!(filter.next(), Err(DbError::NoSuchElement(_))));
    }
}
