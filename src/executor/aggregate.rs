//! Grouped aggregation over integer and string columns.

use std::collections::HashMap;

use crate::access::tuple::{Field, Tuple, TupleDesc, Type};
use crate::error::{DbError, DbResult};
use crate::executor::tuple_iterator::TupleIterator;

/// Aggregation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl std::fmt::Display for AggOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AggOp::Min => "min",
            AggOp::Max => "max",
            AggOp::Sum => "sum",
            AggOp::Avg => "avg",
            AggOp::Count => "count",
        };
        write!(f, "{}", name)
    }
}

/// Running totals for one group of integers.
#[derive(Debug, Clone, Copy, Default)]
struct IntGroup {
    count: i64,
    sum: i64,
    min: i32,
    max: i32,
}

impl IntGroup {
    fn merge(&mut self, value: i32) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value as i64;
    }

    fn result(&self, op: AggOp) -> i32 {
        match op {
            AggOp::Min => self.min,
            AggOp::Max => self.max,
            AggOp::Sum => self.sum as i32,
            // Integer average, as the result column is an int.
            AggOp::Avg => (self.sum / self.count) as i32,
            AggOp::Count => self.count as i32,
        }
    }
}

fn result_desc(group_by: Option<&(usize, Type)>) -> TupleDesc {
    match group_by {
        Some((_, group_type)) => TupleDesc::of_types(vec![*group_type, Type::Int]),
        None => TupleDesc::of_types(vec![Type::Int]),
    }
}

fn result_tuples(
    desc: &TupleDesc,
    grouped: bool,
    results: impl Iterator<Item = (Option<Field>, i32)>,
) -> DbResult<Vec<Tuple>> {
    results
        .map(|(group, value)| {
            let fields = match (grouped, group) {
                (true, Some(g)) => vec![g, Field::Int(value)],
                _ => vec![Field::Int(value)],
            };
            Tuple::new(desc.clone(), fields)
        })
        .collect()
}

/// Computes one aggregate over a stream of integer fields, optionally
/// grouped by another column.
pub struct IntegerAggregator {
    group_by: Option<(usize, Type)>,
    field: usize,
    op: AggOp,
    groups: HashMap<Option<Field>, IntGroup>,
}

impl IntegerAggregator {
    /// `group_by` is the group-by column index and type, or `None` for a
    /// single ungrouped aggregate. `field` is the aggregated column.
    pub fn new(group_by: Option<(usize, Type)>, field: usize, op: AggOp) -> Self {
        Self {
            group_by,
            field,
            op,
            groups: HashMap::new(),
        }
    }

    /// Folds one tuple into its group.
    pub fn merge(&mut self, tuple: &Tuple) -> DbResult<()> {
        let value = match tuple.field(self.field)? {
            Field::Int(v) => *v,
            other => {
                return Err(DbError::IllegalArgument(format!(
                    "integer aggregate over a {} field",
                    other.type_of()
                )))
            }
        };
        let key = match &self.group_by {
            Some((index, _)) => Some(tuple.field(*index)?.clone()),
            None => None,
        };
        self.groups.entry(key).or_default().merge(value);
        Ok(())
    }

    /// Result stream: `(group, aggregate)` pairs, or a single `(aggregate)`
    /// when ungrouped.
    pub fn iterator(&self) -> DbResult<TupleIterator> {
        let desc = result_desc(self.group_by.as_ref());
        let tuples = result_tuples(
            &desc,
            self.group_by.is_some(),
            self.groups
                .iter()
                .map(|(group, totals)| (group.clone(), totals.result(self.op))),
        )?;
        Ok(TupleIterator::new(desc, tuples))
    }
}

/// Counts string fields, optionally grouped. COUNT is the only aggregate
/// that makes sense over strings; any other op is rejected up front.
pub struct StringAggregator {
    group_by: Option<(usize, Type)>,
    field: usize,
    counts: HashMap<Option<Field>, i32>,
}

impl StringAggregator {
    pub fn new(group_by: Option<(usize, Type)>, field: usize, op: AggOp) -> DbResult<Self> {
        if op != AggOp::Count {
            return Err(DbError::IllegalArgument(format!(
                "string aggregator supports count only, got {}",
                op
            )));
        }
        Ok(Self {
            group_by,
            field,
            counts: HashMap::new(),
        })
    }

    pub fn merge(&mut self, tuple: &Tuple) -> DbResult<()> {
        match tuple.field(self.field)? {
            Field::Str(_) => {}
            other => {
                return Err(DbError::IllegalArgument(format!(
                    "string aggregate over a {} field",
                    other.type_of()
                )))
            }
        }
        let key = match &self.group_by {
            Some((index, _)) => Some(tuple.field(*index)?.clone()),
            None => None,
        };
        *self.counts.entry(key).or_insert(0) += 1;
        Ok(())
    }

    pub fn iterator(&self) -> DbResult<TupleIterator> {
        let desc = result_desc(self.group_by.as_ref());
        let tuples = result_tuples(
            &desc,
            self.group_by.is_some(),
            self.counts.iter().map(|(group, &count)| (group.clone(), count)),
        )?;
        Ok(TupleIterator::new(desc, tuples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::OpIterator;

    fn two_col(a: i32, b: i32) -> Tuple {
        Tuple::new(
            TupleDesc::of_types(vec![Type::Int, Type::Int]),
            vec![Field::Int(a), Field::Int(b)],
        )
        .unwrap()
    }

    fn str_tuple(group: i32, s: &str) -> Tuple {
        Tuple::new(
            TupleDesc::of_types(vec![Type::Int, Type::Str]),
            vec![Field::Int(group), Field::Str(s.into())],
        )
        .unwrap()
    }

    fn collect(it: &mut TupleIterator) -> Vec<Vec<Field>> {
        it.open().unwrap();
        let mut out = vec![];
        while it.has_next().unwrap() {
            out.push(it.next().unwrap().fields().to_vec());
        }
        out
    }

    #[test]
    fn test_ungrouped_ops() {
        let inputs = [3, 1, 4, 1, 5];
        for (op, expected) in [
            (AggOp::Min, 1),
            (AggOp::Max, 5),
            (AggOp::Sum, 14),
            (AggOp::Avg, 2),
            (AggOp::Count, 5),
        ] {
            let mut agg = IntegerAggregator::new(None, 1, op);
            for &v in &inputs {
                agg.merge(&two_col(0, v)).unwrap();
            }
            let rows = collect(&mut agg.iterator().unwrap());
            assert_eq!(rows, vec![vec![Field::Int(expected)]], "{}", op);
        }
    }

    #[test]
    fn test_grouped_sum() {
        let mut agg = IntegerAggregator::new(Some((0, Type::Int)), 1, AggOp::Sum);
        for (g, v) in [(1, 10), (2, 20), (1, 5), (2, 1)] {
            agg.merge(&two_col(g, v)).unwrap();
        }
        let mut rows = collect(&mut agg.iterator().unwrap());
        rows.sort_by(|a, b| format!("{:?}", a).cmp(&format!("{:?}", b)));
        assert_eq!(
            rows,
            vec![
                vec![Field::Int(1), Field::Int(15)],
                vec![Field::Int(2), Field::Int(21)],
            ]
        );
    }

    #[test]
    fn test_string_aggregator_counts() {
        let mut agg = StringAggregator::new(Some((0, Type::Int)), 1, AggOp::Count).unwrap();
        for (g, s) in [(1, "a"), (1, "b"), (2, "c")] {
            agg.merge(&str_tuple(g, s)).unwrap();
        }
        let mut rows = collect(&mut agg.iterator().unwrap());
        rows.sort_by(|a, b| format!("{:?}", a).cmp(&format!("{:?}", b)));
        assert_eq!(
            rows,
            vec![
                vec![Field::Int(1), Field::Int(2)],
                vec![Field::Int(2), Field::Int(1)],
            ]
        );
    }

    #[test]
    fn test_string_aggregator_rejects_non_count() {
        for op in [AggOp::Min, AggOp::Max, AggOp::Sum, AggOp::Avg] {
            assert!(matches!(
                StringAggregator::new(None, 0, op),
                Err(DbError::IllegalArgument(_))
            ));
        }
    }

    #[test]
    fn test_wrong_field_type_rejected() {
        let mut agg = IntegerAggregator::new(None, 1, AggOp::Count);
        assert!(matches!(
            agg.merge(&str_tuple(1, "x")),
            Err(DbError::IllegalArgument(_))
        ));
    }
}
