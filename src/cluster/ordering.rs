//! Default-ordering sorts for staged lists and in-memory rows.

use super::identity::ChildRef;
use crate::model::{ModelTrait, OrderBy};
use crate::value::compare_values;
use sea_query::Value;
use std::cmp::Ordering;

/// Compare two records field by field.
///
/// A missing column sorts like NULL: last ascending, first descending, as
/// PostgreSQL orders the same rows.
pub(crate) fn compare_by_fields<L, R>(ordering: &[OrderBy], left: L, right: R) -> Ordering
where
    L: Fn(&str) -> Option<Value>,
    R: Fn(&str) -> Option<Value>,
{
    for field in ordering {
        let ord = match (left(field.column()), right(field.column())) {
            (Some(a), Some(b)) => compare_values(&a, &b),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
        };
        let ord = if field.is_descending() { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Stable sort of `items` by `ordering`; ties keep their relative order.
pub fn sort_by_fields<C: ModelTrait>(items: &mut [ChildRef<C>], ordering: &[OrderBy]) {
    items.sort_by(|a, b| {
        let a = a.borrow();
        let b = b.borrow();
        compare_by_fields(ordering, |c| a.get(c), |c| b.get(c))
    });
}
