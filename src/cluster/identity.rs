//! Child handles and the staging identity rule
//!
//! Staged children are held through [`ChildRef`], a shared handle. Two handles
//! that point at the same allocation are the same in-memory object; that is the
//! first half of the identity rule in [`items_match`]. The second half compares
//! non-null primary keys, so an unsaved record never collides with another
//! unsaved record.

use crate::model::ModelTrait;
use crate::value::values_equal;
use sea_query::Value;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Shared handle to a child record held in a staged list
///
/// Cloning the handle does not clone the record. Mutating through any clone is
/// visible to every other clone and to the staged list holding it.
pub struct ChildRef<C>(Rc<RefCell<C>>);

impl<C> ChildRef<C> {
    pub fn new(child: C) -> Self {
        Self(Rc::new(RefCell::new(child)))
    }

    /// Immutably borrow the record.
    ///
    /// # Panics
    ///
    /// Panics if the record is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, C> {
        self.0.borrow()
    }

    /// Mutably borrow the record.
    ///
    /// # Panics
    ///
    /// Panics if the record is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, C> {
        self.0.borrow_mut()
    }

    /// Whether both handles point at the same in-memory record
    pub fn same(&self, other: &ChildRef<C>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<C: Clone> ChildRef<C> {
    /// Copy of the record as it is now
    pub fn snapshot(&self) -> C {
        self.0.borrow().clone()
    }
}

impl<C: ModelTrait> ChildRef<C> {
    pub fn primary_key(&self) -> Option<Value> {
        self.0.borrow().primary_key()
    }

    pub fn get(&self, column: &str) -> Option<Value> {
        self.0.borrow().get(column)
    }
}

impl<C> Clone for ChildRef<C> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<C> From<C> for ChildRef<C> {
    fn from(child: C) -> Self {
        Self::new(child)
    }
}

impl<C: fmt::Debug> fmt::Debug for ChildRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(child) => f.debug_tuple("ChildRef").field(&*child).finish(),
            Err(_) => f.write_str("ChildRef(<borrowed>)"),
        }
    }
}

/// Staging identity: the same in-memory record, or equal non-null primary keys
pub fn items_match<C: ModelTrait>(item: &ChildRef<C>, target: &ChildRef<C>) -> bool {
    if item.same(target) {
        return true;
    }
    match (item.primary_key(), target.primary_key()) {
        (Some(a), Some(b)) => values_equal(&a, &b),
        _ => false,
    }
}
