//! Deferred-write clustered relations
//!
//! A parent record and its child records (one-to-many and many-to-many) can be
//! changed in memory, then written in one explicit commit:
//!
//! 1. Accessing a relation (`MEMBERS.of(&mut band, &store)`) returns a manager.
//! 2. `add`, `remove`, `create` and `clear` write into the parent's
//!    [`HoldingArea`]; `read()` then returns a [`FakeResultSet`] over the staged
//!    list instead of querying the database.
//! 3. `commit()` diffs the staged list against the live rows, removes what is
//!    gone, saves what is staged, and drops the staged list so reads go live
//!    again.
//!
//! [`ClusterSchema::save`] is the parent save hook: it saves the parent record
//! and commits every relation declared in the schema.

pub mod error;
pub mod has_many;
pub mod holding;
pub mod identity;
pub mod many_to_many;
pub mod ordering;
mod reconcile;
pub mod relation;
pub mod result;
pub mod schema;

pub use error::{ClusterError, ConfigurationIssue};
pub use has_many::HasManyManager;
pub use holding::{HoldingArea, StagedList};
pub use identity::{items_match, ChildRef};
pub use many_to_many::{ManyToMany, ManyToManyManager};
pub use ordering::sort_by_fields;
pub use relation::{ClusterableModel, HasMany, RelationManager};
pub use result::{FakeResultSet, RelationResult};
pub use schema::{ClusterSchema, ClusterSchemaBuilder, RelationInfo, RelationKind};
