//! Relation declarations and the deferred relation manager capability
//!
//! A relation is declared once, as a `static` descriptor on the parent type:
//!
//! - [`HasMany`] for a one-to-many relation whose child rows carry a foreign key
//!   back to the parent
//! - [`ManyToMany`](super::ManyToMany) for a relation maintained through an
//!   association table
//!
//! Calling `of(&mut parent, &store)` on a descriptor yields a manager that
//! implements [`RelationManager`]. Mutations go to the parent's
//! [`HoldingArea`]; nothing reaches the store until `commit()`.

use super::error::ClusterError;
use super::holding::{HoldingArea, StagedList};
use super::identity::{items_match, ChildRef};
use super::ordering::sort_by_fields;
use super::result::{FakeResultSet, RelationResult};
use crate::executor::LifeError;
use crate::model::{ModelMeta, ModelTrait};
use crate::store::{persist, RelationStore};
use crate::value::ValueMap;
use sea_query::Value;
use std::marker::PhantomData;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// A record type that can own staged relations
///
/// Implementors embed a [`HoldingArea`] field, initialized empty:
///
/// ```rust
/// use lifeguard_cluster::cluster::{ClusterableModel, HoldingArea};
/// # use lifeguard_cluster::model::{ModelError, ModelMeta, ModelTrait};
/// # use sea_query::Value;
/// # static BAND: ModelMeta = ModelMeta { table: "bands", primary_key: "id", columns: &["id"], ordering: &[] };
///
/// #[derive(Debug, Clone, Default)]
/// struct Band {
///     id: Option<i64>,
///     staged: HoldingArea,
/// }
/// # impl ModelTrait for Band {
/// #     fn meta() -> &'static ModelMeta { &BAND }
/// #     fn get(&self, column: &str) -> Option<Value> { (column == "id").then(|| Value::BigInt(self.id)) }
/// #     fn set(&mut self, column: &str, value: Value) -> Result<(), ModelError> {
/// #         lifeguard_cluster::model::set_field(&mut self.id, column, value)
/// #     }
/// # }
///
/// impl ClusterableModel for Band {
///     fn holding_area(&self) -> &HoldingArea {
///         &self.staged
///     }
///
///     fn holding_area_mut(&mut self) -> &mut HoldingArea {
///         &mut self.staged
///     }
/// }
/// ```
pub trait ClusterableModel: ModelTrait {
    fn holding_area(&self) -> &HoldingArea;
    fn holding_area_mut(&mut self) -> &mut HoldingArea;
}

/// Deferred relation manager capability shared by both relation flavors
///
/// Everything except `read_live`, `commit` and the first materialization of the
/// staged list is pure in-memory work.
pub trait RelationManager<C: ModelTrait> {
    /// Name of the relation on the parent type
    fn relation_name(&self) -> &'static str;

    /// The staged list if one exists, otherwise the live rows
    fn read(&self) -> Result<RelationResult<C>, ClusterError>;

    /// The live rows, ignoring any staged state
    ///
    /// An unsaved parent has no live rows.
    fn read_live(&self) -> Result<Vec<ChildRef<C>>, ClusterError>;

    /// The staged list, created from the live rows if absent
    fn object_list(&mut self) -> Result<StagedList<C>, ClusterError>;

    /// Stage `items`, replacing entries with the same identity in place
    fn add<I>(&mut self, items: I) -> Result<(), ClusterError>
    where
        I: IntoIterator,
        I::Item: Into<ChildRef<C>>;

    /// Drop every staged entry matching one of `items`
    fn remove<I>(&mut self, items: I) -> Result<(), ClusterError>
    where
        I: IntoIterator,
        I::Item: Into<ChildRef<C>>;

    /// Build an unsaved child from column values and append it to the staged list
    fn create<I, K>(&mut self, fields: I) -> Result<ChildRef<C>, ClusterError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>;

    /// Stage an empty list; the database is untouched
    fn clear(&mut self);

    /// Replace the staged list with `items`
    fn set<I>(&mut self, items: I) -> Result<(), ClusterError>
    where
        I: IntoIterator,
        I::Item: Into<ChildRef<C>>,
    {
        self.clear();
        self.add(items)
    }

    fn is_staged(&self) -> bool;

    /// Reconcile the staged list with the database and drop it
    ///
    /// A no-op when nothing is staged. Fails with `ClusterError::Integrity`
    /// before any storage call if the parent has no primary key. Not atomic:
    /// run it against a store built over a transaction for all-or-nothing
    /// behaviour.
    fn commit(&mut self) -> Result<(), ClusterError>;
}

/// One-to-many relation descriptor
///
/// ```rust
/// use lifeguard_cluster::cluster::HasMany;
/// # use lifeguard_cluster::cluster::{ClusterableModel, HoldingArea};
/// # use lifeguard_cluster::model::{ModelError, ModelMeta, ModelTrait};
/// # use sea_query::Value;
/// # static META: ModelMeta = ModelMeta { table: "t", primary_key: "id", columns: &["id"], ordering: &[] };
/// # #[derive(Debug, Clone, Default)] struct Band { staged: HoldingArea }
/// # impl ModelTrait for Band {
/// #     fn meta() -> &'static ModelMeta { &META }
/// #     fn get(&self, _: &str) -> Option<Value> { None }
/// #     fn set(&mut self, c: &str, _: Value) -> Result<(), ModelError> { Err(ModelError::ColumnNotFound(c.to_string())) }
/// # }
/// # impl ClusterableModel for Band {
/// #     fn holding_area(&self) -> &HoldingArea { &self.staged }
/// #     fn holding_area_mut(&mut self) -> &mut HoldingArea { &mut self.staged }
/// # }
/// # #[derive(Debug, Clone, Default)] struct BandMember;
/// # impl ModelTrait for BandMember {
/// #     fn meta() -> &'static ModelMeta { &META }
/// #     fn get(&self, _: &str) -> Option<Value> { None }
/// #     fn set(&mut self, c: &str, _: Value) -> Result<(), ModelError> { Err(ModelError::ColumnNotFound(c.to_string())) }
/// # }
///
/// static MEMBERS: HasMany<Band, BandMember> = HasMany::new("members", "band_id");
/// assert_eq!(MEMBERS.name(), "members");
/// ```
pub struct HasMany<P, C> {
    name: &'static str,
    foreign_key: &'static str,
    _marker: PhantomData<fn(&P) -> C>,
}

impl<P, C> HasMany<P, C> {
    pub const fn new(name: &'static str, foreign_key: &'static str) -> Self {
        Self {
            name,
            foreign_key,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Column of the child type referencing the parent's primary key
    pub fn foreign_key(&self) -> &'static str {
        self.foreign_key
    }
}

impl<P: ClusterableModel, C: ModelTrait> HasMany<P, C> {
    /// Manager for this relation on `parent`, reading and writing through `store`
    pub fn of<'a, S>(&'a self, parent: &'a mut P, store: &'a S) -> super::HasManyManager<'a, P, C, S>
    where
        S: RelationStore + ?Sized,
    {
        super::HasManyManager::new(self, Staging::new(self.name, parent, store))
    }
}

/// Parent, store and relation name shared by both manager flavors
pub(crate) struct Staging<'a, P, S: ?Sized> {
    pub(crate) name: &'static str,
    pub(crate) parent: &'a mut P,
    pub(crate) store: &'a S,
}

impl<'a, P, S> Staging<'a, P, S>
where
    P: ClusterableModel,
    S: RelationStore + ?Sized,
{
    pub(crate) fn new(name: &'static str, parent: &'a mut P, store: &'a S) -> Self {
        Self {
            name,
            parent,
            store,
        }
    }

    pub(crate) fn is_staged(&self) -> bool {
        self.parent.holding_area().has_staged(self.name)
    }

    /// Live rows fetched with `load`; empty without a parent key
    pub(crate) fn live<C, F>(&self, load: F) -> Result<Vec<ChildRef<C>>, ClusterError>
    where
        C: ModelTrait,
        F: FnOnce(&'a S, &Value) -> Result<Vec<ValueMap>, LifeError>,
    {
        match self.parent.primary_key() {
            Some(parent_key) => rows_to_children(load(self.store, &parent_key)?),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn read<C, F>(&self, load: F) -> Result<RelationResult<C>, ClusterError>
    where
        C: ModelTrait,
        F: FnOnce(&'a S, &Value) -> Result<Vec<ValueMap>, LifeError>,
    {
        match self.parent.holding_area().staged::<C>(self.name) {
            Some(list) => Ok(RelationResult::Staged(FakeResultSet::new(list))),
            None => Ok(RelationResult::Live(self.live(load)?)),
        }
    }

    pub(crate) fn materialize<C, F>(&mut self, load: F) -> Result<StagedList<C>, ClusterError>
    where
        C: ModelTrait,
        F: FnOnce(&'a S, &Value) -> Result<Vec<ValueMap>, LifeError>,
    {
        let parent_key = self.parent.primary_key();
        let store = self.store;
        self.parent
            .holding_area_mut()
            .get_or_create_list(self.name, || match parent_key {
                Some(key) => rows_to_children(load(store, &key)?),
                None => Ok(Vec::new()),
            })
    }

    /// Match-and-replace or append each target, then apply the default ordering.
    ///
    /// With `back_reference`, each target's column is set to the given value
    /// first; if any target rejects it the list is left untouched.
    pub(crate) fn add<C, I>(
        &mut self,
        list: &StagedList<C>,
        items: I,
        back_reference: Option<(&'static str, Value)>,
    ) -> Result<(), ClusterError>
    where
        C: ModelTrait,
        I: IntoIterator,
        I::Item: Into<ChildRef<C>>,
    {
        let targets: Vec<ChildRef<C>> = items.into_iter().map(Into::into).collect();
        // every back-reference is written before the list changes, so a
        // rejected value leaves the staged list as it was
        if let Some((column, key)) = &back_reference {
            for target in &targets {
                target.borrow_mut().set(column, key.clone())?;
            }
        }

        {
            let mut entries = list.entries_mut();
            for target in targets {
                match entries.iter().position(|item| items_match(item, &target)) {
                    Some(index) => entries[index] = target,
                    None => entries.push(target),
                }
            }
        }

        let ordering = C::meta().ordering;
        if !ordering.is_empty() && list.len() > 1 {
            sort_by_fields(&mut list.entries_mut(), ordering);
        }
        self.record_mutation("add");
        Ok(())
    }

    pub(crate) fn remove<C, I>(&mut self, list: &StagedList<C>, items: I)
    where
        C: ModelTrait,
        I: IntoIterator,
        I::Item: Into<ChildRef<C>>,
    {
        let mut entries = list.entries_mut();
        for target in items.into_iter().map(Into::into) {
            entries.retain(|item| !items_match(item, &target));
        }
        drop(entries);
        self.record_mutation("remove");
    }

    pub(crate) fn create<C, I, K>(
        &mut self,
        list: &StagedList<C>,
        fields: I,
        back_reference: Option<(&'static str, Value)>,
    ) -> Result<ChildRef<C>, ClusterError>
    where
        C: ModelTrait,
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut child = C::default();
        for (column, value) in fields {
            child.set(column.as_ref(), value)?;
        }
        if let Some((column, key)) = back_reference {
            child.set(column, key)?;
        }
        let handle = ChildRef::new(child);
        list.entries_mut().push(handle.clone());
        self.record_mutation("create");
        Ok(handle)
    }

    pub(crate) fn clear<C: ModelTrait>(&mut self) {
        self.parent
            .holding_area_mut()
            .set_list::<C>(self.name, Vec::new());
        log::debug!("cleared staged relation {}", self.name);
        self.record_mutation("clear");
    }

    /// Parent key and staged list for a commit, `None` when nothing is staged
    ///
    /// # Errors
    ///
    /// `ClusterError::Integrity` when the parent has no primary key.
    pub(crate) fn pending<C: ModelTrait>(&self) -> Result<Option<(Value, StagedList<C>)>, ClusterError> {
        let parent_key = self.parent.primary_key().ok_or_else(|| ClusterError::Integrity {
            relation: self.name.to_string(),
            message: format!(
                "cannot commit relation {} on an unsaved {} record",
                self.name,
                P::meta().table
            ),
        })?;
        Ok(self
            .parent
            .holding_area()
            .staged::<C>(self.name)
            .map(|list| (parent_key, list)))
    }

    pub(crate) fn finish_commit(&mut self) {
        self.parent.holding_area_mut().remove_staged(self.name);
    }

    fn record_mutation(&self, operation: &'static str) {
        #[cfg(feature = "metrics")]
        METRICS.record_staged_mutation(self.name, operation);
        #[cfg(not(feature = "metrics"))]
        let _ = operation;
    }
}

/// Build child records from fetched rows
pub(crate) fn rows_to_children<C: ModelTrait>(
    rows: Vec<ValueMap>,
) -> Result<Vec<ChildRef<C>>, ClusterError> {
    rows.iter()
        .map(|row| C::from_values(row).map(ChildRef::new).map_err(ClusterError::from))
        .collect()
}

/// Primary keys of fetched rows
pub(crate) fn row_keys(meta: &ModelMeta, rows: &[ValueMap]) -> Vec<Value> {
    rows.iter()
        .filter_map(|row| row.get(meta.primary_key).cloned())
        .collect()
}

/// Save a staged child and write a generated key back to it
pub(crate) fn save_child<C, S>(store: &S, item: &ChildRef<C>) -> Result<Value, ClusterError>
where
    C: ModelTrait,
    S: RelationStore + ?Sized,
{
    let values = item.borrow().to_values();
    let key = persist(store, C::meta(), &values)?;
    if item.primary_key().is_none() {
        item.borrow_mut().set_primary_key(key.clone())?;
    }
    Ok(key)
}
