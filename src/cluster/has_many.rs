//! One-to-many deferred relation manager
//!
//! Children are owned exclusively by their parent: a child dropped from the
//! staged list is deleted from the database on commit.

use super::error::ClusterError;
use super::holding::StagedList;
use super::identity::ChildRef;
use super::reconcile::reconcile;
use super::relation::{row_keys, save_child, ClusterableModel, HasMany, RelationManager, Staging};
use super::result::RelationResult;
use crate::model::ModelTrait;
use crate::store::RelationStore;
use sea_query::Value;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "metrics")]
use std::time::Instant;

/// Manager for one [`HasMany`] relation of one parent record
///
/// # Example
///
/// ```rust,ignore
/// static MEMBERS: HasMany<Band, BandMember> = HasMany::new("members", "band_id");
///
/// let store = MemoryStore::new();
/// let mut band = Band::saved(1, "The Beatles");
///
/// let mut members = MEMBERS.of(&mut band, &store);
/// members.add([BandMember::named("John"), BandMember::named("Paul")])?;
/// assert_eq!(members.read()?.len(), 2);   // staged, nothing written yet
/// members.commit()?;                       // inserts both members
/// ```
pub struct HasManyManager<'a, P, C, S: ?Sized> {
    relation: &'a HasMany<P, C>,
    staging: Staging<'a, P, S>,
}

impl<'a, P, C, S> HasManyManager<'a, P, C, S>
where
    P: ClusterableModel,
    C: ModelTrait,
    S: RelationStore + ?Sized,
{
    pub(crate) fn new(relation: &'a HasMany<P, C>, staging: Staging<'a, P, S>) -> Self {
        Self { relation, staging }
    }

    /// Value written into each child's foreign key: the parent key, once it has one
    fn back_reference(&self) -> Option<(&'static str, Value)> {
        self.staging
            .parent
            .primary_key()
            .map(|key| (self.relation.foreign_key(), key))
    }
}

impl<'a, P, C, S> RelationManager<C> for HasManyManager<'a, P, C, S>
where
    P: ClusterableModel,
    C: ModelTrait,
    S: RelationStore + ?Sized,
{
    fn relation_name(&self) -> &'static str {
        self.relation.name()
    }

    fn read(&self) -> Result<RelationResult<C>, ClusterError> {
        let foreign_key = self.relation.foreign_key();
        self.staging
            .read(|store, parent_key| store.fetch_children(C::meta(), foreign_key, parent_key))
    }

    fn read_live(&self) -> Result<Vec<ChildRef<C>>, ClusterError> {
        let foreign_key = self.relation.foreign_key();
        self.staging
            .live(|store, parent_key| store.fetch_children(C::meta(), foreign_key, parent_key))
    }

    fn object_list(&mut self) -> Result<StagedList<C>, ClusterError> {
        let foreign_key = self.relation.foreign_key();
        self.staging
            .materialize(|store, parent_key| store.fetch_children(C::meta(), foreign_key, parent_key))
    }

    fn add<I>(&mut self, items: I) -> Result<(), ClusterError>
    where
        I: IntoIterator,
        I::Item: Into<ChildRef<C>>,
    {
        let list = self.object_list()?;
        let back_reference = self.back_reference();
        self.staging.add(&list, items, back_reference)
    }

    fn remove<I>(&mut self, items: I) -> Result<(), ClusterError>
    where
        I: IntoIterator,
        I::Item: Into<ChildRef<C>>,
    {
        let list = self.object_list()?;
        self.staging.remove(&list, items);
        Ok(())
    }

    fn create<I, K>(&mut self, fields: I) -> Result<ChildRef<C>, ClusterError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let list = self.object_list()?;
        let back_reference = self.back_reference();
        self.staging.create(&list, fields, back_reference)
    }

    fn clear(&mut self) {
        self.staging.clear::<C>();
    }

    fn is_staged(&self) -> bool {
        self.staging.is_staged()
    }

    fn commit(&mut self) -> Result<(), ClusterError> {
        let name = self.relation.name();
        let Some((parent_key, list)) = self.staging.pending::<C>()? else {
            log::debug!("relation {} has nothing staged, commit skipped", name);
            return Ok(());
        };

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::commit_relation_span(name, "has_many").entered();
        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let store = self.staging.store;
        let meta = C::meta();
        let foreign_key = self.relation.foreign_key();

        let live = store.fetch_children(meta, foreign_key, &parent_key)?;
        let staged = list.items();
        let outcome = reconcile(
            name,
            row_keys(meta, &live),
            &staged,
            |key| {
                store.delete(meta, key)?;
                Ok(())
            },
            |item| {
                item.borrow_mut().set(foreign_key, parent_key.clone())?;
                save_child(store, item)?;
                Ok(())
            },
        )?;

        self.staging.finish_commit();
        log::info!(
            "committed relation {}: {} deleted, {} saved",
            name,
            outcome.removed,
            outcome.saved
        );
        #[cfg(feature = "metrics")]
        METRICS.record_relation_commit(name, start.elapsed());
        Ok(())
    }
}
