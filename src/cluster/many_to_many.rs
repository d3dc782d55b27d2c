//! Many-to-many deferred relation manager
//!
//! Children may be shared with other parents, so commit only ever touches the
//! association table for removals. Staged children are saved (they may be new)
//! and then linked to the parent.

use super::error::ClusterError;
use super::holding::StagedList;
use super::identity::ChildRef;
use super::reconcile::reconcile;
use super::relation::{row_keys, save_child, ClusterableModel, RelationManager, Staging};
use super::result::RelationResult;
use crate::model::ModelTrait;
use crate::store::{RelationStore, ThroughTable};
use sea_query::Value;
use std::marker::PhantomData;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "metrics")]
use std::time::Instant;

/// Many-to-many relation descriptor
///
/// ```rust,ignore
/// const ALBUM_TAGS: ThroughTable = ThroughTable::new("album_tags", "album_id", "tag_id");
/// static TAGS: ManyToMany<Album, Tag> = ManyToMany::new("tags", ALBUM_TAGS);
///
/// TAGS.of(&mut album, &store).add([rock, pop])?;
/// ```
pub struct ManyToMany<P, C> {
    name: &'static str,
    through: ThroughTable,
    _marker: PhantomData<fn(&P) -> C>,
}

impl<P, C> ManyToMany<P, C> {
    pub const fn new(name: &'static str, through: ThroughTable) -> Self {
        Self {
            name,
            through,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn through(&self) -> &ThroughTable {
        &self.through
    }
}

impl<P: ClusterableModel, C: ModelTrait> ManyToMany<P, C> {
    /// Manager for this relation on `parent`, reading and writing through `store`
    pub fn of<'a, S>(&'a self, parent: &'a mut P, store: &'a S) -> ManyToManyManager<'a, P, C, S>
    where
        S: RelationStore + ?Sized,
    {
        ManyToManyManager {
            relation: self,
            staging: Staging::new(self.name, parent, store),
        }
    }
}

/// Manager for one [`ManyToMany`] relation of one parent record
pub struct ManyToManyManager<'a, P, C, S: ?Sized> {
    relation: &'a ManyToMany<P, C>,
    staging: Staging<'a, P, S>,
}

impl<'a, P, C, S> ManyToManyManager<'a, P, C, S>
where
    P: ClusterableModel,
    C: ModelTrait,
    S: RelationStore + ?Sized,
{
    /// Primary keys of the current contents, for search indexing
    ///
    /// Reads staged state when present and live rows otherwise; unsaved
    /// children have no key and are skipped.
    pub fn searchable_content(&self) -> Result<Vec<Value>, ClusterError> {
        Ok(self.read()?.primary_keys())
    }
}

impl<'a, P, C, S> RelationManager<C> for ManyToManyManager<'a, P, C, S>
where
    P: ClusterableModel,
    C: ModelTrait,
    S: RelationStore + ?Sized,
{
    fn relation_name(&self) -> &'static str {
        self.relation.name()
    }

    fn read(&self) -> Result<RelationResult<C>, ClusterError> {
        let through = self.relation.through;
        self.staging
            .read(|store, parent_key| store.fetch_associated(C::meta(), &through, parent_key))
    }

    fn read_live(&self) -> Result<Vec<ChildRef<C>>, ClusterError> {
        let through = self.relation.through;
        self.staging
            .live(|store, parent_key| store.fetch_associated(C::meta(), &through, parent_key))
    }

    fn object_list(&mut self) -> Result<StagedList<C>, ClusterError> {
        let through = self.relation.through;
        self.staging
            .materialize(|store, parent_key| store.fetch_associated(C::meta(), &through, parent_key))
    }

    fn add<I>(&mut self, items: I) -> Result<(), ClusterError>
    where
        I: IntoIterator,
        I::Item: Into<ChildRef<C>>,
    {
        let list = self.object_list()?;
        self.staging.add(&list, items, None)
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
        self.staging.create(&list, fields, None)
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
        let _span = tracing_helpers::commit_relation_span(name, "many_to_many").entered();
        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let store = self.staging.store;
        let meta = C::meta();
        let through = self.relation.through;

        let live = store.fetch_associated(meta, &through, &parent_key)?;
        let staged = list.items();
        let outcome = reconcile(
            name,
            row_keys(meta, &live),
            &staged,
            |key| {
                store.disassociate(&through, &parent_key, key)?;
                Ok(())
            },
            |item| {
                let key = save_child(store, item)?;
                store.associate(&through, &parent_key, &key)?;
                Ok(())
            },
        )?;

        self.staging.finish_commit();
        log::info!(
            "committed relation {}: {} unlinked, {} saved and linked",
            name,
            outcome.removed,
            outcome.saved
        );
        #[cfg(feature = "metrics")]
        METRICS.record_relation_commit(name, start.elapsed());
        Ok(())
    }
}
