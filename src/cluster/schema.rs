//! Explicit schema of a parent type's clustered relations
//!
//! `ClusterSchema` is built once per parent type. Building it runs the
//! configuration checks below and freezes the list of child relations that
//! `save` and `commit_all` walk, in declaration order.
//!
//! | id             | check                                                   |
//! |----------------|---------------------------------------------------------|
//! | `cluster.E001` | relation name declared twice on the parent type         |
//! | `cluster.E002` | foreign key is not a column of the child type           |
//! | `cluster.E003` | default-ordering column is not a column of the child type |
//! | `cluster.E004` | association table is malformed                          |
//! | `cluster.E005` | parent type declares no primary-key column              |

use super::error::{ClusterError, ConfigurationIssue};
use super::many_to_many::ManyToMany;
use super::relation::{ClusterableModel, HasMany, RelationManager};
use crate::config::CheckConfig;
use crate::model::{ModelMeta, ModelTrait};
use crate::store::{persist, RelationStore, ThroughTable};
use std::collections::HashSet;
use std::fmt;

/// Relation flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    HasMany,
    ManyToMany,
}

/// Discovery entry for one declared child relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationInfo {
    pub name: &'static str,
    pub kind: RelationKind,
    /// Table of the child type
    pub child_table: &'static str,
    /// Set for `HasMany` relations
    pub foreign_key: Option<&'static str>,
    /// Set for `ManyToMany` relations
    pub through: Option<ThroughTable>,
}

/// Type-erased relation, so one schema can hold relations to different child types
trait ErasedRelation<P> {
    fn info(&self) -> RelationInfo;
    fn child_meta(&self) -> &'static ModelMeta;
    fn commit(&self, parent: &mut P, store: &dyn RelationStore) -> Result<(), ClusterError>;
}

impl<P: ClusterableModel, C: ModelTrait> ErasedRelation<P> for HasMany<P, C> {
    fn info(&self) -> RelationInfo {
        RelationInfo {
            name: self.name(),
            kind: RelationKind::HasMany,
            child_table: C::meta().table,
            foreign_key: Some(self.foreign_key()),
            through: None,
        }
    }

    fn child_meta(&self) -> &'static ModelMeta {
        C::meta()
    }

    fn commit(&self, parent: &mut P, store: &dyn RelationStore) -> Result<(), ClusterError> {
        self.of(parent, store).commit()
    }
}

impl<P: ClusterableModel, C: ModelTrait> ErasedRelation<P> for ManyToMany<P, C> {
    fn info(&self) -> RelationInfo {
        RelationInfo {
            name: self.name(),
            kind: RelationKind::ManyToMany,
            child_table: C::meta().table,
            foreign_key: None,
            through: Some(*self.through()),
        }
    }

    fn child_meta(&self) -> &'static ModelMeta {
        C::meta()
    }

    fn commit(&self, parent: &mut P, store: &dyn RelationStore) -> Result<(), ClusterError> {
        self.of(parent, store).commit()
    }
}

/// Builder for [`ClusterSchema`]
pub struct ClusterSchemaBuilder<P: 'static> {
    relations: Vec<&'static (dyn ErasedRelation<P> + Sync)>,
}

impl<P: ClusterableModel> ClusterSchemaBuilder<P> {
    pub fn has_many<C: ModelTrait>(mut self, relation: &'static HasMany<P, C>) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn many_to_many<C: ModelTrait>(mut self, relation: &'static ManyToMany<P, C>) -> Self {
        self.relations.push(relation);
        self
    }

    /// Run every check; any failure is an error
    pub fn build(self) -> Result<ClusterSchema<P>, ClusterError> {
        self.build_with(&CheckConfig::default())
    }

    /// Run the checks, downgrading the ids silenced in `checks` to warnings
    pub fn build_with(self, checks: &CheckConfig) -> Result<ClusterSchema<P>, ClusterError> {
        let (reported, silenced): (Vec<_>, Vec<_>) = run_checks(P::meta(), &self.relations)
            .into_iter()
            .partition(|issue| !checks.is_silenced(issue.id));

        for issue in &silenced {
            log::warn!("{} (silenced)", issue);
        }
        if !reported.is_empty() {
            return Err(ClusterError::Configuration(reported));
        }

        let infos = self.relations.iter().map(|relation| relation.info()).collect();
        log::debug!(
            "cluster schema for {} built with {} relations",
            P::meta().table,
            self.relations.len()
        );
        Ok(ClusterSchema {
            relations: self.relations,
            infos,
        })
    }
}

fn issue(id: &'static str, message: String, hint: Option<String>) -> ConfigurationIssue {
    ConfigurationIssue { id, message, hint }
}

fn run_checks<P: 'static>(parent: &ModelMeta, relations: &[&'static (dyn ErasedRelation<P> + Sync)]) -> Vec<ConfigurationIssue> {
    let mut issues = Vec::new();

    if parent.primary_key.is_empty() || !parent.has_column(parent.primary_key) {
        issues.push(issue(
            "cluster.E005",
            format!("{} declares no primary-key column", parent.table),
            Some("relations can only be committed for records with a primary key".to_string()),
        ));
    }

    let mut seen = HashSet::new();
    for relation in relations {
        let info = relation.info();
        let child = relation.child_meta();

        if !seen.insert(info.name) {
            issues.push(issue(
                "cluster.E001",
                format!("relation {} is declared more than once on {}", info.name, parent.table),
                None,
            ));
        }

        if let Some(foreign_key) = info.foreign_key {
            if !child.has_column(foreign_key) {
                issues.push(issue(
                    "cluster.E002",
                    format!(
                        "relation {}: {} has no column {}",
                        info.name, child.table, foreign_key
                    ),
                    Some(format!("add {} to the columns of {}", foreign_key, child.table)),
                ));
            }
        }

        for field in child.ordering {
            if !child.has_column(field.column()) {
                issues.push(issue(
                    "cluster.E003",
                    format!(
                        "relation {}: ordering column {} is not a column of {}",
                        info.name,
                        field.column(),
                        child.table
                    ),
                    None,
                ));
            }
        }

        if let Some(through) = info.through {
            let empty = through.table.is_empty()
                || through.source_column.is_empty()
                || through.target_column.is_empty();
            if empty || through.source_column == through.target_column {
                issues.push(issue(
                    "cluster.E004",
                    format!(
                        "relation {}: association table {:?} is malformed",
                        info.name, through
                    ),
                    Some("name the table and two distinct key columns".to_string()),
                ));
            }
        }
    }

    issues
}

/// Frozen list of a parent type's clustered relations
///
/// ```rust,ignore
/// static SCHEMA: Lazy<ClusterSchema<Band>> = Lazy::new(|| {
///     ClusterSchema::builder()
///         .has_many(&MEMBERS)
///         .many_to_many(&GENRES)
///         .build()
///         .expect("band schema")
/// });
///
/// SCHEMA.save(&mut band, &store)?;
/// ```
pub struct ClusterSchema<P: 'static> {
    relations: Vec<&'static (dyn ErasedRelation<P> + Sync)>,
    infos: Vec<RelationInfo>,
}

impl<P: ClusterableModel> ClusterSchema<P> {
    pub fn builder() -> ClusterSchemaBuilder<P> {
        ClusterSchemaBuilder {
            relations: Vec::new(),
        }
    }

    /// Declared relations in declaration order
    pub fn child_relations(&self) -> &[RelationInfo] {
        &self.infos
    }

    pub fn relation(&self, name: &str) -> Option<&RelationInfo> {
        self.infos.iter().find(|info| info.name == name)
    }

    /// Commit every declared relation, in declaration order
    ///
    /// Stops at the first error; relations committed before it stay committed.
    pub fn commit_all(&self, parent: &mut P, store: &dyn RelationStore) -> Result<(), ClusterError> {
        for relation in &self.relations {
            relation.commit(parent, store)?;
        }
        Ok(())
    }

    /// Save the parent's own record, then commit every declared relation
    pub fn save(&self, parent: &mut P, store: &dyn RelationStore) -> Result<(), ClusterError> {
        let key = persist(store, P::meta(), &parent.to_values())?;
        if parent.primary_key().is_none() {
            parent.set_primary_key(key)?;
        }
        self.commit_all(parent, store)
    }
}

impl<P: 'static> fmt::Debug for ClusterSchema<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterSchema")
            .field("relations", &self.infos)
            .finish()
    }
}
