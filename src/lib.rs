//! # Lifeguard Cluster
//!
//! Deferred-write clustered relations for the Lifeguard PostgreSQL stack
//! (`may_postgres` + SeaQuery).
//!
//! A parent record and its one-to-many and many-to-many children are mutated in
//! memory and persisted in one explicit commit, so an object tree behaves like a
//! single aggregate while staying backed by relational tables. See [`cluster`]
//! for the staging model and [`store`] for the storage seam.
//!
//! See [README on GitHub](https://github.com/microscaler/lifeguard) for the wider Lifeguard architecture.

pub mod cluster;
pub mod config;
pub mod connection;
pub mod executor;
pub mod metrics;
pub mod model;
pub mod store;
pub mod transaction;
pub mod value;

pub use cluster::{
    ChildRef, ClusterError, ClusterSchema, ClusterableModel, FakeResultSet, HasMany,
    HoldingArea, ManyToMany, RelationManager, RelationResult,
};
pub use config::{CheckConfig, ClusterConfig, DatabaseConfig};
pub use connection::{connect, connect_with_config, ConnectionError};
pub use executor::{LifeError, LifeExecutor, MayPostgresExecutor};
pub use model::{set_field, ModelError, ModelMeta, ModelTrait, OrderBy};
pub use store::{persist, MemoryStore, RelationStore, SqlStore, ThroughTable};
pub use transaction::{IsolationLevel, Transaction, TransactionError};
pub use value::ValueMap;
