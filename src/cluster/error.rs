//! Error types for clustered relations.

use crate::executor::LifeError;
use crate::model::ModelError;
use crate::transaction::TransactionError;
use std::fmt;

/// One failed schema check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationIssue {
    /// Stable check id, e.g. `cluster.E002`
    pub id: &'static str,
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for ConfigurationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (HINT: {})", hint)?;
        }
        Ok(())
    }
}

/// Error type for relation staging and commits
#[derive(Debug)]
pub enum ClusterError {
    /// Schema checks failed while building a `ClusterSchema`
    Configuration(Vec<ConfigurationIssue>),
    /// Commit attempted on a parent without a persisted primary key
    Integrity { relation: String, message: String },
    /// Error from the storage layer, unmodified
    Storage(LifeError),
    /// A record rejected a value
    Model(ModelError),
}

impl ClusterError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, ClusterError::Integrity { .. })
    }
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterError::Configuration(issues) => {
                write!(f, "Invalid cluster configuration:")?;
                for issue in issues {
                    write!(f, " [{}]", issue)?;
                }
                Ok(())
            }
            ClusterError::Integrity { relation, message } => {
                write!(f, "Integrity error on relation {}: {}", relation, message)
            }
            ClusterError::Storage(e) => write!(f, "Storage error: {}", e),
            ClusterError::Model(e) => write!(f, "Model error: {}", e),
        }
    }
}

impl std::error::Error for ClusterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClusterError::Storage(e) => Some(e),
            ClusterError::Model(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LifeError> for ClusterError {
    fn from(err: LifeError) -> Self {
        ClusterError::Storage(err)
    }
}

impl From<ModelError> for ClusterError {
    fn from(err: ModelError) -> Self {
        ClusterError::Model(err)
    }
}

impl From<TransactionError> for ClusterError {
    fn from(err: TransactionError) -> Self {
        ClusterError::Storage(err.into())
    }
}
