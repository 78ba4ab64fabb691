use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// The (mode, group) pair a view demands before running an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub mode: String,
    pub group: String,
}

impl Permission {
    pub fn new(mode: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            group: group.into(),
        }
    }
}

impl Default for Permission {
    fn default() -> Self {
        Self::new("view", "anybody")
    }
}

/// One evaluation, scoped to a single resource type.
#[derive(Debug, Clone, Copy)]
pub struct PermissionCheck<'a> {
    pub resource: &'a str,
    pub mode: &'a str,
    pub group: &'a str,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("'{group}' may not {mode} {resource}")]
    Denied {
        resource: String,
        mode: String,
        group: String,
    },

    #[error("Permission engine failure: {0}")]
    Engine(String),
}

impl PermissionError {
    pub fn denied(check: &PermissionCheck<'_>) -> Self {
        PermissionError::Denied {
            resource: check.resource.to_string(),
            mode: check.mode.to_string(),
            group: check.group.to_string(),
        }
    }
}

#[async_trait]
pub trait PermissionEngine: Send + Sync + 'static {
    async fn check(&self, check: &PermissionCheck<'_>) -> Result<(), PermissionError>;
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PermissionEngine for AllowAll {
    async fn check(&self, _check: &PermissionCheck<'_>) -> Result<(), PermissionError> {
        Ok(())
    }
}

/// Fixed table of (resource, mode, group) grants. `"*"` as the resource
/// matches any resource.
#[derive(Debug, Clone, Default)]
pub struct StaticGrants {
    grants: HashSet<(String, String, String)>,
}

impl StaticGrants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(
        mut self,
        resource: impl Into<String>,
        mode: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        self.grants
            .insert((resource.into(), mode.into(), group.into()));
        self
    }

    fn allows(&self, resource: &str, check: &PermissionCheck<'_>) -> bool {
        self.grants.contains(&(
            resource.to_string(),
            check.mode.to_string(),
            check.group.to_string(),
        ))
    }
}

#[async_trait]
impl PermissionEngine for StaticGrants {
    async fn check(&self, check: &PermissionCheck<'_>) -> Result<(), PermissionError> {
        if self.allows(check.resource, check) || self.allows("*", check) {
            Ok(())
        } else {
            Err(PermissionError::denied(check))
        }
    }
}
