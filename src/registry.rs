// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Instance registry.
//!
//! Holds the statically configured Pi-hole instances in configured order and
//! resolves the optional `instance` argument of every tool call into the set of
//! instances to target.

use crate::config::load_instances_from_env;
use crate::constants::MAX_INSTANCES;
use crate::errors::{ConfigError, ToolError};
use crate::types::Instance;
use std::collections::HashSet;
use std::sync::Arc;

/// Read-only set of configured instances, cheap to clone.
#[derive(Debug, Clone)]
pub struct InstanceRegistry {
    instances: Arc<[Instance]>,
}

impl InstanceRegistry {
    /// Build a registry from already-loaded instances.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, exceeds [`MAX_INSTANCES`], or
    /// contains duplicate names.
    pub fn new(instances: Vec<Instance>) -> Result<Self, ConfigError> {
        if instances.is_empty() {
            return Err(ConfigError::NoInstancesConfigured);
        }
        if instances.len() > MAX_INSTANCES {
            return Err(ConfigError::TooManyInstances {
                count: instances.len(),
                max: MAX_INSTANCES,
            });
        }

        let mut seen = HashSet::new();
        for instance in &instances {
            if !seen.insert(instance.name.as_str()) {
                return Err(ConfigError::DuplicateInstanceName {
                    name: instance.name.clone(),
                });
            }
        }

        Ok(Self {
            instances: instances.into(),
        })
    }

    /// Build the registry from `PIHOLE*` environment variables.
    ///
    /// # Errors
    ///
    /// See [`crate::config::load_instances`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(load_instances_from_env()?)
    }

    /// Resolve a tool call's target.
    ///
    /// `None` selects every instance in configured order; `Some(name)` selects
    /// exactly that instance.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownInstance`] if no instance has that name.
    pub fn resolve(&self, target: Option<&str>) -> Result<Vec<Instance>, ToolError> {
        match target {
            None => Ok(self.instances.to_vec()),
            Some(name) => self
                .get(name)
                .map(|instance| vec![instance.clone()])
                .ok_or_else(|| ToolError::UnknownInstance {
                    name: name.to_string(),
                    available: self.names(),
                }),
        }
    }

    /// Look up one instance by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|instance| instance.name == name)
    }

    /// All instances in configured order.
    #[must_use]
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Instance names in configured order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.instances.iter().map(|i| i.name.clone()).collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
