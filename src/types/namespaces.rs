// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::DEFAULT_IGNORED_NAMESPACES;
use crate::error::{MirrorError, Result};
use std::collections::BTreeSet;
use std::fmt;

/// Namespaces whose services are never mirrored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredNamespaces(BTreeSet<String>);

impl IgnoredNamespaces {
    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Add a namespace, or remove it when prefixed with a dash (`-kube-system`)
    pub fn apply(&mut self, value: &str) -> Result<()> {
        if value.is_empty() {
            return Err(MirrorError::InvalidConfig(
                "empty string not allowed as namespace".to_string(),
            ));
        }

        match value.strip_prefix('-') {
            Some(namespace) => {
                self.0.remove(namespace);
            }
            None => {
                self.0.insert(value.to_string());
            }
        }
        Ok(())
    }

    pub fn is_ignored(&self, namespace: &str) -> bool {
        self.0.contains(namespace)
    }
}

impl Default for IgnoredNamespaces {
    fn default() -> Self {
        Self(
            DEFAULT_IGNORED_NAMESPACES
                .iter()
                .map(|ns| ns.to_string())
                .collect(),
        )
    }
}

impl fmt::Display for IgnoredNamespaces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(String::as_str).collect();
        f.write_str(&names.join(","))
    }
}
