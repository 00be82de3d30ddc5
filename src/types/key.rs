// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Work queue keys addressing namespaced objects.

use crate::error::{MirrorError, Result};
use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};
use std::fmt;
use std::str::FromStr;

/// `(namespace, name)` of a watched object, rendered as `namespace/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build the key of an object, `None` if it carries no name
    pub fn from_resource<K: Resource>(obj: &K) -> Option<Self> {
        let name = obj.meta().name.clone()?;
        Some(Self {
            namespace: obj.namespace().unwrap_or_default(),
            name,
        })
    }

    /// Reference used to look the object up in a reflector store
    pub fn object_ref<K>(&self) -> ObjectRef<K>
    where
        K: Resource,
        K::DynamicType: Default,
    {
        let obj_ref = ObjectRef::new(&self.name);
        if self.namespace.is_empty() {
            obj_ref
        } else {
            obj_ref.within(&self.namespace)
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

impl FromStr for ResourceKey {
    type Err = MirrorError;

    /// Accepts `name` and `namespace/name`; anything else can never be reconciled
    fn from_str(key: &str) -> Result<Self> {
        let parts: Vec<&str> = key.split('/').collect();
        let (namespace, name) = match parts.as_slice() {
            [name] => ("", *name),
            [namespace, name] => (*namespace, *name),
            _ => return Err(MirrorError::MalformedKey(key.to_string())),
        };

        if name.is_empty() {
            return Err(MirrorError::MalformedKey(key.to_string()));
        }

        Ok(Self::new(namespace, name))
    }
}
