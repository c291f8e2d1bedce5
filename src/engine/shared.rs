// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Per-apartment sub-state of a record addressed to many apartments.
//!
//! The container is built from the full address set with an initial value for
//! every member and is never sparse afterwards. Updates touch exactly one
//! member's entry; entries are never added or removed after construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::ApartmentId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ApartmentKeyed<V> {
    entries: BTreeMap<ApartmentId, V>,
}

impl<V: Clone> ApartmentKeyed<V> {
    pub fn new<I>(members: I, initial: V) -> EngineResult<Self>
    where
        I: IntoIterator<Item = ApartmentId>,
    {
        let entries: BTreeMap<ApartmentId, V> = members
            .into_iter()
            .map(|id| (id, initial.clone()))
            .collect();
        Self::from_entries(entries)
    }
}

impl<V> ApartmentKeyed<V> {
    /// Rebuilds a stored map. An empty address set is rejected.
    pub fn from_entries(entries: BTreeMap<ApartmentId, V>) -> EngineResult<Self> {
        if entries.is_empty() {
            return Err(EngineError::invalid("a broadcast record needs at least one apartment"));
        }
        Ok(Self { entries })
    }

    pub fn get(&self, id: &ApartmentId) -> Option<&V> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ApartmentId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ApartmentId, &V)> {
        self.entries.iter()
    }

    /// Replaces one member's entry and returns the previous value.
    pub fn set(&mut self, id: &ApartmentId, value: V) -> EngineResult<V> {
        match self.entries.get_mut(id) {
            Some(slot) => Ok(std::mem::replace(slot, value)),
            None => Err(EngineError::NotAddressed(id.clone())),
        }
    }

    pub fn count_where(&self, pred: impl Fn(&V) -> bool) -> usize {
        self.entries.values().filter(|v| pred(v)).count()
    }
}

impl<'de, V> Deserialize<'de> for ApartmentKeyed<V>
where
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = BTreeMap::<ApartmentId, V>::deserialize(deserializer)?;
        Self::from_entries(entries).map_err(serde::de::Error::custom)
    }
}
