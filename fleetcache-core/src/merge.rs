//! Merge engine.
//!
//! Merging folds an incoming record into an existing record with the same id:
//! attributes are last-write-wins per key and relationship sets are unioned.
//! Nothing here ever removes a relationship id, so within one reconciliation
//! pass relationship sets only grow.

use std::mem;

use crate::{CacheRecord, RecordAttributes, RecordIndex};

impl RecordAttributes {
    /// Overwrite these attributes with `incoming`.
    ///
    /// Schema'd fields are replaced wholesale. Provider extension maps are
    /// merged key by key with `incoming` winning conflicts. A change of
    /// record kind replaces the attributes outright.
    pub fn absorb(&mut self, incoming: RecordAttributes) {
        if self.kind() != incoming.kind() {
            tracing::warn!(
                existing = self.kind(),
                incoming = incoming.kind(),
                "Record kind changed during merge, replacing attributes"
            );
        }

        match (self, incoming) {
            (RecordAttributes::ServerGroup(existing), RecordAttributes::ServerGroup(mut incoming)) => {
                let mut extensions = mem::take(&mut existing.extensions);
                extensions.append(&mut incoming.extensions);
                incoming.extensions = extensions;
                *existing = incoming;
            }
            (RecordAttributes::Instance(existing), RecordAttributes::Instance(mut incoming)) => {
                let mut extensions = mem::take(&mut existing.extensions);
                extensions.append(&mut incoming.extensions);
                incoming.extensions = extensions;
                *existing = incoming;
            }
            (slot, incoming) => *slot = incoming,
        }
    }
}

impl CacheRecord {
    /// Fold `incoming` (same id) into this record.
    pub fn absorb(&mut self, incoming: CacheRecord) {
        debug_assert_eq!(self.id, incoming.id);
        self.attributes.absorb(incoming.attributes);
        for (namespace, ids) in incoming.relationships {
            self.relationships.entry(namespace).or_default().extend(ids);
        }
    }
}

impl RecordIndex {
    /// Insert `incoming`, or fold it into the existing record with its id.
    pub fn merge_record(&mut self, incoming: CacheRecord) {
        match self.slot(&incoming.id) {
            Some(existing) => existing.absorb(incoming),
            None => self.insert_new(incoming),
        }
    }

    pub fn merge_all<I>(&mut self, incoming: I)
    where
        I: IntoIterator<Item = CacheRecord>,
    {
        for record in incoming {
            self.merge_record(record);
        }
    }
}

/// Merge `incoming` records into `existing`.
pub fn merge<I>(existing: &mut RecordIndex, incoming: I)
where
    I: IntoIterator<Item = CacheRecord>,
{
    existing.merge_all(incoming);
}
