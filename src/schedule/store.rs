//! Holder for the most recently fetched control payload.

use super::types::{ControlPayload, FetchMetadata, Timestamp};

/// Last good payload plus the revision marker it was compared against.
///
/// A failed fetch never reaches the store, so the previous payload stays in
/// place until a new one replaces it wholesale.
#[derive(Debug, Default, Clone)]
pub struct ScheduleStore {
    payload: Option<ControlPayload>,
    metadata: Option<FetchMetadata>,
    last_revision_seen: Option<i64>,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored payload and metadata.
    ///
    /// Returns `true` when the payload's revision differs from the last one
    /// seen (the first payload always counts as a change).
    pub fn replace(&mut self, payload: ControlPayload, metadata: Option<FetchMetadata>) -> bool {
        let changed = self.last_revision_seen != Some(payload.revision);
        if changed {
            self.last_revision_seen = Some(payload.revision);
        }
        self.payload = Some(payload);
        self.metadata = metadata;
        changed
    }

    pub fn payload(&self) -> Option<&ControlPayload> {
        self.payload.as_ref()
    }

    pub fn metadata(&self) -> Option<&FetchMetadata> {
        self.metadata.as_ref()
    }

    pub fn last_revision_seen(&self) -> Option<i64> {
        self.last_revision_seen
    }

    /// Generation time of the stored payload, used as `last_request`.
    pub fn fetched_at(&self) -> Option<Timestamp> {
        self.metadata.map(|m| m.fetched_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::RelayState;

    fn payload(revision: i64) -> ControlPayload {
        ControlPayload {
            channel_id: "1".into(),
            name: String::new(),
            current_state: RelayState::On,
            revision,
            schedule: Vec::new(),
        }
    }

    #[test]
    fn first_payload_counts_as_revision_change() {
        let mut store = ScheduleStore::new();
        assert!(store.payload().is_none());
        assert!(store.replace(payload(0), None));
        assert_eq!(store.last_revision_seen(), Some(0));
    }

    #[test]
    fn equal_revision_is_not_a_change() {
        let mut store = ScheduleStore::new();
        store.replace(payload(3), None);
        assert!(!store.replace(payload(3), None));
        assert!(store.replace(payload(4), None));
        assert!(store.replace(payload(3), None));
    }

    #[test]
    fn replacement_is_wholesale() {
        let mut store = ScheduleStore::new();
        let meta = FetchMetadata {
            fetched_at: 10,
            valid_until: 20,
        };
        store.replace(payload(1), Some(meta));
        assert_eq!(store.fetched_at(), Some(10));

        store.replace(payload(1), None);
        assert!(store.metadata().is_none());
        assert!(store.fetched_at().is_none());
    }
}
