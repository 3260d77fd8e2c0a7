//! Per-run merge buffer.
//!
//! Each provider owns one slot, indexed by registration order. A slot holds
//! that provider's records once it completes, so a provider can contribute at
//! most once. [`MergeBuffer::freeze`] concatenates the slots according to the
//! [`MergePolicy`] and drops records whose id an earlier contribution already
//! supplied.

use std::collections::HashSet;

use super::{MergePolicy, ProviderRef};
use crate::record::Record;

#[derive(Debug)]
enum SlotState {
    Pending,
    AwaitingAuthorization,
    /// Its continuation was dropped without being resumed.
    Abandoned,
    Completed(Vec<Record>),
    Failed,
}

#[derive(Debug)]
struct Slot {
    provider: ProviderRef,
    state: SlotState,
}

/// Result of freezing a buffer.
#[derive(Debug)]
pub(crate) struct MergedRecords {
    pub records: Vec<Record>,
    pub duplicates_dropped: usize,
}

#[derive(Debug)]
pub(crate) struct MergeBuffer {
    slots: Vec<Slot>,
    completion_order: Vec<usize>,
    policy: MergePolicy,
}

impl MergeBuffer {
    pub fn new(providers: impl IntoIterator<Item = String>, policy: MergePolicy) -> Self {
        let slots = providers
            .into_iter()
            .enumerate()
            .map(|(slot, name)| Slot {
                provider: ProviderRef::new(slot, name),
                state: SlotState::Pending,
            })
            .collect::<Vec<_>>();
        Self {
            completion_order: Vec::with_capacity(slots.len()),
            slots,
            policy,
        }
    }

    /// Stores the records of the provider at `slot`.
    ///
    /// # Panics
    ///
    /// If the slot already completed or failed.
    pub fn complete(&mut self, slot: usize, records: Vec<Record>) {
        let entry = self.slot_mut(slot, "complete");
        entry.state = SlotState::Completed(records);
        self.completion_order.push(slot);
    }

    /// Marks the provider at `slot` as waiting on authorization.
    ///
    /// # Panics
    ///
    /// If the slot already completed or failed.
    pub fn awaiting_authorization(&mut self, slot: usize) {
        self.slot_mut(slot, "request authorization").state = SlotState::AwaitingAuthorization;
    }

    /// Marks the provider at `slot` as waiting on a continuation nobody holds.
    ///
    /// # Panics
    ///
    /// If the slot already completed, failed, or was abandoned.
    pub fn abandon(&mut self, slot: usize) {
        self.slot_mut(slot, "abandon authorization").state = SlotState::Abandoned;
    }

    /// First provider whose continuation was abandoned, in registration order.
    pub fn abandoned(&self) -> Option<&ProviderRef> {
        self.slots
            .iter()
            .find(|slot| matches!(slot.state, SlotState::Abandoned))
            .map(|slot| &slot.provider)
    }

    /// Marks the provider at `slot` as failed.
    ///
    /// # Panics
    ///
    /// If the slot already completed or failed.
    pub fn fail(&mut self, slot: usize) {
        self.slot_mut(slot, "fail").state = SlotState::Failed;
    }

    fn slot_mut(&mut self, slot: usize, action: &str) -> &mut Slot {
        let entry = &mut self.slots[slot];
        assert!(
            matches!(
                entry.state,
                SlotState::Pending | SlotState::AwaitingAuthorization
            ),
            "provider {} cannot {} after it finished",
            entry.provider,
            action
        );
        entry
    }

    /// Whether every provider has completed.
    pub fn is_complete(&self) -> bool {
        self.slots
            .iter()
            .all(|slot| matches!(slot.state, SlotState::Completed(_)))
    }

    /// Providers that have not completed yet, in registration order.
    pub fn pending(&self) -> Vec<ProviderRef> {
        self.slots
            .iter()
            .filter(|slot| !matches!(slot.state, SlotState::Completed(_)))
            .map(|slot| slot.provider.clone())
            .collect()
    }

    pub fn completed(&self) -> usize {
        self.completion_order.len()
    }

    /// Consumes the buffer into the merged record list.
    pub fn freeze(self) -> MergedRecords {
        let order: Vec<usize> = match self.policy {
            MergePolicy::RegistrationOrder => (0..self.slots.len()).collect(),
            MergePolicy::CompletionOrder => self.completion_order.clone(),
        };

        let mut contributions: Vec<Option<Vec<Record>>> = self
            .slots
            .into_iter()
            .map(|slot| match slot.state {
                SlotState::Completed(records) => Some(records),
                _ => None,
            })
            .collect();

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut duplicates_dropped = 0;
        for index in order {
            let Some(batch) = contributions[index].take() else {
                continue;
            };
            for record in batch {
                if seen.insert(record.id().clone()) {
                    records.push(record);
                } else {
                    duplicates_dropped += 1;
                }
            }
        }

        MergedRecords {
            records,
            duplicates_dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(policy: MergePolicy) -> MergeBuffer {
        MergeBuffer::new(vec!["a".to_string(), "b".to_string()], policy)
    }

    fn ids(merged: &MergedRecords) -> Vec<&str> {
        merged.records.iter().map(|r| r.id().as_str()).collect()
    }

    #[test]
    fn test_registration_order_ignores_completion_order() {
        let mut buf = buffer(MergePolicy::RegistrationOrder);
        buf.complete(1, vec![Record::new("b1")]);
        assert!(!buf.is_complete());
        assert_eq!(buf.pending(), vec![ProviderRef::new(0, "a")]);
        buf.complete(0, vec![Record::new("a1"), Record::new("a2")]);
        assert!(buf.is_complete());

        let merged = buf.freeze();
        assert_eq!(ids(&merged), vec!["a1", "a2", "b1"]);
    }

    #[test]
    fn test_completion_order_interleaves_by_arrival() {
        let mut buf = buffer(MergePolicy::CompletionOrder);
        buf.complete(1, vec![Record::new("b1")]);
        buf.complete(0, vec![Record::new("a1")]);
        assert_eq!(ids(&buf.freeze()), vec!["b1", "a1"]);
    }

    #[test]
    fn test_earlier_contribution_wins_duplicates() {
        let mut buf = buffer(MergePolicy::RegistrationOrder);
        buf.complete(0, vec![Record::new("x"), Record::new("y")]);
        buf.complete(1, vec![Record::new("y"), Record::new("z")]);

        let merged = buf.freeze();
        assert_eq!(ids(&merged), vec!["x", "y", "z"]);
        assert_eq!(merged.duplicates_dropped, 1);
    }

    #[test]
    fn test_authorization_then_completion() {
        let mut buf = buffer(MergePolicy::RegistrationOrder);
        buf.awaiting_authorization(0);
        buf.awaiting_authorization(0);
        buf.complete(0, vec![Record::new("a1")]);
        assert_eq!(buf.completed(), 1);
    }

    #[test]
    fn test_abandoned_slot_stays_pending() {
        let mut buf = buffer(MergePolicy::RegistrationOrder);
        buf.complete(0, vec![Record::new("a1")]);
        assert!(buf.abandoned().is_none());

        buf.awaiting_authorization(1);
        buf.abandon(1);
        assert!(!buf.is_complete());
        assert_eq!(buf.abandoned(), Some(&ProviderRef::new(1, "b")));
        assert_eq!(buf.pending(), vec![ProviderRef::new(1, "b")]);
    }

    #[test]
    #[should_panic(expected = "cannot complete after it finished")]
    fn test_double_completion_panics() {
        let mut buf = buffer(MergePolicy::RegistrationOrder);
        buf.complete(0, vec![Record::new("a1")]);
        buf.complete(0, vec![Record::new("a1")]);
    }

    #[test]
    #[should_panic(expected = "cannot complete after it finished")]
    fn test_completion_after_failure_panics() {
        let mut buf = buffer(MergePolicy::RegistrationOrder);
        buf.fail(1);
        buf.complete(1, Vec::new());
    }

    #[test]
    fn test_empty_buffer_is_complete() {
        let buf = MergeBuffer::new(Vec::<String>::new(), MergePolicy::RegistrationOrder);
        assert!(buf.is_complete());
        assert!(buf.freeze().records.is_empty());
    }
}
