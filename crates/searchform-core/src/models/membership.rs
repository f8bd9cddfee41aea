use serde::{Deserialize, Serialize};

use crate::models::replica::ReplicaRef;

/// The replica identifiers attached to a primary index.
///
/// Order carries no meaning; only set membership does. Entries are kept as
/// raw strings so that whatever the remote side returns is written back
/// untouched, including entries this crate would not produce itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipList(Vec<String>);

impl MembershipList {
    pub fn new(entries: Vec<String>) -> Self {
        Self(entries)
    }

    pub fn contains(&self, replica: &ReplicaRef) -> bool {
        let id = replica.identifier();
        self.0.iter().any(|entry| *entry == id)
    }

    /// Add `replica` if absent. Returns `true` when the list changed.
    pub fn insert(&mut self, replica: &ReplicaRef) -> bool {
        if self.contains(replica) {
            return false;
        }
        self.0.push(replica.identifier());
        true
    }

    /// Drop every entry equal to `replica`'s identifier. Returns `true` when
    /// the list changed.
    pub fn remove(&mut self, replica: &ReplicaRef) -> bool {
        let id = replica.identifier();
        let before = self.0.len();
        self.0.retain(|entry| *entry != id);
        self.0.len() != before
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode every well-formed entry, skipping ones that are not.
    pub fn replicas(&self) -> impl Iterator<Item = ReplicaRef> + '_ {
        self.0.iter().filter_map(|entry| ReplicaRef::parse(entry).ok())
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for MembershipList {
    fn from(entries: Vec<String>) -> Self {
        Self(entries)
    }
}

impl<'a> FromIterator<&'a str> for MembershipList {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(String::from).collect())
    }
}
