//! Chart-store data model.
//!
//! Just enough clinical schema to exercise persistence ordering: the
//! practitioner profile (whose `onboarded` flag is the classic victim of the
//! startup race) plus free-form patient/encounter documents keyed by id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PractitionerProfile {
    pub display_name: String,
    pub onboarded: bool,
}

/// In-memory form of the local store. Serialized with `serde_json` and
/// sealed with the master key before it reaches durable storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub profile: Option<PractitionerProfile>,
    #[serde(default)]
    pub records: BTreeMap<String, serde_json::Value>,
    /// Bumped on every committed mutation; lets tests and the mirror assert
    /// "latest state wins" without byte-identical exports.
    #[serde(default)]
    pub revision: u64,
}

/// Read requests against the chart store.
#[derive(Debug, Clone)]
pub enum Query {
    Profile,
    Record { id: String },
    RecordIds,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryReply {
    Profile(Option<PractitionerProfile>),
    Record(Option<serde_json::Value>),
    RecordIds(Vec<String>),
}

/// Write requests. Every applied mutation flushes through the persistence
/// coordinator before control returns to the caller.
#[derive(Debug, Clone)]
pub enum Mutation {
    SetProfile(PractitionerProfile),
    PutRecord { id: String, body: serde_json::Value },
    DeleteRecord { id: String },
}

impl StoreSnapshot {
    pub(crate) fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::SetProfile(profile) => self.profile = Some(profile),
            Mutation::PutRecord { id, body } => {
                self.records.insert(id, body);
            }
            Mutation::DeleteRecord { id } => {
                self.records.remove(&id);
            }
        }
        self.revision += 1;
    }
}
