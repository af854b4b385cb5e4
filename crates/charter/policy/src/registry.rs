//! In-memory policy registry.
//!
//! Single source of truth for policy documents once the store has been
//! loaded. Checks resolve owning policies and raw rule definitions here;
//! nothing re-reads the store at check time.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::store::{PolicyDocument, PolicyStore};

/// Immutable index over loaded policy documents.
#[derive(Clone, Debug, Default)]
pub struct PolicyRegistry {
    documents: HashMap<String, Arc<PolicyDocument>>,
    /// rule id → owning policy id
    rule_index: HashMap<String, String>,
}

impl PolicyRegistry {
    /// Index `documents`. If two policies declare the same rule id the
    /// first declaration wins.
    pub fn new(documents: impl IntoIterator<Item = PolicyDocument>) -> Self {
        let mut registry = Self::default();
        for doc in documents {
            for rule_id in doc.rule_ids() {
                match registry.rule_index.get(rule_id) {
                    Some(owner) => warn!(
                        rule = rule_id,
                        owner = %owner,
                        duplicate_in = %doc.id,
                        "rule declared twice; keeping first owner"
                    ),
                    None => {
                        registry
                            .rule_index
                            .insert(rule_id.to_string(), doc.id.clone());
                    }
                }
            }
            registry.documents.insert(doc.id.clone(), Arc::new(doc));
        }
        registry
    }

    pub fn from_store(store: &PolicyStore) -> Self {
        Self::new(store.documents.iter().cloned())
    }

    /// Look up a policy document by id.
    pub fn policy(&self, policy_id: &str) -> Option<Arc<PolicyDocument>> {
        self.documents.get(policy_id).cloned()
    }

    /// Policy that declares `rule_id`.
    pub fn policy_for_rule(&self, rule_id: &str) -> Option<Arc<PolicyDocument>> {
        self.rule_index
            .get(rule_id)
            .and_then(|policy_id| self.policy(policy_id))
    }

    /// Raw definition of `rule_id`, if any policy declares it.
    pub fn rule_definition(&self, rule_id: &str) -> Option<serde_json::Value> {
        self.policy_for_rule(rule_id)
            .and_then(|doc| doc.rule(rule_id).cloned())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
