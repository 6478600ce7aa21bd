//! Audit trail — append-only hash chain.
//!
//! Every write through the API appends an audit record whose hash chains to
//! the previous record. The hash covers every stored field of the record
//! (id, actor, action, entity, `before`/`after` payloads and timestamp), so
//! [`AuditTrail::verify`] detects edits to any of them as well as removed or
//! reordered records.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use kinerja_core::UserId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

/// `previousHash` of the first record.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Kind of mutation recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// An audit event to be appended.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub actor: UserId,
    pub action: AuditAction,
    pub entity_type: &'static str,
    pub entity_id: Uuid,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

/// A persisted audit record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Uuid,
    pub actor_user_id: Uuid,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Uuid,
    #[schema(value_type = Option<Object>)]
    pub before: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub after: Option<serde_json::Value>,
    pub previous_hash: String,
    pub event_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Result of chain integrity verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChainIntegrity {
    pub total_events: usize,
    pub broken_links: usize,
    pub chain_valid: bool,
}

/// Shared, append-only audit log. Clones share the same chain.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, chaining it to the current head.
    ///
    /// The head is read and the new record pushed under one lock, so
    /// concurrent writers cannot fork the chain.
    pub fn append(&self, event: AuditEvent) -> AuditRecord {
        let mut records = self.records.lock();
        let previous_hash = records
            .last()
            .map(|r| r.event_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let mut record = AuditRecord {
            id: Uuid::new_v4(),
            actor_user_id: *event.actor.as_uuid(),
            action: event.action,
            entity_type: event.entity_type.to_string(),
            entity_id: event.entity_id,
            before: event.before,
            after: event.after,
            previous_hash,
            event_hash: String::new(),
            created_at: Utc::now(),
        };
        record.event_hash = record_hash(&record);
        records.push(record.clone());
        record
    }

    /// All records, oldest first.
    pub fn list(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn get(&self, id: &Uuid) -> Option<AuditRecord> {
        self.records.lock().iter().find(|r| r.id == *id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk the chain, counting records whose `previousHash` does not match
    /// the preceding record or whose `eventHash` does not match its fields.
    pub fn verify(&self) -> ChainIntegrity {
        let records = self.records.lock();
        let mut broken_links = 0;
        let mut expected_prev = GENESIS_HASH;

        for record in records.iter() {
            if record.previous_hash != expected_prev || record.event_hash != record_hash(record) {
                broken_links += 1;
            }
            expected_prev = &record.event_hash;
        }

        ChainIntegrity {
            total_events: records.len(),
            broken_links,
            chain_valid: broken_links == 0,
        }
    }
}

/// SHA-256 over the record's previous hash and content, hex.
///
/// Fields are joined with `|`. Payloads are hashed as compact JSON; object
/// keys serialize in sorted order, so the encoding is stable.
fn record_hash(record: &AuditRecord) -> String {
    let payload = |value: &Option<serde_json::Value>| {
        value.as_ref().map(|v| v.to_string()).unwrap_or_default()
    };
    let hash_input = [
        record.previous_hash.clone(),
        record.id.to_string(),
        record.action.as_str().to_string(),
        record.entity_type.clone(),
        record.entity_id.to_string(),
        record.actor_user_id.to_string(),
        record.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        payload(&record.before),
        payload(&record.after),
    ]
    .join("|");
    sha256_hex(&hash_input)
}

/// Compute SHA-256 hex digest of input string.
fn sha256_hex(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(action: AuditAction, entity_id: Uuid) -> AuditEvent {
        AuditEvent {
            actor: UserId::new(),
            action,
            entity_type: "institution",
            entity_id,
            before: None,
            after: Some(serde_json::json!({"name": "Universitas Contoh"})),
        }
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn first_record_chains_to_genesis() {
        let trail = AuditTrail::new();
        let record = trail.append(event(AuditAction::Create, Uuid::new_v4()));
        assert_eq!(record.previous_hash, GENESIS_HASH);
        assert_eq!(record.event_hash.len(), 64);
    }

    #[test]
    fn records_chain_in_order() {
        let trail = AuditTrail::new();
        let id = Uuid::new_v4();
        let a = trail.append(event(AuditAction::Create, id));
        let b = trail.append(event(AuditAction::Update, id));
        let c = trail.append(event(AuditAction::Delete, id));
        assert_eq!(b.previous_hash, a.event_hash);
        assert_eq!(c.previous_hash, b.event_hash);
        assert_eq!(trail.len(), 3);
        assert_eq!(trail.get(&b.id).unwrap().action, AuditAction::Update);
    }

    #[test]
    fn empty_chain_is_valid() {
        let integrity = AuditTrail::new().verify();
        assert_eq!(
            integrity,
            ChainIntegrity {
                total_events: 0,
                broken_links: 0,
                chain_valid: true,
            }
        );
    }

    #[test]
    fn untouched_chain_verifies() {
        let trail = AuditTrail::new();
        for _ in 0..5 {
            trail.append(event(AuditAction::Create, Uuid::new_v4()));
        }
        let integrity = trail.verify();
        assert_eq!(integrity.total_events, 5);
        assert!(integrity.chain_valid);
    }

    #[test]
    fn tampered_field_is_detected() {
        let trail = AuditTrail::new();
        for _ in 0..3 {
            trail.append(event(AuditAction::Create, Uuid::new_v4()));
        }
        trail.records.lock()[1].entity_type = "lecturer".to_string();
        let integrity = trail.verify();
        assert_eq!(integrity.broken_links, 1);
        assert!(!integrity.chain_valid);
    }

    #[test]
    fn tampered_payload_is_detected() {
        let trail = AuditTrail::new();
        for _ in 0..3 {
            trail.append(event(AuditAction::Create, Uuid::new_v4()));
        }
        trail.records.lock()[0].after = Some(serde_json::json!({"name": "Universitas Palsu"}));
        trail.records.lock()[2].before = Some(serde_json::json!({}));
        let integrity = trail.verify();
        assert_eq!(integrity.broken_links, 2);
        assert!(!integrity.chain_valid);
    }

    #[test]
    fn backdated_record_is_detected() {
        let trail = AuditTrail::new();
        trail.append(event(AuditAction::Create, Uuid::new_v4()));
        trail.records.lock()[0].created_at -= chrono::Duration::days(1);
        assert!(!trail.verify().chain_valid);
    }

    #[test]
    fn removed_record_breaks_the_link() {
        let trail = AuditTrail::new();
        for _ in 0..3 {
            trail.append(event(AuditAction::Create, Uuid::new_v4()));
        }
        trail.records.lock().remove(1);
        let integrity = trail.verify();
        assert_eq!(integrity.total_events, 2);
        assert_eq!(integrity.broken_links, 1);
    }

    #[test]
    fn clones_share_the_chain() {
        let trail = AuditTrail::new();
        let other = trail.clone();
        other.append(event(AuditAction::Create, Uuid::new_v4()));
        assert_eq!(trail.len(), 1);
        assert!(!trail.is_empty());
    }
}
