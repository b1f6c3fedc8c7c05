//! In-memory storage implementation
//!
//! Used by tests and dry runs; nothing survives the process.

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::ContentStore;
use crate::error::StoreError;
use crate::models::{ContentHash, MessageId, ProcessedMessage, UserCredential};

/// In-memory implementation of ContentStore
///
/// Uses maps protected by RwLocks for thread-safe access.
pub struct InMemoryContentStore {
    users: RwLock<BTreeMap<String, UserCredential>>,
    /// Keyed by (message ID, attachment part ID)
    processed: RwLock<BTreeMap<(String, String), ProcessedMessage>>,
    /// Reference count of records per content hash
    hash_index: RwLock<HashMap<String, usize>>,
}

impl InMemoryContentStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            processed: RwLock::new(BTreeMap::new()),
            hash_index: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for InMemoryContentStore {
    fn upsert_user(&self, credential: UserCredential) -> Result<()> {
        let mut users = self.users.write().unwrap();
        users.insert(credential.id.clone(), credential);
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<UserCredential>> {
        let users = self.users.read().unwrap();
        Ok(users.values().cloned().collect())
    }

    fn get_user(&self, id: &str) -> Result<UserCredential> {
        let users = self.users.read().unwrap();
        users
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::UserNotFound(id.to_string()).into())
    }

    fn upsert_processed(&self, record: ProcessedMessage) -> Result<()> {
        let key = (
            record.message_id.0.clone(),
            record.attachment_part_id.clone(),
        );
        let new_hash = record.content_hash.as_str().to_string();

        let mut processed = self.processed.write().unwrap();
        let mut index = self.hash_index.write().unwrap();

        // Replacing a record must drop the old hash's reference
        if let Some(old) = processed.insert(key, record) {
            let old_hash = old.content_hash.as_str();
            if let Some(count) = index.get_mut(old_hash) {
                *count -= 1;
                if *count == 0 {
                    index.remove(old_hash);
                }
            }
        }
        *index.entry(new_hash).or_insert(0) += 1;

        Ok(())
    }

    fn has_content_hash(&self, hash: &ContentHash) -> Result<bool> {
        let index = self.hash_index.read().unwrap();
        Ok(index.contains_key(hash.as_str()))
    }

    fn has_message(&self, id: &MessageId) -> Result<bool> {
        let processed = self.processed.read().unwrap();
        let from = (id.0.clone(), String::new());
        Ok(processed
            .range(from..)
            .next()
            .is_some_and(|((msg_id, _), _)| msg_id == &id.0))
    }

    fn list_processed(&self) -> Result<Vec<ProcessedMessage>> {
        let processed = self.processed.read().unwrap();
        Ok(processed.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(msg: &str, part: &str, data: &[u8]) -> ProcessedMessage {
        ProcessedMessage::new(
            MessageId::new(msg),
            part,
            ContentHash::of(data),
            format!("/uploads/{}/{}", msg, part),
        )
    }

    #[test]
    fn test_user_crud() {
        let store = InMemoryContentStore::new();

        store
            .upsert_user(UserCredential::new("b@example.com", None, None, "t1", 10))
            .unwrap();
        store
            .upsert_user(UserCredential::new("a@example.com", None, None, "t2", 20))
            .unwrap();

        let users = store.list_users().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, "a@example.com");

        let user = store.get_user("b@example.com").unwrap();
        assert_eq!(user.access_token, "t1");
    }

    #[test]
    fn test_upsert_user_replaces_wholesale() {
        let store = InMemoryContentStore::new();
        store
            .upsert_user(UserCredential::new(
                "u",
                Some("u@example.com".into()),
                Some("refresh".into()),
                "old",
                10,
            ))
            .unwrap();
        store
            .upsert_user(UserCredential::new("u", None, None, "new", 20))
            .unwrap();

        let user = store.get_user("u").unwrap();
        assert_eq!(user.access_token, "new");
        assert_eq!(user.refresh_token, None);
        assert_eq!(user.email, None);
    }

    #[test]
    fn test_get_user_not_found() {
        let store = InMemoryContentStore::new();
        let err = store.get_user("missing").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::UserNotFound(id)) if id == "missing"
        ));
    }

    #[test]
    fn test_processed_lookups() {
        let store = InMemoryContentStore::new();
        let record = make_record("m1", "1", b"pdf bytes");

        assert!(!store.has_message(&MessageId::new("m1")).unwrap());
        assert!(!store.has_content_hash(&record.content_hash).unwrap());

        store.upsert_processed(record.clone()).unwrap();

        assert!(store.has_message(&MessageId::new("m1")).unwrap());
        assert!(!store.has_message(&MessageId::new("m")).unwrap());
        assert!(!store.has_message(&MessageId::new("m10")).unwrap());
        assert!(store.has_content_hash(&record.content_hash).unwrap());
    }

    #[test]
    fn test_upsert_processed_replaces_by_key() {
        let store = InMemoryContentStore::new();
        let first = make_record("m1", "1", b"v1");
        let second = make_record("m1", "1", b"v2");

        store.upsert_processed(first.clone()).unwrap();
        store.upsert_processed(second.clone()).unwrap();

        assert_eq!(store.list_processed().unwrap().len(), 1);
        assert!(!store.has_content_hash(&first.content_hash).unwrap());
        assert!(store.has_content_hash(&second.content_hash).unwrap());
    }

    #[test]
    fn test_multiple_parts_per_message() {
        let store = InMemoryContentStore::new();
        store.upsert_processed(make_record("m1", "1", b"a")).unwrap();
        store.upsert_processed(make_record("m1", "2", b"b")).unwrap();

        let all = store.list_processed().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].attachment_part_id, "1");
        assert_eq!(all[1].attachment_part_id, "2");
    }
}
