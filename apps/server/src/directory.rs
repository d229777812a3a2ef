use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sealtalk_shared::api::keys::PublicKeyResponse;
use sealtalk_shared::ids::UserId;

struct PublicKeyRecord {
    public_key: String,
    updated_at: DateTime<Utc>,
}

/// Current public key per user. At most one record per user; every publish
/// overwrites it.
#[derive(Default)]
pub struct KeyDirectoryTable {
    records: DashMap<UserId, PublicKeyRecord>,
}

impl KeyDirectoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `public_key` as the user's current key. Returns whether a
    /// previous, different key was replaced.
    pub fn publish(&self, user_id: UserId, public_key: String) -> (PublicKeyResponse, bool) {
        let updated_at = Utc::now();
        let previous = self.records.insert(
            user_id,
            PublicKeyRecord {
                public_key: public_key.clone(),
                updated_at,
            },
        );
        let rotated = previous.is_some_and(|old| old.public_key != public_key);
        (
            PublicKeyResponse {
                user_id,
                public_key,
                updated_at,
            },
            rotated,
        )
    }

    pub fn lookup(&self, user_id: &UserId) -> Option<PublicKeyResponse> {
        self.records.get(user_id).map(|record| PublicKeyResponse {
            user_id: *user_id,
            public_key: record.public_key.clone(),
            updated_at: record.updated_at,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
