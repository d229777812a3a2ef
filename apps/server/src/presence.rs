use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sealtalk_shared::api::presence::{PresenceStatus, PresenceUpdate};
use sealtalk_shared::ids::UserId;
use tokio::sync::broadcast;

/// Online users and their open connection counts.
///
/// A user goes online on their first connection and offline when their last
/// one closes. Only those transitions are broadcast; extra connections from
/// an already-online user are silent.
pub struct PresenceTable {
    connections: DashMap<UserId, usize>,
    updates: broadcast::Sender<PresenceUpdate>,
}

impl PresenceTable {
    pub fn new(channel_capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            connections: DashMap::new(),
            updates,
        }
    }

    /// Register a connection. Returns `true` if the user just came online.
    pub fn connect(&self, user_id: UserId) -> bool {
        let came_online = match self.connections.entry(user_id) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() += 1;
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(1);
                true
            }
        };
        if came_online {
            self.broadcast(user_id, PresenceStatus::Online);
        }
        came_online
    }

    /// Drop a connection. Returns `true` if the user just went offline.
    /// Disconnecting a user with no connections is a no-op.
    pub fn disconnect(&self, user_id: UserId) -> bool {
        let went_offline = match self.connections.entry(user_id) {
            Entry::Occupied(mut entry) if *entry.get() > 1 => {
                *entry.get_mut() -= 1;
                false
            }
            Entry::Occupied(entry) => {
                entry.remove();
                true
            }
            Entry::Vacant(_) => false,
        };
        if went_offline {
            self.broadcast(user_id, PresenceStatus::Offline);
        }
        went_offline
    }

    pub fn status(&self, user_id: &UserId) -> PresenceStatus {
        if self.connections.contains_key(user_id) {
            PresenceStatus::Online
        } else {
            PresenceStatus::Offline
        }
    }

    pub fn online_count(&self) -> usize {
        self.connections.len()
    }

    /// Receive online/offline transitions from now on.
    ///
    /// Hook for the live message transport, which forwards these to room
    /// members. That transport is not part of this server, so nothing in the
    /// HTTP surface subscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<PresenceUpdate> {
        self.updates.subscribe()
    }

    fn broadcast(&self, user_id: UserId, status: PresenceStatus) {
        tracing::info!(user_id = %user_id, ?status, "presence changed");
        // No subscribers is fine.
        let _ = self.updates.send(PresenceUpdate { user_id, status });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_connect_goes_online_and_broadcasts() {
        let table = PresenceTable::new(8);
        let mut rx = table.subscribe();
        let user = UserId::new();

        assert!(table.connect(user));
        assert_eq!(table.status(&user), PresenceStatus::Online);
        assert_eq!(
            rx.try_recv().unwrap(),
            PresenceUpdate {
                user_id: user,
                status: PresenceStatus::Online
            }
        );
    }

    #[test]
    fn second_connection_is_silent() {
        let table = PresenceTable::new(8);
        let user = UserId::new();
        table.connect(user);
        let mut rx = table.subscribe();

        assert!(!table.connect(user));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn offline_only_after_last_connection_closes() {
        let table = PresenceTable::new(8);
        let user = UserId::new();
        table.connect(user);
        table.connect(user);
        let mut rx = table.subscribe();

        assert!(!table.disconnect(user));
        assert_eq!(table.status(&user), PresenceStatus::Online);
        assert!(rx.try_recv().is_err());

        assert!(table.disconnect(user));
        assert_eq!(table.status(&user), PresenceStatus::Offline);
        assert_eq!(rx.try_recv().unwrap().status, PresenceStatus::Offline);
    }

    #[test]
    fn disconnect_unknown_user_is_noop() {
        let table = PresenceTable::new(8);
        let mut rx = table.subscribe();
        assert!(!table.disconnect(UserId::new()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn online_count_tracks_distinct_users() {
        let table = PresenceTable::new(8);
        let (a, b) = (UserId::new(), UserId::new());
        table.connect(a);
        table.connect(a);
        table.connect(b);
        assert_eq!(table.online_count(), 2);
    }
}
