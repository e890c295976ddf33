//! Where running rooms are looked up by id.
//!
//! The server reaches rooms only through a [`RoomRepository`], so tests and
//! alternative deployments can swap the storage without touching the
//! connection handler.

use std::collections::HashMap;

use crownquest_protocol::RoomId;

use crate::RoomHandle;

/// Storage for live room handles.
pub trait RoomRepository: Send + Sync + 'static {
    fn get(&self, room_id: &RoomId) -> Option<RoomHandle>;

    fn put(&mut self, handle: RoomHandle);

    /// Removes and returns the handle, if present.
    fn delete(&mut self, room_id: &RoomId) -> Option<RoomHandle>;

    fn room_ids(&self) -> Vec<RoomId>;

    fn contains(&self, room_id: &RoomId) -> bool {
        self.get(room_id).is_some()
    }

    fn len(&self) -> usize {
        self.room_ids().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every room for which `is_live` is false and returns the
    /// removed handles so the caller can shut them down.
    fn sweep_abandoned(&mut self, is_live: &dyn Fn(&RoomId) -> bool) -> Vec<RoomHandle> {
        self.room_ids()
            .into_iter()
            .filter(|id| !is_live(id))
            .filter_map(|id| self.delete(&id))
            .collect()
    }
}

/// A [`RoomRepository`] backed by a `HashMap`.
#[derive(Default)]
pub struct InMemoryRoomRepository {
    rooms: HashMap<RoomId, RoomHandle>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomRepository for InMemoryRoomRepository {
    fn get(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms.get(room_id).cloned()
    }

    fn put(&mut self, handle: RoomHandle) {
        self.rooms.insert(handle.room_id().clone(), handle);
    }

    fn delete(&mut self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms.remove(room_id)
    }

    fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().cloned().collect()
    }

    fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    fn len(&self) -> usize {
        self.rooms.len()
    }
}
