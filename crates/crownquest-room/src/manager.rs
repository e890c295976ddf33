//! Room manager: creates, tracks, and deletes rooms.

use crownquest_protocol::{Grid, Player, PlayerId, RoomId, SpaceId};

use crate::room::{NewRoom, spawn_room};
use crate::{
    InMemoryRoomRepository, JoinOutcome, MemberSender, RoomConfig, RoomError, RoomHandle,
    RoomRepository,
};

/// A `create` request after the server has drawn a start space and
/// obtained a grid for it.
#[derive(Debug, Clone)]
pub struct CreateRoom {
    pub name: String,
    pub memory_mode: bool,
    pub random_start_space: bool,
    pub start_space: SpaceId,
    pub grid: Grid,
}

/// Manages all active rooms.
///
/// This is the entry point for room operations from the connection
/// handler and the abandonment sweep.
pub struct RoomManager<R: RoomRepository = InMemoryRoomRepository> {
    repository: R,
    config: RoomConfig,
}

impl RoomManager<InMemoryRoomRepository> {
    /// Creates an empty manager with in-memory storage.
    pub fn new(config: RoomConfig) -> Self {
        Self::with_repository(config, InMemoryRoomRepository::new())
    }
}

impl<R: RoomRepository> RoomManager<R> {
    pub fn with_repository(config: RoomConfig, repository: R) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Opens a room with its creator seated and returns the creator's
    /// identity. `sender` receives `assignPlayerId` and `state` at once.
    pub fn create_room(
        &mut self,
        request: CreateRoom,
        sender: MemberSender,
    ) -> (RoomHandle, JoinOutcome) {
        let mut rng = rand::rng();
        let room_id = loop {
            let id = RoomId::random(&mut rng);
            if !self.repository.contains(&id) {
                break id;
            }
        };
        let player_id = PlayerId::random(&mut rng);

        let creator = Player::new(
            player_id.clone(),
            request.name,
            self.config.starting_gold,
            request.start_space,
        );
        let handle = spawn_room(
            NewRoom {
                room_id: room_id.clone(),
                creator,
                grid: request.grid,
                memory_mode: request.memory_mode,
                random_start_space: request.random_start_space,
            },
            self.config.clone(),
            sender,
        );
        self.repository.put(handle.clone());
        tracing::info!(%room_id, %player_id, start_space = request.start_space, "room created");

        let outcome = JoinOutcome {
            player_id,
            memory_mode: request.memory_mode,
            random_start_space: request.random_start_space,
            reconnected: false,
        };
        (handle, outcome)
    }

    /// Looks up a room.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if no such room is running.
    pub fn get(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        self.repository
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    /// Shuts a room down and forgets it.
    pub async fn destroy_room(&mut self, room_id: &RoomId) -> Result<(), RoomError> {
        let handle = self
            .repository
            .delete(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        let _ = handle.shutdown().await;
        tracing::info!(%room_id, "room destroyed");
        Ok(())
    }

    /// Deletes every room `is_live` reports as having no connected player.
    /// Returns the ids of the rooms removed.
    pub async fn sweep_abandoned(
        &mut self,
        is_live: &(dyn Fn(&RoomId) -> bool + Sync),
    ) -> Vec<RoomId> {
        let removed = self.repository.sweep_abandoned(is_live);
        let mut ids = Vec::with_capacity(removed.len());
        for handle in removed {
            let _ = handle.shutdown().await;
            tracing::info!(room_id = %handle.room_id(), "abandoned room deleted");
            ids.push(handle.room_id().clone());
        }
        ids
    }

    pub fn room_count(&self) -> usize {
        self.repository.len()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.repository.room_ids()
    }
}
