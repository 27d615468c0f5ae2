//! The client session: handshake, login choreography, the inbound dispatch
//! loop with its built-in protocol reactions, and the keep-alive watchdog.

use std::future::Future;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use redstone_buf::{BufError, ByteCursor};
use redstone_proto::clientbound::{
    BlockChange, ChatMessage, Clientbound, ChunkData, Disconnect, EntityLookAndRelativeMove,
    EntityRelativeMove, EntityTeleport, JoinGame, KeepAlive, Map, MultiBlockChange,
    PlayerAbilities, PlayerPositionAndLook, PluginMessage, SetSlot, SpawnPlayer, TimeUpdate,
    UpdateHealth, WindowItems,
};
use redstone_proto::status::StatusResponse;
use redstone_proto::{serverbound, ProtoError, PROTOCOL_VERSION};
use redstone_world::{Chunk, Entities, World};

use crate::auth::{Credentials, SessionService};
use crate::connection::Connection;
use crate::crypto;
use crate::error::ClientError;
use crate::timer::Timer;

/// The server kicks clients that miss keep-alives for 30 seconds; disconnect
/// ourselves a little earlier when the server goes silent.
const KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(20);

/// Cadence of the cooperative game loop.
const GAME_LOOP_PERIOD: Duration = Duration::from_millis(15);

/// Connection state requested by the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Status = 1,
    Login = 2,
}

/// A connection to a server plus the client-side state it feeds: the block
/// world, the entity registry and the player position.
///
/// Subclass-style use goes through [`EventHandler`]: the client performs the
/// protocol-mandated reactions itself (keep-alive echo, teleport confirms,
/// registry upkeep) and then forwards every packet to the handler.
pub struct Client {
    conn: Arc<Connection>,
    host: String,
    port: u16,
    pub world: Mutex<World>,
    pub entities: Mutex<Entities>,
    position: Mutex<Option<(f64, f64, f64)>>,
    dimension: AtomicI32,
    watchdog: Timer,
    closed: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
}

impl Client {
    pub async fn connect(host: impl Into<String>, port: u16) -> Result<Arc<Self>, ClientError> {
        let host = host.into();
        let conn = Arc::new(Connection::connect(&host, port).await?);
        let (closed, closed_rx) = watch::channel(false);

        let watchdog = {
            let conn = conn.clone();
            let closed = closed.clone();
            Timer::new(KEEP_ALIVE_TIMEOUT, move || {
                let conn = conn.clone();
                let closed = closed.clone();
                async move {
                    info!("server did not send a keep-alive in time; disconnecting");
                    let _ = closed.send(true);
                    conn.shutdown().await;
                }
            })
        };

        Ok(Arc::new(Self {
            conn,
            host,
            port,
            world: Mutex::new(World::new()),
            entities: Mutex::new(Entities::new()),
            position: Mutex::new(None),
            dimension: AtomicI32::new(0),
            watchdog,
            closed,
            closed_rx,
        }))
    }

    /// Closes the connection. Tasks blocked in the dispatch loop unwind.
    pub async fn disconnect(&self) {
        self.watchdog.stop();
        let _ = self.closed.send(true);
        self.conn.shutdown().await;
    }

    /// The last position the server confirmed, if any.
    pub async fn position(&self) -> Option<(f64, f64, f64)> {
        *self.position.lock().await
    }

    // -----------------------------------------------------------------------
    // Login choreography
    // -----------------------------------------------------------------------

    pub async fn handshake(&self, state: HandshakeState) -> Result<(), ClientError> {
        let mut data = ByteCursor::new();
        data.write_varint32(PROTOCOL_VERSION);
        data.write_str(&self.host);
        data.write_u16(self.port);
        data.write_varint32(state as i32);
        self.conn.send(0, data.as_slice()).await?;
        Ok(())
    }

    /// Pings the server list endpoint and parses the JSON response.
    pub async fn status(&self) -> Result<StatusResponse, ClientError> {
        self.handshake(HandshakeState::Status).await?;
        self.conn.send(0, &[]).await?;

        let (pid, mut data) = self.conn.recv().await?;
        if pid != 0 {
            return Err(ClientError::UnexpectedPacket {
                got: pid,
                stage: "status",
            });
        }
        let body = data.read_str().map_err(ProtoError::from)?;
        Ok(StatusResponse::from_json(&body)?)
    }

    /// Runs the login state machine to completion and returns the player's
    /// `(uuid, name)`. Credentials and a session service are only needed for
    /// online-mode servers.
    pub async fn login(
        &self,
        username: &str,
        credentials: Option<&Credentials>,
        session: Option<&dyn SessionService>,
    ) -> Result<(String, String), ClientError> {
        self.handshake(HandshakeState::Login).await?;

        let mut data = ByteCursor::new();
        data.write_str(username);
        self.conn.send(0, data.as_slice()).await?;

        let (mut pid, mut data) = self.conn.recv().await?;

        // Encryption Request.
        if pid == 1 {
            self.setup_encryption(&mut data, credentials, session).await?;
            let next = self.conn.recv().await?;
            pid = next.0;
            data = next.1;
        }

        // Set Compression; a negative threshold leaves compression off.
        if pid == 3 {
            let threshold = data.read_varint32().map_err(ProtoError::from)?;
            if threshold >= 0 {
                debug!(threshold, "compression enabled");
                self.conn.set_compression(threshold);
            }
            let next = self.conn.recv().await?;
            pid = next.0;
            data = next.1;
        }

        // Login Success.
        if pid != 2 {
            return Err(ClientError::UnexpectedPacket {
                got: pid,
                stage: "login",
            });
        }
        let uuid = data.read_str().map_err(ProtoError::from)?;
        let name = data.read_str().map_err(ProtoError::from)?;
        info!(%name, %uuid, "logged in");
        self.watchdog.start();
        Ok((uuid, name))
    }

    async fn setup_encryption(
        &self,
        data: &mut ByteCursor,
        credentials: Option<&Credentials>,
        session: Option<&dyn SessionService>,
    ) -> Result<(), ClientError> {
        let server_id = data.read_str().map_err(ProtoError::from)?;
        let public_key = read_blob(data)?;
        let verify_token = read_blob(data)?;

        let mut shared_secret = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut shared_secret);

        // A server id of "-" is offline mode; anything else demands a
        // session-server join before the server will accept us.
        if server_id != "-" {
            let hash = crypto::server_hash(&server_id, &shared_secret, &public_key);
            let (credentials, session) = match (credentials, session) {
                (Some(credentials), Some(session)) => (credentials, session),
                _ => {
                    return Err(ClientError::AuthFailed(
                        "online-mode server but no credentials or session service".to_string(),
                    ))
                }
            };
            let joined = session
                .join(&credentials.access_token, &credentials.profile_id, &hash)
                .await?;
            if !joined {
                return Err(ClientError::AuthFailed(
                    "session server rejected the join".to_string(),
                ));
            }
        }

        let encrypted_secret = crypto::rsa_encrypt(&public_key, &shared_secret)?;
        let encrypted_token = crypto::rsa_encrypt(&public_key, &verify_token)?;

        let mut response = ByteCursor::new();
        response.write_varint32(encrypted_secret.len() as i32);
        response.write_bytes(&encrypted_secret);
        response.write_varint32(encrypted_token.len() as i32);
        response.write_bytes(&encrypted_token);
        self.conn.send(1, response.as_slice()).await?;

        // From here on every byte on the wire is ciphered.
        self.conn.enable_encryption(&shared_secret).await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dispatch loop
    // -----------------------------------------------------------------------

    /// Receives and dispatches packets until the connection closes. Handler
    /// errors are logged and do not end the loop; transport and framing
    /// errors do.
    pub async fn run(self: &Arc<Self>, handler: &mut dyn EventHandler) -> Result<(), ClientError> {
        let mut closed = self.closed_rx.clone();
        loop {
            let (pid, mut data) = tokio::select! {
                result = self.conn.recv() => match result {
                    Ok(packet) => packet,
                    Err(err) => {
                        if *closed.borrow() {
                            debug!("connection closed");
                            break;
                        }
                        self.disconnect().await;
                        return Err(err.into());
                    }
                },
                _ = closed.changed() => break,
            };

            match Clientbound::decode(pid, &mut data) {
                Ok(Some(packet)) => {
                    if data.remaining() > 0 {
                        warn!(pid, left = data.remaining(), "trailing bytes after packet");
                    }
                    if let Err(err) = self.react(&packet).await {
                        warn!(packet = packet.name(), %err, "error reacting to packet");
                    }
                    forward(self, handler, &packet).await;
                }
                Ok(None) => {
                    if let Err(err) = handler.on_unknown(self, pid, &mut data).await {
                        warn!(pid, %err, "handler error");
                    }
                }
                Err(err) => {
                    warn!(pid, %err, "malformed packet; disconnecting");
                    self.disconnect().await;
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    /// The protocol-mandated reaction to an inbound packet, applied before
    /// the user handler sees it.
    async fn react(self: &Arc<Self>, packet: &Clientbound) -> Result<(), ClientError> {
        match packet {
            Clientbound::KeepAlive(packet) => {
                self.watchdog.reset();
                debug!("responding to keep-alive");
                self.keep_alive(packet.id).await?;
                // Sent periodically or the server kicks us for floating.
                self.player(true).await?;
            }
            Clientbound::PlayerAbilities(_) => {
                debug!("responding to player abilities with client settings");
                self.plugin_message("LW|Mibomi", &[]).await?;
                self.client_settings("en_GB", 8, 0, false, 0x3f, 1).await?;
            }
            Clientbound::PlayerPositionAndLook(packet) => {
                debug!(x = packet.x, y = packet.y, z = packet.z, "received position");
                self.teleport_confirm(packet.teleport_id).await?;
                self.player_position_and_look(
                    packet.x,
                    packet.y,
                    packet.z,
                    packet.yaw,
                    packet.pitch,
                    true,
                )
                .await?;
                self.client_status(0).await?;
                *self.position.lock().await = Some((packet.x, packet.y, packet.z));
            }
            Clientbound::JoinGame(packet) => {
                info!(
                    entity_id = packet.entity_id,
                    dimension = packet.dimension,
                    "joined game"
                );
                self.dimension.store(packet.dimension, Ordering::Relaxed);
            }
            Clientbound::ChunkData(packet) => {
                let over_world = self.dimension.load(Ordering::Relaxed) == 0;
                match Chunk::decode(packet, over_world) {
                    Ok(chunk) => self.world.lock().await.feed_chunk(chunk),
                    Err(err) => {
                        warn!(x = packet.x, z = packet.z, %err, "dropping undecodable chunk");
                    }
                }
            }
            Clientbound::BlockChange(packet) => {
                let location = packet.location;
                let id = Chunk::get_block_id(packet.id);
                if let Err(err) = self
                    .world
                    .lock()
                    .await
                    .set_block(location.x, location.y, location.z, id)
                {
                    debug!(%err, "block change for an unloaded chunk");
                }
            }
            Clientbound::MultiBlockChange(packet) => {
                let mut world = self.world.lock().await;
                if let Some(chunk) = world.chunk_mut(packet.chunk_x, packet.chunk_z) {
                    for record in &packet.records {
                        let x = usize::from(record.h_pos >> 4);
                        let z = usize::from(record.h_pos & 0xf);
                        let id = Chunk::get_block_id(record.block_id);
                        if let Err(err) = chunk.set_block(x, usize::from(record.y), z, id) {
                            debug!(%err, "block record for an absent section");
                        }
                    }
                }
            }
            Clientbound::SpawnPlayer(packet) => {
                self.entities.lock().await.feed_player_spawn(packet);
            }
            Clientbound::EntityRelativeMove(packet) => {
                self.entities.lock().await.feed_relative_move(
                    packet.entity_id,
                    packet.dx,
                    packet.dy,
                    packet.dz,
                );
            }
            Clientbound::EntityLookAndRelativeMove(packet) => {
                self.entities.lock().await.feed_relative_move(
                    packet.entity_id,
                    packet.dx,
                    packet.dy,
                    packet.dz,
                );
            }
            Clientbound::EntityTeleport(packet) => {
                self.entities
                    .lock()
                    .await
                    .feed_move(packet.entity_id, packet.x, packet.y, packet.z);
            }
            Clientbound::Disconnect(packet) => {
                info!(reason = %packet.reason, "server disconnected us");
                self.disconnect().await;
            }
            _ => {}
        }
        Ok(())
    }

    /// Spawns the cooperative game loop: `f(dt)` roughly every 15 ms until
    /// the connection closes.
    pub fn spawn_game_loop<F, Fut>(self: &Arc<Self>, mut f: F) -> tokio::task::JoinHandle<()>
    where
        F: FnMut(Duration) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut closed = self.closed_rx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(GAME_LOOP_PERIOD);
            let mut last = tokio::time::Instant::now();
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = tokio::time::Instant::now();
                        f(now - last).await;
                        last = now;
                    }
                    _ = closed.changed() => break,
                }
            }
        })
    }

    // -----------------------------------------------------------------------
    // Outbound API
    // -----------------------------------------------------------------------

    /// Sends a packet produced by one of the generated builders.
    pub async fn send_packet(&self, packet: (i32, Vec<u8>)) -> Result<(), ClientError> {
        let (pid, payload) = packet;
        self.conn.send(pid, &payload).await?;
        Ok(())
    }

    pub async fn keep_alive(&self, id: i64) -> Result<(), ClientError> {
        self.send_packet(serverbound::keep_alive(id)?).await
    }

    pub async fn chat(&self, message: &str) -> Result<(), ClientError> {
        self.send_packet(serverbound::chat(message)?).await
    }

    pub async fn player(&self, on_ground: bool) -> Result<(), ClientError> {
        self.send_packet(serverbound::player(on_ground)?).await
    }

    pub async fn plugin_message(&self, channel: &str, data: &[u8]) -> Result<(), ClientError> {
        self.send_packet(serverbound::plugin_message(channel, data)?)
            .await
    }

    pub async fn client_status(&self, action_id: i32) -> Result<(), ClientError> {
        self.send_packet(serverbound::client_status(action_id)?)
            .await
    }

    pub async fn teleport_confirm(&self, teleport_id: i32) -> Result<(), ClientError> {
        self.send_packet(serverbound::teleport_confirm(teleport_id)?)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn client_settings(
        &self,
        locale: &str,
        view_distance: i8,
        chat_mode: i32,
        chat_colors: bool,
        displayed_skin_parts: u8,
        main_hand: i32,
    ) -> Result<(), ClientError> {
        self.send_packet(serverbound::client_settings(
            locale,
            view_distance,
            chat_mode,
            chat_colors,
            displayed_skin_parts,
            main_hand,
        )?)
        .await
    }

    pub async fn player_position_and_look(
        &self,
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    ) -> Result<(), ClientError> {
        self.send_packet(serverbound::player_position_and_look(
            x, y, z, yaw, pitch, on_ground,
        )?)
        .await
    }

    /// Dead-reckons a step of the given scale and reports the new position
    /// with a derived facing.
    pub async fn walk(&self, dx: f64, dy: f64, dz: f64, scale: f64) -> Result<(), ClientError> {
        let Some((mut x, y, mut z)) = *self.position.lock().await else {
            return Ok(());
        };
        let length = (dx * dx + dy * dy + dz * dz).sqrt();
        if length == 0.0 {
            return Ok(());
        }

        x += dx * scale;
        z += dz * scale;
        *self.position.lock().await = Some((x, y, z));

        let mut yaw = -dx.atan2(dz) / std::f64::consts::PI * 180.0;
        if yaw < 0.0 {
            yaw += 360.0;
        }
        let pitch = -(dy / length).asin() / std::f64::consts::PI * 180.0;
        self.player_position_and_look(x, y, z, yaw as f32, pitch as f32, true)
            .await
    }
}

fn read_blob(data: &mut ByteCursor) -> Result<Vec<u8>, ProtoError> {
    let len = data.read_varint32()?;
    if len < 0 {
        return Err(BufError::NegativeLength(len).into());
    }
    Ok(data.read_exact(len as usize)?.to_vec())
}

async fn forward(client: &Arc<Client>, handler: &mut dyn EventHandler, packet: &Clientbound) {
    let result = match packet {
        Clientbound::SpawnPlayer(p) => handler.on_spawn_player(client, p).await,
        Clientbound::BlockChange(p) => handler.on_block_change(client, p).await,
        Clientbound::ChatMessage(p) => handler.on_chat_message(client, p).await,
        Clientbound::MultiBlockChange(p) => handler.on_multi_block_change(client, p).await,
        Clientbound::WindowItems(p) => handler.on_window_items(client, p).await,
        Clientbound::SetSlot(p) => handler.on_set_slot(client, p).await,
        Clientbound::PluginMessage(p) => handler.on_plugin_message(client, p).await,
        Clientbound::Disconnect(p) => handler.on_disconnect(client, p).await,
        Clientbound::KeepAlive(p) => handler.on_keep_alive(client, p).await,
        Clientbound::ChunkData(p) => handler.on_chunk_data(client, p).await,
        Clientbound::JoinGame(p) => handler.on_join_game(client, p).await,
        Clientbound::Map(p) => handler.on_map(client, p).await,
        Clientbound::EntityRelativeMove(p) => handler.on_entity_relative_move(client, p).await,
        Clientbound::EntityLookAndRelativeMove(p) => {
            handler.on_entity_look_and_relative_move(client, p).await
        }
        Clientbound::PlayerAbilities(p) => handler.on_player_abilities(client, p).await,
        Clientbound::PlayerPositionAndLook(p) => {
            handler.on_player_position_and_look(client, p).await
        }
        Clientbound::UpdateHealth(p) => handler.on_update_health(client, p).await,
        Clientbound::TimeUpdate(p) => handler.on_time_update(client, p).await,
        Clientbound::EntityTeleport(p) => handler.on_entity_teleport(client, p).await,
    };
    if let Err(err) = result {
        warn!(packet = packet.name(), %err, "handler error");
    }
}

/// Per-packet callbacks for a concrete bot. Every method has a default that
/// falls through to [`EventHandler::on_generic`], so implementations override
/// only what they care about.
#[async_trait]
pub trait EventHandler: Send {
    async fn on_generic(
        &mut self,
        client: &Arc<Client>,
        name: &'static str,
    ) -> Result<(), ClientError> {
        let _ = client;
        debug!(packet = name, "unhandled packet");
        Ok(())
    }

    async fn on_unknown(
        &mut self,
        client: &Arc<Client>,
        pid: i32,
        data: &mut ByteCursor,
    ) -> Result<(), ClientError> {
        let _ = (client, data);
        debug!(pid, "unknown packet");
        Ok(())
    }

    async fn on_spawn_player(
        &mut self,
        client: &Arc<Client>,
        packet: &SpawnPlayer,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, SpawnPlayer::NAME).await
    }

    async fn on_block_change(
        &mut self,
        client: &Arc<Client>,
        packet: &BlockChange,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, BlockChange::NAME).await
    }

    async fn on_chat_message(
        &mut self,
        client: &Arc<Client>,
        packet: &ChatMessage,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, ChatMessage::NAME).await
    }

    async fn on_multi_block_change(
        &mut self,
        client: &Arc<Client>,
        packet: &MultiBlockChange,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, MultiBlockChange::NAME).await
    }

    async fn on_window_items(
        &mut self,
        client: &Arc<Client>,
        packet: &WindowItems,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, WindowItems::NAME).await
    }

    async fn on_set_slot(
        &mut self,
        client: &Arc<Client>,
        packet: &SetSlot,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, SetSlot::NAME).await
    }

    async fn on_plugin_message(
        &mut self,
        client: &Arc<Client>,
        packet: &PluginMessage,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, PluginMessage::NAME).await
    }

    async fn on_disconnect(
        &mut self,
        client: &Arc<Client>,
        packet: &Disconnect,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, Disconnect::NAME).await
    }

    async fn on_keep_alive(
        &mut self,
        client: &Arc<Client>,
        packet: &KeepAlive,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, KeepAlive::NAME).await
    }

    async fn on_chunk_data(
        &mut self,
        client: &Arc<Client>,
        packet: &ChunkData,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, ChunkData::NAME).await
    }

    async fn on_join_game(
        &mut self,
        client: &Arc<Client>,
        packet: &JoinGame,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, JoinGame::NAME).await
    }

    async fn on_map(&mut self, client: &Arc<Client>, packet: &Map) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, Map::NAME).await
    }

    async fn on_entity_relative_move(
        &mut self,
        client: &Arc<Client>,
        packet: &EntityRelativeMove,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, EntityRelativeMove::NAME).await
    }

    async fn on_entity_look_and_relative_move(
        &mut self,
        client: &Arc<Client>,
        packet: &EntityLookAndRelativeMove,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, EntityLookAndRelativeMove::NAME).await
    }

    async fn on_player_abilities(
        &mut self,
        client: &Arc<Client>,
        packet: &PlayerAbilities,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, PlayerAbilities::NAME).await
    }

    async fn on_player_position_and_look(
        &mut self,
        client: &Arc<Client>,
        packet: &PlayerPositionAndLook,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, PlayerPositionAndLook::NAME).await
    }

    async fn on_update_health(
        &mut self,
        client: &Arc<Client>,
        packet: &UpdateHealth,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, UpdateHealth::NAME).await
    }

    async fn on_time_update(
        &mut self,
        client: &Arc<Client>,
        packet: &TimeUpdate,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, TimeUpdate::NAME).await
    }

    async fn on_entity_teleport(
        &mut self,
        client: &Arc<Client>,
        packet: &EntityTeleport,
    ) -> Result<(), ClientError> {
        let _ = packet;
        self.on_generic(client, EntityTeleport::NAME).await
    }
}
