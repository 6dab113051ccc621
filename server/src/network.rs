//! Server network layer handling UDP communications and the arena loop

use crate::client_manager::ClientManager;
use crate::error::Rejection;
use crate::lobby::Lobby;
use crate::registry::{RoomRegistry, Update};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ClientId, Packet, Role, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: ClientId,
    },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    Multicast {
        packet: Packet,
        addrs: Vec<SocketAddr>,
    },
}

/// Main server coordinating networking, sessions and rooms
///
/// The registry and lobby are owned by the loop in [`Server::run`]; helper
/// tasks only move bytes and report timeouts, so every room mutation happens
/// on one task in arrival order.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    lobby: Lobby,
    registry: RoomRegistry,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        client_timeout: Duration,
        registry: RoomRegistry,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients, client_timeout))),
            lobby: Lobby::new(),
            registry,
            tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle that makes [`Server::run`] return.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::Multicast { packet, addrs } => {
                        for addr in addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn reject(&self, rejection: Rejection, addr: SocketAddr) {
        debug!("Rejecting request from {}: {}", addr, rejection);
        self.send_packet(
            Packet::Rejected {
                reason: rejection.to_string(),
            },
            addr,
        );
    }

    /// Sends the projection and every notification to all room members.
    async fn broadcast_update(&self, code: &str, update: Update) {
        let addrs: Vec<SocketAddr> = {
            let clients = self.clients.read().await;
            self.lobby
                .members(code)
                .into_iter()
                .filter_map(|id| clients.addr_of(id))
                .collect()
        };
        if addrs.is_empty() {
            return;
        }

        let mut packets = vec![Packet::State(update.view)];
        packets.extend(update.notifications.into_iter().map(Packet::Notify));

        for packet in packets {
            if let Err(e) = self.game_tx.send(GameMessage::Multicast {
                packet,
                addrs: addrs.clone(),
            }) {
                error!("Failed to queue broadcast packet: {}", e);
            }
        }
    }

    async fn publish(&self, code: &str, result: Result<Update, Rejection>, addr: SocketAddr) {
        match result {
            Ok(update) => self.broadcast_update(code, update).await,
            Err(rejection) => self.reject(rejection, addr),
        }
    }

    /// Detaches a client from its room, closing the room if it emptied.
    async fn detach(&mut self, client_id: ClientId, now: Instant) {
        let Some(departure) = self.lobby.leave(client_id) else {
            return;
        };

        if departure.room_empty {
            self.registry.remove_room(&departure.code);
            return;
        }

        if let Ok(update) = self.registry.leave(&departure.code, client_id, now) {
            self.broadcast_update(&departure.code, update).await;
        }
    }

    async fn disconnect(&mut self, client_id: ClientId, now: Instant) {
        self.detach(client_id, now).await;
        let mut clients = self.clients.write().await;
        clients.remove_client(&client_id);
    }

    /// Processes incoming packets
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let now = Instant::now();

        if let Packet::Connect { client_version } = packet {
            self.handle_connect(client_version, addr, now).await;
            return;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.touch_addr(addr)
        };
        let Some(client_id) = client_id else {
            warn!("Packet from unknown client at {}", addr);
            return;
        };

        match packet {
            Packet::Heartbeat => {}

            Packet::Disconnect => self.disconnect(client_id, now).await,

            Packet::CreateRoom { password } => {
                self.detach(client_id, now).await;
                let code = self
                    .lobby
                    .create_room(client_id, &password, &mut rand::thread_rng());
                self.registry.create_room(&code);
                self.send_packet(
                    Packet::RoomJoined {
                        code: code.clone(),
                        role: Role::Host,
                    },
                    addr,
                );
                if let Some(view) = self.registry.view(&code, now) {
                    self.send_packet(Packet::State(view), addr);
                }
            }

            Packet::JoinRoom {
                code,
                password,
                role,
            } => {
                let elsewhere = self
                    .lobby
                    .membership(client_id)
                    .is_some_and(|(current, _)| current != code);
                if elsewhere {
                    self.detach(client_id, now).await;
                }
                match self.lobby.join(client_id, &code, &password, role) {
                    Ok(()) => {
                        self.send_packet(Packet::RoomJoined { code: code.clone(), role }, addr);
                        let seated = self
                            .registry
                            .room(&code)
                            .is_some_and(|room| room.seat_of(client_id).is_some());
                        if role == Role::Spectator && seated {
                            // Spectators never hold a seat.
                            let result = self.registry.leave(&code, client_id, now);
                            self.publish(&code, result, addr).await;
                        } else if let Some(view) = self.registry.view(&code, now) {
                            self.send_packet(Packet::State(view), addr);
                        }
                    }
                    Err(rejection) => self.reject(rejection, addr),
                }
            }

            Packet::LeaveRoom => self.detach(client_id, now).await,

            other => self.handle_room_packet(client_id, other, addr, now).await,
        }
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr, now: Instant) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // Remove existing connection if present
        let existing_client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };
        if let Some(existing_id) = existing_client_id {
            info!("Removing existing client {} from {}", existing_id, addr);
            self.disconnect(existing_id, now).await;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        let response = match client_id {
            Some(client_id) => Packet::Connected { client_id },
            None => Packet::Disconnected {
                reason: "Server full".to_string(),
            },
        };
        self.send_packet(response, addr);
    }

    /// Packets that act on the room the client is attached to.
    async fn handle_room_packet(
        &mut self,
        client_id: ClientId,
        packet: Packet,
        addr: SocketAddr,
        now: Instant,
    ) {
        let Some((code, role)) = self
            .lobby
            .membership(client_id)
            .map(|(code, role)| (code.to_string(), role))
        else {
            self.reject(Rejection::UnknownRoom, addr);
            return;
        };

        let seated = self
            .registry
            .room(&code)
            .is_some_and(|room| room.seat_of(client_id).is_some());

        let result = match packet {
            Packet::JoinSeat { seat, name, stats } => {
                if role == Role::Spectator {
                    Err(Rejection::NotAuthorized)
                } else {
                    self.registry
                        .join_seat(&code, client_id, seat, &name, &stats, now)
                }
            }
            Packet::StartMatch => {
                if self.lobby.can_control(client_id, seated) {
                    self.registry.start_match(&code, client_id, now)
                } else {
                    Err(Rejection::NotAuthorized)
                }
            }
            Packet::ResetMatch => {
                if self.lobby.can_control(client_id, seated) {
                    self.registry.reset_match(&code, client_id, now)
                } else {
                    Err(Rejection::NotAuthorized)
                }
            }
            Packet::Move { direction } => {
                self.registry.move_player(&code, client_id, direction, now)
            }
            Packet::Action { kind } => self.registry.act(&code, client_id, kind, now),
            other => {
                warn!("Unexpected packet type from client at {}: {:?}", addr, other);
                return;
            }
        };

        self.publish(&code, result, addr).await;
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        let mut ticks: u64 = 0;

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.detach(client_id, Instant::now()).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    for (code, update) in self.registry.tick(Instant::now()) {
                        self.broadcast_update(&code, update).await;
                    }

                    ticks += 1;
                    if ticks % 100 == 0 {
                        let client_count = self.clients.read().await.len();
                        debug!(
                            "Tick {}: {} clients, {} rooms",
                            ticks,
                            client_count,
                            self.registry.len()
                        );
                    }
                },
            }
        }

        Ok(())
    }
}
