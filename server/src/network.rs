//! Server network layer handling UDP communications and the referee loop

use crate::apples::AppleRegistry;
use crate::config::ServerConfig;
use crate::referee::{Effect, Recipient, Referee};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PROTOCOL_VERSION};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::interval;

/// Large enough for any datagram UDP can deliver
const RECV_BUFFER_SIZE: usize = 65_536;

/// Messages sent from network tasks and timers to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ProtectionExpired {
        client_id: u32,
        generation: u64,
    },
    Shutdown,
}

/// Messages sent from the server loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        addrs: Vec<SocketAddr>,
    },
}

/// Main server coordinating networking, timers and the referee
pub struct Server {
    socket: Arc<UdpSocket>,
    referee: Referee,
    apples: AppleRegistry,
    config: ServerConfig,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> io::Result<Self> {
        let apples = AppleRegistry::new(config.apple_count);
        Self::with_apples(addr, config, apples).await
    }

    /// Like [`Server::new`] but with a caller-provided apple registry.
    pub async fn with_apples(
        addr: &str,
        config: ServerConfig,
        apples: AppleRegistry,
    ) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            referee: Referee::new(config.max_clients),
            apples,
            config,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender into the main loop; send [`ServerMessage::Shutdown`] to stop it.
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn referee(&self) -> &Referee {
        &self.referee
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; RECV_BUFFER_SIZE];

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
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, &[addr]).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, addrs } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, &addrs).await {
                            error!("Failed to broadcast packet: {}", e);
                        }
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addrs: &[SocketAddr],
    ) -> io::Result<()> {
        let data = serialize(packet).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        for &addr in addrs {
            // One unreachable peer must not starve the rest of a broadcast
            if let Err(e) = socket.send_to(&data, addr).await {
                warn!("Failed to send to {}: {}", addr, e);
            }
        }
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, addrs: Vec<SocketAddr>) {
        if addrs.is_empty() {
            return;
        }
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket { packet, addrs }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Addresses a recipient currently maps to
    fn resolve(&self, to: Recipient) -> Vec<SocketAddr> {
        let sessions = self.referee.sessions();
        match to {
            Recipient::Session(id) => sessions.get(id).map(|s| s.addr).into_iter().collect(),
            Recipient::AllExcept(excluded) => sessions
                .iter()
                .filter(|s| s.id != excluded)
                .map(|s| s.addr)
                .collect(),
            Recipient::All => sessions.iter().map(|s| s.addr).collect(),
        }
    }

    fn apply_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { to, packet } => {
                    let addrs = self.resolve(to);
                    self.broadcast_packet(packet, addrs);
                }
                Effect::ArmProtection { session_id } => self.arm_protection(session_id),
            }
        }
    }

    /// Starts a fresh protection timer, replacing any pending one.
    fn arm_protection(&mut self, session_id: u32) {
        let Some(session) = self.referee.sessions_mut().get_mut(session_id) else {
            return;
        };

        let generation = session.begin_protection();
        let server_tx = self.server_tx.clone();
        let protection = self.config.protection;

        let timer = tokio::spawn(async move {
            tokio::time::sleep(protection).await;
            if let Err(e) = server_tx.send(ServerMessage::ProtectionExpired {
                client_id: session_id,
                generation,
            }) {
                debug!("Protection expiry for {} dropped: {}", session_id, e);
            }
        });
        session.set_protection_timer(timer);
    }

    /// Routes one incoming packet to the referee
    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let session_id = self.referee.sessions().find_by_addr(addr);

        match packet {
            Packet::Connect {
                client_version,
                nickname,
            } => {
                info!(
                    "Client {} connecting from {} (version: {})",
                    nickname, addr, client_version
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
                if let Some(existing_id) = session_id {
                    info!("Removing existing session {} from {}", existing_id, addr);
                    let effects = self.referee.handle_disconnect(existing_id);
                    self.apply_effects(effects);
                }

                match self.referee.join(addr, &nickname, &self.apples) {
                    Ok((_, effects)) => self.apply_effects(effects),
                    Err(e) => {
                        warn!("Refused {} from {}: {}", nickname, addr, e);
                        self.send_packet(
                            Packet::Disconnected {
                                reason: e.to_string(),
                            },
                            addr,
                        );
                    }
                }
            }

            Packet::StateReport { sequence, state } => {
                if let Some(session_id) = session_id {
                    let effects = self.referee.handle_state_report(
                        session_id,
                        sequence,
                        state,
                        &mut self.apples,
                    );
                    self.apply_effects(effects);
                }
            }

            Packet::RespawnRequest { sequence } => {
                if let Some(session_id) = session_id {
                    let effects = self.referee.handle_respawn(session_id, sequence);
                    self.apply_effects(effects);
                }
            }

            Packet::Disconnect => {
                if let Some(session_id) = session_id {
                    let effects = self.referee.handle_disconnect(session_id);
                    self.apply_effects(effects);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> io::Result<()> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut sweep_interval = interval(self.config.sweep_interval);

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network and timer events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr);
                        },
                        Some(ServerMessage::ProtectionExpired { client_id, generation }) => {
                            let effects = self.referee.handle_protection_expired(client_id, generation);
                            self.apply_effects(effects);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Drop sessions that went quiet
                _ = sweep_interval.tick() => {
                    let effects = self.referee.expire_idle(self.config.client_timeout);
                    self.apply_effects(effects);

                    let session_count = self.referee.sessions().len();
                    if session_count > 0 {
                        debug!("{} sessions, {} apples", session_count, self.apples.len());
                    }
                },
            }
        }

        let addrs = self.resolve(Recipient::All);
        if let Err(e) = Self::send_packet_impl(
            &self.socket,
            &Packet::Disconnected {
                reason: "Server shutting down".to_string(),
            },
            &addrs,
        )
        .await
        {
            warn!("Failed to notify clients of shutdown: {}", e);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn test_addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    async fn create_test_server(config: ServerConfig) -> Server {
        let apples = AppleRegistry::from_positions(&[], StdRng::seed_from_u64(0));
        Server::with_apples("127.0.0.1:0", config, apples)
            .await
            .unwrap()
    }

    fn join(server: &mut Server, port: u16, nickname: &str) {
        server.handle_packet(
            Packet::Connect {
                client_version: PROTOCOL_VERSION,
                nickname: nickname.to_string(),
            },
            test_addr(port),
        );
    }

    #[test]
    fn test_server_binds_ephemeral_port() {
        tokio_test::block_on(async {
            let server = create_test_server(ServerConfig::default()).await;
            assert_ne!(server.local_addr().unwrap().port(), 0);
        });
    }

    #[tokio::test]
    async fn test_resolve_recipients() {
        let mut server = create_test_server(ServerConfig::default()).await;
        join(&mut server, 9001, "viper");
        join(&mut server, 9002, "adder");

        let viper = server.referee().sessions().find_by_nickname("viper").unwrap();

        assert_eq!(server.resolve(Recipient::Session(viper)), vec![test_addr(9001)]);
        assert_eq!(server.resolve(Recipient::AllExcept(viper)), vec![test_addr(9002)]);
        assert_eq!(server.resolve(Recipient::All).len(), 2);
        assert!(server.resolve(Recipient::Session(999)).is_empty());
    }

    #[tokio::test]
    async fn test_version_mismatch_is_refused() {
        let mut server = create_test_server(ServerConfig::default()).await;

        server.handle_packet(
            Packet::Connect {
                client_version: PROTOCOL_VERSION + 1,
                nickname: "viper".to_string(),
            },
            test_addr(9001),
        );

        assert!(server.referee().sessions().is_empty());
        match server.game_rx.try_recv().unwrap() {
            GameMessage::SendPacket {
                packet: Packet::Disconnected { reason },
                addr,
            } => {
                assert_eq!(addr, test_addr(9001));
                assert!(reason.contains("version"));
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reconnect_replaces_session() {
        let mut server = create_test_server(ServerConfig::default()).await;
        join(&mut server, 9001, "viper");
        let first = server.referee().sessions().find_by_addr(test_addr(9001)).unwrap();

        join(&mut server, 9001, "viper");
        let second = server.referee().sessions().find_by_addr(test_addr(9001)).unwrap();

        assert_ne!(first, second);
        assert_eq!(server.referee().sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_reports_from_unknown_addresses_ignored() {
        let mut server = create_test_server(ServerConfig::default()).await;

        server.handle_packet(
            Packet::StateReport {
                sequence: 1,
                state: shared::Snake::new().state(),
            },
            test_addr(9001),
        );
        server.handle_packet(Packet::RespawnRequest { sequence: 2 }, test_addr(9001));

        assert!(server.game_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_protection_timer_fires_once() {
        let config = ServerConfig {
            protection: Duration::from_millis(20),
            ..ServerConfig::default()
        };
        let mut server = create_test_server(config).await;
        join(&mut server, 9001, "viper");
        let id = server.referee().sessions().find_by_nickname("viper").unwrap();
        assert!(server.referee().sessions().get(id).unwrap().has_protection_timer());

        // Re-arming cancels the first timer.
        server.arm_protection(id);
        let generation = server.referee().sessions().get(id).unwrap().protection_generation();

        let message = tokio::time::timeout(Duration::from_secs(1), server.server_rx.recv())
            .await
            .unwrap()
            .unwrap();
        match message {
            ServerMessage::ProtectionExpired {
                client_id,
                generation: fired,
            } => {
                assert_eq!(client_id, id);
                assert_eq!(fired, generation);
            }
            other => panic!("Unexpected message: {:?}", other),
        }

        let second = tokio::time::timeout(Duration::from_millis(100), server.server_rx.recv()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_cancels_protection_timer() {
        let config = ServerConfig {
            protection: Duration::from_millis(20),
            ..ServerConfig::default()
        };
        let mut server = create_test_server(config).await;
        join(&mut server, 9001, "viper");

        server.handle_packet(Packet::Disconnect, test_addr(9001));
        assert!(server.referee().sessions().is_empty());

        let message = tokio::time::timeout(Duration::from_millis(100), server.server_rx.recv()).await;
        assert!(message.is_err());
    }

    #[tokio::test]
    async fn test_effects_reach_resolved_addresses() {
        let mut server = create_test_server(ServerConfig::default()).await;
        join(&mut server, 9001, "viper");
        join(&mut server, 9002, "adder");
        join(&mut server, 9003, "cobra");
        while server.game_rx.try_recv().is_ok() {}

        let viper = server.referee().sessions().find_by_nickname("viper").unwrap();
        server.apply_effects(vec![
            Effect::Send {
                to: Recipient::AllExcept(viper),
                packet: Packet::SnakeDied {
                    nickname: "viper".to_string(),
                },
            },
            // Nobody left to receive this one
            Effect::Send {
                to: Recipient::Session(999),
                packet: Packet::Respawn,
            },
        ]);

        match server.game_rx.try_recv().unwrap() {
            GameMessage::BroadcastPacket {
                packet: Packet::SnakeDied { nickname },
                addrs,
            } => {
                assert_eq!(nickname, "viper");
                assert_eq!(addrs, vec![test_addr(9002), test_addr(9003)]);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
        assert!(server.game_rx.try_recv().is_err());
    }
}
