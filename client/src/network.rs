use crate::game::{ClientAction, ClientGameState};
use crate::input::{parse_command, Command, InputManager};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::{interval, MissedTickBehavior};

/// Longest frame step fed to the simulator
pub const MAX_FRAME_DT: f32 = 0.05;

/// How long to wait for `Connected` before asking again
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,

    game_state: ClientGameState,
    input_manager: InputManager,

    frame_duration: Duration,
    last_connect_attempt: Option<Instant>,
    connect_retry: Duration,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        nickname: &str,
        fps: u32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            game_state: ClientGameState::new(nickname),
            input_manager: InputManager::new(),
            frame_duration: Duration::from_secs_f32(1.0 / fps.max(1) as f32),
            last_connect_attempt: None,
            connect_retry: CONNECT_RETRY_INTERVAL,
        })
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub fn input_manager_mut(&mut self) -> &mut InputManager {
        &mut self.input_manager
    }

    pub async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server as {}...", self.game_state.nickname);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            nickname: self.game_state.nickname.clone(),
        };
        self.send_packet(&packet).await?;
        self.last_connect_attempt = Some(Instant::now());

        Ok(())
    }

    /// Sends `Connect` again if the previous attempt went unanswered.
    async fn retry_connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let due = self
            .last_connect_attempt
            .map_or(false, |at| at.elapsed() >= self.connect_retry);
        if due {
            debug!("No answer from server yet, connecting again");
            self.connect().await?;
        }
        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Applies a server packet. Returns false once the server has closed the
    /// session.
    pub async fn handle_packet(&mut self, packet: Packet) -> Result<bool, Box<dyn std::error::Error>> {
        match self.game_state.apply_packet(packet) {
            Some(ClientAction::RequestRespawn) => {
                self.input_manager.clear();
                let sequence = self.input_manager.next_sequence();
                self.send_packet(&Packet::RespawnRequest { sequence }).await?;
                Ok(true)
            }
            Some(ClientAction::Disconnected(_)) => Ok(false),
            None => Ok(true),
        }
    }

    /// Runs one frame: applies buffered turns, advances the local snake and
    /// reports the result. Until the handshake completes it only retries
    /// `Connect`.
    ///
    /// Lost `Respawn` or `RespawnRequest` datagrams need no timer here: the
    /// server repeats `Respawn` while reports keep arriving for a dead snake.
    pub async fn frame(&mut self, dt: f32) -> Result<(), Box<dyn std::error::Error>> {
        if !self.game_state.is_connected() {
            return self.retry_connect().await;
        }

        self.input_manager.apply_pending(&mut self.game_state.snake);
        self.game_state.update(dt.min(MAX_FRAME_DT));

        let packet = Packet::StateReport {
            sequence: self.input_manager.next_sequence(),
            state: self.game_state.snake.state(),
        };
        self.send_packet(&packet).await
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut frame_interval = interval(self.frame_duration);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_frame = Instant::now();

        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        let mut buffer = vec![0u8; 65_536];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                if !self.handle_packet(packet).await? {
                                    break;
                                }
                            } else {
                                warn!("Failed to deserialize packet from server");
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = frame_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;

                    if let Err(e) = self.frame(dt).await {
                        error!("Error sending state: {}", e);
                    }
                },

                line = stdin.next_line(), if stdin_open => {
                    match line {
                        Ok(Some(line)) => match parse_command(&line) {
                            Some(Command::Turn(direction)) => {
                                self.input_manager.queue_turn(direction);
                            },
                            Some(Command::Quit) => break,
                            None => debug!("Ignoring input {:?}", line),
                        },
                        Ok(None) => stdin_open = false,
                        Err(e) => {
                            error!("Error reading stdin: {}", e);
                            stdin_open = false;
                        }
                    }
                },
            }
        }

        if self.game_state.is_connected() {
            if let Err(e) = self.send_packet(&Packet::Disconnect).await {
                warn!("Failed to send disconnect: {}", e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Direction, Snake};

    async fn fake_server() -> (UdpSocket, String) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap().to_string();
        (socket, addr)
    }

    async fn recv_packet(socket: &UdpSocket) -> Packet {
        let mut buffer = vec![0u8; 65_536];
        let (len, _) = tokio::time::timeout(Duration::from_secs(1), socket.recv_from(&mut buffer))
            .await
            .unwrap()
            .unwrap();
        deserialize(&buffer[..len]).unwrap()
    }

    #[tokio::test]
    async fn test_connect_sends_nickname() {
        let (server, addr) = fake_server().await;
        let mut client = Client::new(&addr, "viper", 60).await.unwrap();

        client.connect().await.unwrap();

        match recv_packet(&server).await {
            Packet::Connect {
                client_version,
                nickname,
            } => {
                assert_eq!(client_version, PROTOCOL_VERSION);
                assert_eq!(nickname, "viper");
            }
            other => panic!("Unexpected packet: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unanswered_connect_is_retried() {
        let (server, addr) = fake_server().await;
        let mut client = Client::new(&addr, "viper", 60).await.unwrap();
        client.connect_retry = Duration::ZERO;

        client.connect().await.unwrap();
        assert!(matches!(recv_packet(&server).await, Packet::Connect { .. }));

        client.frame(0.016).await.unwrap();
        assert!(matches!(recv_packet(&server).await, Packet::Connect { .. }));

        client
            .handle_packet(Packet::Connected { client_id: 1 })
            .await
            .unwrap();
        client.frame(0.016).await.unwrap();
        assert!(matches!(recv_packet(&server).await, Packet::StateReport { .. }));
    }

    #[tokio::test]
    async fn test_repeated_respawn_requests_again() {
        let (server, addr) = fake_server().await;
        let mut client = Client::new(&addr, "viper", 60).await.unwrap();
        client
            .handle_packet(Packet::Connected { client_id: 1 })
            .await
            .unwrap();

        client.handle_packet(Packet::Respawn).await.unwrap();
        client.frame(0.016).await.unwrap();
        client.handle_packet(Packet::Respawn).await.unwrap();

        let mut sequences = Vec::new();
        for _ in 0..3 {
            match recv_packet(&server).await {
                Packet::RespawnRequest { sequence } | Packet::StateReport { sequence, .. } => {
                    sequences.push(sequence)
                }
                other => panic!("Unexpected packet: {:?}", other),
            }
        }
        assert!(sequences.windows(2).all(|pair| pair[1] > pair[0]));
        assert_eq!(client.game_state().snake.head(), Snake::spawn_point());
    }

    #[tokio::test]
    async fn test_no_reports_before_handshake() {
        let (server, addr) = fake_server().await;
        let mut client = Client::new(&addr, "viper", 60).await.unwrap();

        client.frame(0.016).await.unwrap();

        let mut buffer = [0u8; 64];
        let result =
            tokio::time::timeout(Duration::from_millis(50), server.recv_from(&mut buffer)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_frames_report_with_increasing_sequence() {
        let (server, addr) = fake_server().await;
        let mut client = Client::new(&addr, "viper", 60).await.unwrap();
        client
            .handle_packet(Packet::Connected { client_id: 1 })
            .await
            .unwrap();

        client.frame(0.016).await.unwrap();
        client.input_manager_mut().queue_turn(Direction::Left);
        client.frame(1.0).await.unwrap();

        let first = recv_packet(&server).await;
        let second = recv_packet(&server).await;
        match (first, second) {
            (
                Packet::StateReport { sequence: a, .. },
                Packet::StateReport {
                    sequence: b,
                    state,
                },
            ) => {
                assert!(b > a);
                assert_eq!(state.direction, Direction::Left);
            }
            other => panic!("Unexpected packets: {:?}", other),
        }

        // A long frame is clamped
        let head = client.game_state().snake.head();
        assert!(head.y > Snake::spawn_point().y - 2.0);
    }

    #[tokio::test]
    async fn test_respawn_is_requested() {
        let (server, addr) = fake_server().await;
        let mut client = Client::new(&addr, "viper", 60).await.unwrap();
        client
            .handle_packet(Packet::Connected { client_id: 1 })
            .await
            .unwrap();
        client.frame(0.016).await.unwrap();

        assert!(client.handle_packet(Packet::Respawn).await.unwrap());

        let report = recv_packet(&server).await;
        let respawn = recv_packet(&server).await;
        match (report, respawn) {
            (Packet::StateReport { sequence: a, .. }, Packet::RespawnRequest { sequence: b }) => {
                assert!(b > a);
            }
            other => panic!("Unexpected packets: {:?}", other),
        }
    }

    #[test]
    fn test_server_disconnect_stops_client() {
        tokio_test::block_on(async {
            let (_server, addr) = fake_server().await;
            let mut client = Client::new(&addr, "viper", 60).await.unwrap();

            let keep_going = client
                .handle_packet(Packet::Disconnected {
                    reason: "Server full".to_string(),
                })
                .await
                .unwrap();

            assert!(!keep_going);
        });
    }
}
