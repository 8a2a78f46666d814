use log::{debug, info, warn};
use shared::{Apple, Packet, Snake, SnakeState};
use std::collections::HashMap;

/// What the network layer has to do after a packet was applied
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    /// The local snake died and was reset; ask the server to respawn it
    RequestRespawn,
    Disconnected(String),
}

/// Everything a participant knows about the arena
pub struct ClientGameState {
    pub nickname: String,
    pub client_id: Option<u32>,
    pub snake: Snake,
    pub remote_snakes: HashMap<String, Snake>,
    pub apples: Vec<Apple>,
}

impl ClientGameState {
    pub fn new(nickname: &str) -> Self {
        Self {
            nickname: nickname.trim().to_string(),
            client_id: None,
            snake: Snake::new(),
            remote_snakes: HashMap::new(),
            apples: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client_id.is_some()
    }

    /// Advances the local snake. Nothing moves before the handshake completes.
    pub fn update(&mut self, dt: f32) {
        if self.is_connected() {
            self.snake.update(dt);
        }
    }

    pub fn apply_packet(&mut self, packet: Packet) -> Option<ClientAction> {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.snake = Snake::new();
                self.remote_snakes.clear();
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.client_id = None;
                return Some(ClientAction::Disconnected(reason));
            }

            Packet::SnakeAdded { nickname, state } => {
                debug!("{} joined", nickname);
                let mut snake = Snake::new();
                if let Err(e) = snake.apply_state(state) {
                    warn!("Bad initial state for {}: {}", nickname, e);
                }
                self.remote_snakes.insert(nickname, snake);
            }

            Packet::SnakeUpdate { nickname, state } => {
                self.apply_remote_state(nickname, state);
            }

            Packet::Respawn => {
                info!("You died");
                self.snake.respawn();
                self.snake.protected = true;
                return Some(ClientAction::RequestRespawn);
            }

            Packet::SnakeDied { nickname } => {
                info!("{} died", nickname);
                if let Some(snake) = self.remote_snakes.get_mut(&nickname) {
                    snake.dead = true;
                }
            }

            Packet::SnakeRespawned { nickname } => {
                if let Some(snake) = self.remote_snakes.get_mut(&nickname) {
                    snake.respawn();
                    snake.protected = true;
                }
            }

            Packet::Apples {
                apples,
                consumed_by_you,
            } => {
                if consumed_by_you {
                    debug!("Apple eaten");
                    self.snake.grow();
                }
                self.apples = apples;
            }

            Packet::ProtectionEnd { nickname } => {
                if nickname == self.nickname {
                    self.snake.protected = false;
                } else if let Some(snake) = self.remote_snakes.get_mut(&nickname) {
                    snake.protected = false;
                }
            }

            Packet::SnakeDisconnected { nickname } => {
                info!("{} left", nickname);
                self.remote_snakes.remove(&nickname);
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }

        None
    }

    fn apply_remote_state(&mut self, nickname: String, state: SnakeState) {
        let snake = self.remote_snakes.entry(nickname).or_default();
        if let Err(e) = snake.apply_state(state) {
            warn!("Ignoring bad state update: {}", e);
        }
    }
}
