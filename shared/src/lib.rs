pub mod geometry;
pub mod snake;

pub use geometry::{Direction, Point, Rect};
pub use snake::{Snake, SnakeState, StateError};

use serde::{Deserialize, Serialize};

pub const BLOCK_SIZE: f32 = 1.0;
pub const ARENA_SIZE: f32 = 40.0;
pub const PLAYER_SPEED: f32 = 10.0 * BLOCK_SIZE;
pub const STARTER_LENGTH: f32 = 3.0 * BLOCK_SIZE;
pub const SPAWN_PROTECTION_SECS: f32 = 3.0;
pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_BODY_POINTS: usize = 2048;
pub const MAX_NICKNAME_LEN: usize = 16;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Apple {
    pub id: u32,
    pub position: Point,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        nickname: String,
    },
    StateReport {
        sequence: u32,
        state: SnakeState,
    },
    RespawnRequest {
        sequence: u32,
    },
    Disconnect,

    Connected {
        client_id: u32,
    },
    Disconnected {
        reason: String,
    },
    SnakeAdded {
        nickname: String,
        state: SnakeState,
    },
    SnakeUpdate {
        nickname: String,
        state: SnakeState,
    },
    /// Private death signal: the receiver must respawn.
    Respawn,
    SnakeDied {
        nickname: String,
    },
    SnakeRespawned {
        nickname: String,
    },
    Apples {
        apples: Vec<Apple>,
        consumed_by_you: bool,
    },
    ProtectionEnd {
        nickname: String,
    },
    SnakeDisconnected {
        nickname: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_constants() {
        assert_eq!(PLAYER_SPEED, 10.0 * BLOCK_SIZE);
        assert_eq!(STARTER_LENGTH, 3.0 * BLOCK_SIZE);
        assert!(ARENA_SIZE > 2.0 * BLOCK_SIZE);
        assert!(SPAWN_PROTECTION_SECS > 0.0);
    }

    #[test]
    fn test_packet_serialization_connect() {
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            nickname: "viper".to_string(),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Connect {
                client_version,
                nickname,
            } => {
                assert_eq!(client_version, PROTOCOL_VERSION);
                assert_eq!(nickname, "viper");
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_state_report() {
        let snake = Snake::new();
        let packet = Packet::StateReport {
            sequence: 123,
            state: snake.state(),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::StateReport { sequence, state } => {
                assert_eq!(sequence, 123);
                assert_eq!(state, snake.state());
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_apples() {
        let apples = vec![
            Apple {
                id: 1,
                position: Point::new(10.0, 10.0),
            },
            Apple {
                id: 2,
                position: Point::new(3.0, 17.0),
            },
        ];

        let packet = Packet::Apples {
            apples: apples.clone(),
            consumed_by_you: true,
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Apples {
                apples: received,
                consumed_by_you,
            } => {
                assert!(consumed_by_you);
                assert_eq!(received, apples);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_largest_report_fits_in_a_datagram() {
        let mut snake = Snake::new();
        snake.body = vec![Point::new(1.0, 1.0); MAX_BODY_POINTS];

        let packet = Packet::StateReport {
            sequence: u32::MAX,
            state: snake.state(),
        };
        let serialized = bincode::serialize(&packet).unwrap();

        assert!(serialized.len() < 65_507);
    }
}
