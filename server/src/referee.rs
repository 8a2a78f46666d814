//! Authoritative death, apple and respawn arbitration
//!
//! The referee owns the session table and exposes one handler per input a
//! session can produce: join, state report, respawn request, protection
//! expiry and disconnect. Handlers never touch the network. They mutate the
//! session table (and the apple registry handed to them) and return the
//! [`Effect`]s the network layer must carry out, in order.
//!
//! Handlers run to completion one at a time on the server loop, so an apple
//! is observed, consumed and replaced before any other report is looked at.

use crate::apples::AppleRegistry;
use crate::sessions::{JoinError, SessionTable};
use log::{debug, info, trace, warn};
use shared::{Packet, SnakeState};
use std::net::SocketAddr;
use std::time::Duration;

/// Who a packet is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Session(u32),
    AllExcept(u32),
    All,
}

/// Side effects requested by a handler
#[derive(Debug, Clone)]
pub enum Effect {
    Send { to: Recipient, packet: Packet },
    /// (Re)start the spawn-protection timer of a session
    ArmProtection { session_id: u32 },
}

fn send(to: Recipient, packet: Packet) -> Effect {
    Effect::Send { to, packet }
}

/// Outcome of the first opponent the acting snake ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Crash {
    opponent_id: u32,
    acting_dies: bool,
    opponent_dies: bool,
}

pub struct Referee {
    sessions: SessionTable,
}

impl Referee {
    pub fn new(max_clients: usize) -> Self {
        Self {
            sessions: SessionTable::new(max_clients),
        }
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionTable {
        &mut self.sessions
    }

    /// Admits a participant and introduces it to everyone else.
    pub fn join(
        &mut self,
        addr: SocketAddr,
        nickname: &str,
        apples: &AppleRegistry,
    ) -> Result<(u32, Vec<Effect>), JoinError> {
        let mut effects = Vec::new();
        let session_id = self.sessions.add_session(addr, nickname)?;
        let (nickname, state) = match self.sessions.get(session_id) {
            Some(session) => (session.nickname.clone(), session.snake.state()),
            None => return Ok((session_id, effects)),
        };

        effects.push(send(
            Recipient::Session(session_id),
            Packet::Connected {
                client_id: session_id,
            },
        ));

        for other in self.sessions.iter().filter(|s| s.id != session_id) {
            effects.push(send(
                Recipient::Session(session_id),
                Packet::SnakeAdded {
                    nickname: other.nickname.clone(),
                    state: other.snake.state(),
                },
            ));
        }

        effects.push(send(
            Recipient::Session(session_id),
            Packet::Apples {
                apples: apples.apples().to_vec(),
                consumed_by_you: false,
            },
        ));
        effects.push(send(
            Recipient::AllExcept(session_id),
            Packet::SnakeAdded { nickname, state },
        ));
        effects.push(Effect::ArmProtection { session_id });

        Ok((session_id, effects))
    }

    /// Evaluates one state report from `session_id`.
    ///
    /// Order of evaluation:
    /// 1. reports against a dead snake, out of sequence, or malformed are dropped;
    ///    a dead snake that keeps reporting is periodically re-sent `Respawn`
    /// 2. the reported state becomes the authoritative copy and is relayed
    /// 3. the first opponent the head runs into decides the tick
    /// 4. otherwise self and wall collisions
    /// 5. otherwise apples
    pub fn handle_state_report(
        &mut self,
        session_id: u32,
        sequence: u32,
        state: SnakeState,
        apples: &mut AppleRegistry,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();

        let Some(session) = self.sessions.get_mut(session_id) else {
            return effects;
        };
        session.touch();

        if session.snake.dead {
            trace!("Ignoring report from dead snake {}", session.nickname);
            // The client is still playing, so its death notice or its
            // respawn request was lost
            if session.note_report_while_dead() {
                debug!("Repeating death notice to {}", session.nickname);
                effects.push(send(Recipient::Session(session_id), Packet::Respawn));
            }
            return effects;
        }
        if !session.accept_sequence(sequence) {
            debug!(
                "Dropping stale report {} from {} (last {})",
                sequence, session.nickname, session.last_sequence
            );
            return effects;
        }

        let relayed = state.clone();
        if let Err(e) = session.snake.apply_state(state) {
            warn!("Rejected state from {}: {}", session.nickname, e);
            return effects;
        }

        effects.push(send(
            Recipient::AllExcept(session_id),
            Packet::SnakeUpdate {
                nickname: session.nickname.clone(),
                state: relayed,
            },
        ));

        if let Some(crash) = self.find_crash(session_id) {
            debug!("Session {} ran into session {}", session_id, crash.opponent_id);
            if crash.acting_dies {
                self.kill(session_id, &mut effects);
            }
            if crash.opponent_dies {
                self.kill(crash.opponent_id, &mut effects);
            }
            return effects;
        }

        let hit_self_or_wall = match self.sessions.get(session_id) {
            Some(session) => session.snake.collide_itself() || session.snake.collide_edges(),
            None => false,
        };
        if hit_self_or_wall {
            self.kill(session_id, &mut effects);
            return effects;
        }

        self.consume_apples(session_id, apples, &mut effects);
        effects
    }

    /// Resets the session's snake and reopens its protection window.
    pub fn handle_respawn(&mut self, session_id: u32, sequence: u32) -> Vec<Effect> {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return Vec::new();
        };
        session.touch();

        if !session.accept_sequence(sequence) {
            debug!(
                "Dropping stale respawn {} from {}",
                sequence, session.nickname
            );
            return Vec::new();
        }

        session.snake.respawn();
        session.snake.protected = true;
        info!("{} respawned", session.nickname);

        vec![
            send(
                Recipient::AllExcept(session_id),
                Packet::SnakeRespawned {
                    nickname: session.nickname.clone(),
                },
            ),
            Effect::ArmProtection { session_id },
        ]
    }

    /// Ends the protection window opened as `generation`.
    pub fn handle_protection_expired(&mut self, session_id: u32, generation: u64) -> Vec<Effect> {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return Vec::new();
        };

        if !session.expire_protection(generation) {
            trace!("Ignoring stale protection expiry for {}", session.nickname);
            return Vec::new();
        }

        debug!("Protection ended for {}", session.nickname);
        vec![send(
            Recipient::All,
            Packet::ProtectionEnd {
                nickname: session.nickname.clone(),
            },
        )]
    }

    pub fn handle_disconnect(&mut self, session_id: u32) -> Vec<Effect> {
        match self.sessions.remove_session(session_id) {
            Some(session) => vec![send(
                Recipient::All,
                Packet::SnakeDisconnected {
                    nickname: session.nickname,
                },
            )],
            None => Vec::new(),
        }
    }

    /// Drops sessions that have gone quiet for longer than `timeout`.
    pub fn expire_idle(&mut self, timeout: Duration) -> Vec<Effect> {
        self.sessions
            .remove_timed_out(timeout)
            .into_iter()
            .map(|session| {
                warn!("{} timed out", session.nickname);
                send(
                    Recipient::All,
                    Packet::SnakeDisconnected {
                        nickname: session.nickname,
                    },
                )
            })
            .collect()
    }

    /// Looks for the first live opponent the acting snake's head overlaps.
    /// Two protected snakes never interact.
    fn find_crash(&self, session_id: u32) -> Option<Crash> {
        let acting = &self.sessions.get(session_id)?.snake;

        self.sessions
            .iter()
            .filter(|other| other.id != session_id)
            .find_map(|other| {
                let opponent = &other.snake;
                if opponent.dead || (acting.protected && opponent.protected) {
                    return None;
                }
                if !acting.collide_player(opponent) {
                    return None;
                }

                Some(Crash {
                    opponent_id: other.id,
                    acting_dies: !acting.protected,
                    opponent_dies: !opponent.protected && opponent.collide_player(acting),
                })
            })
    }

    fn kill(&mut self, session_id: u32, effects: &mut Vec<Effect>) {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return;
        };

        session.mark_dead();
        info!("{} died", session.nickname);

        effects.push(send(Recipient::Session(session_id), Packet::Respawn));
        effects.push(send(
            Recipient::AllExcept(session_id),
            Packet::SnakeDied {
                nickname: session.nickname.clone(),
            },
        ));
    }

    fn consume_apples(
        &mut self,
        session_id: u32,
        apples: &mut AppleRegistry,
        effects: &mut Vec<Effect>,
    ) {
        let eaten: Vec<usize> = match self.sessions.get(session_id) {
            Some(session) => apples
                .apples()
                .iter()
                .enumerate()
                .filter(|(_, apple)| session.snake.collide_apple(apple.position))
                .map(|(index, _)| index)
                .collect(),
            None => return,
        };

        if eaten.is_empty() {
            return;
        }

        for &index in &eaten {
            apples.replace(index, self.sessions.snakes());
        }
        if let Some(session) = self.sessions.get_mut(session_id) {
            for _ in &eaten {
                session.snake.grow();
            }
            info!("{} ate {} apple(s)", session.nickname, eaten.len());
        }

        effects.push(send(
            Recipient::Session(session_id),
            Packet::Apples {
                apples: apples.apples().to_vec(),
                consumed_by_you: true,
            },
        ));
        effects.push(send(
            Recipient::AllExcept(session_id),
            Packet::Apples {
                apples: apples.apples().to_vec(),
                consumed_by_you: false,
            },
        ));
    }
}
