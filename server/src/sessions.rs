//! Session table for connected participants
//!
//! This module tracks every live connection and the authoritative snake copy
//! that belongs to it:
//! - Join admission (capacity, unique nicknames)
//! - Per-session report sequencing so stale or reordered datagrams are dropped
//! - Spawn-protection timer ownership and cancellation
//! - Idle detection and cleanup
//!
//! Sessions are kept in id order, which is also arrival order, so every sweep
//! over opponents visits them deterministically.

use log::{debug, info};
use shared::{Snake, MAX_NICKNAME_LEN};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;

/// Reports a dead session may send before its death notice is repeated
pub const RESPAWN_RESEND_INTERVAL: u32 = 30;

/// Why a join was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("Server full")]
    ServerFull,
    #[error("Nickname in use")]
    NicknameInUse,
    #[error("Invalid nickname")]
    InvalidNickname,
}

/// One connected participant
///
/// Each session carries:
/// - Connection metadata (id, address, nickname, last activity)
/// - The server's copy of the participant's snake
/// - The highest report sequence accepted so far
/// - How many reports arrived since the snake last died
/// - The pending protection timer, tagged with a generation so that an expiry
///   queued before a re-arm is recognised as stale
#[derive(Debug)]
pub struct Session {
    pub id: u32,
    pub addr: SocketAddr,
    pub nickname: String,
    pub snake: Snake,
    pub last_seen: Instant,
    pub last_sequence: u32,
    reports_while_dead: u32,
    protection_timer: Option<JoinHandle<()>>,
    protection_generation: u64,
}

impl Session {
    pub fn new(id: u32, addr: SocketAddr, nickname: String) -> Self {
        Self {
            id,
            addr,
            nickname,
            snake: Snake::new(),
            last_seen: Instant::now(),
            last_sequence: 0,
            reports_while_dead: 0,
            protection_timer: None,
            protection_generation: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Records `sequence` if it is newer than anything seen before.
    pub fn accept_sequence(&mut self, sequence: u32) -> bool {
        if sequence <= self.last_sequence {
            return false;
        }
        self.last_sequence = sequence;
        true
    }

    pub fn mark_dead(&mut self) {
        self.snake.dead = true;
        self.reports_while_dead = 0;
    }

    /// Counts a report that arrived while the snake is dead. Returns true
    /// once every [`RESPAWN_RESEND_INTERVAL`] reports, when the death notice
    /// has to be sent again.
    pub fn note_report_while_dead(&mut self) -> bool {
        self.reports_while_dead += 1;
        self.reports_while_dead % RESPAWN_RESEND_INTERVAL == 0
    }

    /// Opens a new protection window and returns its generation.
    ///
    /// Any running timer is cancelled; the caller is expected to attach the
    /// replacement with [`Session::set_protection_timer`].
    pub fn begin_protection(&mut self) -> u64 {
        self.cancel_protection();
        self.protection_generation += 1;
        self.snake.protected = true;
        self.protection_generation
    }

    pub fn set_protection_timer(&mut self, timer: JoinHandle<()>) {
        if let Some(previous) = self.protection_timer.replace(timer) {
            previous.abort();
        }
    }

    /// Closes the protection window opened as `generation`. Returns false for
    /// a stale expiry.
    pub fn expire_protection(&mut self, generation: u64) -> bool {
        if generation != self.protection_generation || !self.snake.protected {
            return false;
        }
        self.protection_timer = None;
        self.snake.protected = false;
        true
    }

    /// Aborts the pending timer, if any. Safe to call repeatedly.
    pub fn cancel_protection(&mut self) {
        if let Some(timer) = self.protection_timer.take() {
            timer.abort();
            debug!("Cancelled protection timer for {}", self.nickname);
        }
    }

    pub fn has_protection_timer(&self) -> bool {
        self.protection_timer.is_some()
    }

    pub fn protection_generation(&self) -> u64 {
        self.protection_generation
    }
}

/// Owns every live session, keyed by server-assigned id
pub struct SessionTable {
    sessions: BTreeMap<u32, Session>,
    next_session_id: u32,
    max_clients: usize,
}

impl SessionTable {
    pub fn new(max_clients: usize) -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_session_id: 1,
            max_clients,
        }
    }

    /// Admits a new participant.
    pub fn add_session(&mut self, addr: SocketAddr, nickname: &str) -> Result<u32, JoinError> {
        let nickname = nickname.trim();
        if nickname.is_empty() || nickname.chars().count() > MAX_NICKNAME_LEN {
            return Err(JoinError::InvalidNickname);
        }
        if self.find_by_nickname(nickname).is_some() {
            return Err(JoinError::NicknameInUse);
        }
        if self.sessions.len() >= self.max_clients {
            return Err(JoinError::ServerFull);
        }

        let session_id = self.next_session_id;
        self.next_session_id += 1;

        info!("{} joined as session {} from {}", nickname, session_id, addr);
        self.sessions
            .insert(session_id, Session::new(session_id, addr, nickname.to_string()));

        Ok(session_id)
    }

    /// Removes a session and cancels its protection timer.
    pub fn remove_session(&mut self, session_id: u32) -> Option<Session> {
        let mut session = self.sessions.remove(&session_id)?;
        session.cancel_protection();
        info!("{} (session {}) left", session.nickname, session.id);
        Some(session)
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.sessions
            .values()
            .find(|session| session.addr == addr)
            .map(|session| session.id)
    }

    pub fn find_by_nickname(&self, nickname: &str) -> Option<u32> {
        self.sessions
            .values()
            .find(|session| session.nickname == nickname)
            .map(|session| session.id)
    }

    pub fn get(&self, session_id: u32) -> Option<&Session> {
        self.sessions.get(&session_id)
    }

    pub fn get_mut(&mut self, session_id: u32) -> Option<&mut Session> {
        self.sessions.get_mut(&session_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Every session's snake, in session order
    pub fn snakes(&self) -> impl Iterator<Item = &Snake> + Clone {
        self.sessions.values().map(|session| &session.snake)
    }

    /// Removes every session that has been silent longer than `timeout`.
    pub fn remove_timed_out(&mut self, timeout: Duration) -> Vec<Session> {
        let timed_out: Vec<u32> = self
            .sessions
            .values()
            .filter(|session| session.is_timed_out(timeout))
            .map(|session| session.id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|session_id| self.remove_session(session_id))
            .collect()
    }

    pub fn addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.sessions
            .values()
            .map(|session| (session.id, session.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
