//! Client input management: key names, swipes and report sequencing

use log::trace;
use shared::{Direction, Snake};
use std::collections::VecDeque;

/// Shorter swipes are treated as taps and ignored
pub const MIN_SWIPE_DISTANCE: f32 = 10.0;

/// Turns buffered while the head is still too close to its last corner
const MAX_PENDING_TURNS: usize = 2;

/// Maps a key name to a direction. Unknown keys yield `None`.
pub fn direction_for_key(key: &str) -> Option<Direction> {
    match key {
        "ArrowUp" | "KeyW" | "w" | "W" => Some(Direction::Up),
        "ArrowDown" | "KeyS" | "s" | "S" => Some(Direction::Down),
        "ArrowLeft" | "KeyA" | "a" | "A" => Some(Direction::Left),
        "ArrowRight" | "KeyD" | "d" | "D" => Some(Direction::Right),
        other => Direction::from_name(&other.to_ascii_lowercase()),
    }
}

/// Maps a swipe delta (screen coordinates, `y` down) to a direction along its
/// dominant axis.
pub fn swipe_direction(dx: f32, dy: f32) -> Option<Direction> {
    if !dx.is_finite() || !dy.is_finite() {
        return None;
    }
    if dx.abs().max(dy.abs()) < MIN_SWIPE_DISTANCE {
        return None;
    }

    if dx.abs() > dy.abs() {
        Some(if dx > 0.0 { Direction::Right } else { Direction::Left })
    } else {
        Some(if dy > 0.0 { Direction::Down } else { Direction::Up })
    }
}

/// A line typed on stdin
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Turn(Direction),
    Quit,
}

/// Parses `up`, `KeyW`, `swipe <dx> <dy>`, `quit` and friends.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let first = words.next()?;

    match first {
        "quit" | "exit" | "q" => Some(Command::Quit),
        "swipe" => {
            let dx = words.next()?.parse().ok()?;
            let dy = words.next()?.parse().ok()?;
            swipe_direction(dx, dy).map(Command::Turn)
        }
        key => direction_for_key(key).map(Command::Turn),
    }
}

/// Buffers turn requests and numbers outgoing reports
pub struct InputManager {
    next_sequence: u32,
    pending_turns: VecDeque<Direction>,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            pending_turns: VecDeque::with_capacity(MAX_PENDING_TURNS),
        }
    }

    /// Queues a turn; the oldest request is dropped when the buffer is full.
    pub fn queue_turn(&mut self, direction: Direction) {
        if self.pending_turns.back() == Some(&direction) {
            return;
        }
        if self.pending_turns.len() == MAX_PENDING_TURNS {
            self.pending_turns.pop_front();
        }
        self.pending_turns.push_back(direction);
    }

    /// Applies at most one buffered turn to `snake`.
    ///
    /// A turn that is redundant or reverses the snake is discarded. Any other
    /// refusal means the head has not cleared the last corner yet, so the turn
    /// stays queued for a later frame.
    pub fn apply_pending(&mut self, snake: &mut Snake) -> bool {
        let Some(&direction) = self.pending_turns.front() else {
            return false;
        };

        if direction == snake.direction || direction == snake.direction.opposite() {
            trace!("Dropping turn {:?} while heading {:?}", direction, snake.direction);
            self.pending_turns.pop_front();
            return false;
        }

        if snake.set_direction(direction) {
            self.pending_turns.pop_front();
            return true;
        }
        false
    }

    pub fn pending_turns(&self) -> usize {
        self.pending_turns.len()
    }

    pub fn clear(&mut self) {
        self.pending_turns.clear();
    }

    /// Hands out the sequence number for the next report or respawn request
    pub fn next_sequence(&mut self) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
