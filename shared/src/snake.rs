//! Snake movement, growth and collision tests
//!
//! A snake is a polyline of axis-aligned segments. Index 0 is the tail and the
//! last point is the head. The head advances continuously along `direction`;
//! the tail follows at the same speed once the owed growth has been paid out,
//! so a non-growing snake conserves its total length every tick.

use crate::geometry::{Direction, Point, Rect};
use crate::{ARENA_SIZE, BLOCK_SIZE, MAX_BODY_POINTS, PLAYER_SPEED, STARTER_LENGTH};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Segments nearest the head that are never tested for self-collision
const SELF_COLLISION_SKIP: usize = 3;

/// The part of a snake that travels over the wire in state reports
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SnakeState {
    pub body: Vec<Point>,
    pub direction: Direction,
    pub growth_remaining: f32,
}

/// Reasons a reported state is refused
#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("body has {0} points, at least 2 are required")]
    TooShort(usize),
    #[error("body has {0} points, more than a report may carry")]
    TooLong(usize),
    #[error("body point {0} is not finite")]
    NonFinite(usize),
    #[error("segment {0} is not axis-aligned")]
    Diagonal(usize),
    #[error("growth remaining {0} is out of range")]
    InvalidGrowth(f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snake {
    pub body: Vec<Point>,
    pub direction: Direction,
    pub growth_remaining: f32,
    pub dead: bool,
    /// Inside the post-spawn invulnerability window
    pub protected: bool,
}

impl Default for Snake {
    fn default() -> Self {
        Self::new()
    }
}

impl Snake {
    /// Creates a snake at the spawn point. Fresh snakes start protected.
    pub fn new() -> Self {
        Self {
            body: Self::spawn_body(),
            direction: Direction::Up,
            growth_remaining: STARTER_LENGTH,
            dead: false,
            protected: true,
        }
    }

    pub fn spawn_point() -> Point {
        Point::new(ARENA_SIZE / 2.0, ARENA_SIZE - BLOCK_SIZE / 2.0)
    }

    fn spawn_body() -> Vec<Point> {
        vec![Self::spawn_point(), Self::spawn_point()]
    }

    pub fn head(&self) -> Point {
        self.body[self.body.len() - 1]
    }

    pub fn tail(&self) -> Point {
        self.body[0]
    }

    /// Total polyline length
    pub fn length(&self) -> f32 {
        self.body
            .windows(2)
            .map(|pair| pair[0].manhattan_distance(&pair[1]))
            .sum()
    }

    pub fn is_growing(&self) -> bool {
        self.growth_remaining > 0.0
    }

    /// Turns the head, returning whether the request was taken.
    ///
    /// Redundant and 180° turns are dropped, as is a turn made less than one
    /// block after the previous one.
    pub fn set_direction(&mut self, requested: Direction) -> bool {
        if requested == self.direction || requested == self.direction.opposite() {
            return false;
        }

        if self.body.len() > 2 {
            let last_turn = self.body[self.body.len() - 2];
            if last_turn.manhattan_distance(&self.head()) < BLOCK_SIZE {
                return false;
            }
        }

        self.direction = requested;
        let head = self.head();
        self.body.push(head);
        true
    }

    pub fn move_head(&mut self, dt: f32) {
        let distance = PLAYER_SPEED * dt;
        let (dx, dy) = self.direction.unit();
        let last = self.body.len() - 1;
        self.body[last].x += dx * distance;
        self.body[last].y += dy * distance;
    }

    /// Pulls the tail `PLAYER_SPEED * dt` units along the body, dropping every
    /// turn point it passes.
    pub fn move_tail(&mut self, dt: f32) {
        let mut remaining = PLAYER_SPEED * dt;

        // Each pass consumes at most one segment boundary.
        for _ in 0..self.body.len() {
            let tail = self.body[0];
            let target = self.body[1];
            let target_dist = tail.manhattan_distance(&target);

            if remaining < target_dist {
                self.body[0] = tail.step_towards(&target, remaining);
                return;
            }

            remaining -= target_dist;
            if self.body.len() == 2 {
                self.body[0] = target;
                return;
            }
            self.body.remove(0);
        }
    }

    /// Pays owed growth while the tail stays put. Overshoot is handed back to
    /// the tail as leftover time within the same tick.
    pub fn handle_growth(&mut self, dt: f32) {
        self.growth_remaining -= PLAYER_SPEED * dt;

        if self.growth_remaining < 0.0 {
            let leftover = -self.growth_remaining / PLAYER_SPEED;
            self.growth_remaining = 0.0;
            self.move_tail(leftover);
        }
    }

    /// Advances the snake by `dt` seconds. Non-positive or non-finite steps
    /// are ignored.
    pub fn update(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        self.move_head(dt);

        if self.is_growing() {
            self.handle_growth(dt);
        } else {
            self.move_tail(dt);
        }
    }

    pub fn grow(&mut self) {
        self.growth_remaining += BLOCK_SIZE;
    }

    /// Resets to the starter polyline. Protection is left to the caller.
    pub fn respawn(&mut self) {
        self.body = Self::spawn_body();
        self.direction = Direction::Up;
        self.growth_remaining = STARTER_LENGTH;
        self.dead = false;
    }

    pub fn state(&self) -> SnakeState {
        SnakeState {
            body: self.body.clone(),
            direction: self.direction,
            growth_remaining: self.growth_remaining,
        }
    }

    /// Replaces position, direction and growth with a reported state.
    /// Nothing is changed when the state is invalid.
    pub fn apply_state(&mut self, state: SnakeState) -> Result<(), StateError> {
        validate_state(&state)?;
        self.body = state.body;
        self.direction = state.direction;
        self.growth_remaining = state.growth_remaining;
        Ok(())
    }

    /// Head box against `rect`
    pub fn collide_rect(&self, rect: &Rect) -> bool {
        Rect::block(self.head()).overlaps(rect)
    }

    pub fn collide_apple(&self, apple: Point) -> bool {
        self.collide_rect(&Rect::block(apple))
    }

    pub fn collide_itself(&self) -> bool {
        let checked = (self.body.len() - 1).saturating_sub(SELF_COLLISION_SKIP);

        self.body
            .windows(2)
            .take(checked)
            .any(|pair| self.collide_rect(&Rect::around_segment(pair[0], pair[1])))
    }

    pub fn collide_edges(&self) -> bool {
        let head = self.head();
        let min = BLOCK_SIZE / 2.0;
        let max = ARENA_SIZE - BLOCK_SIZE / 2.0;

        head.x < min || head.x > max || head.y < min || head.y > max
    }

    /// Head against every segment of `other`
    pub fn collide_player(&self, other: &Snake) -> bool {
        other
            .body
            .windows(2)
            .any(|pair| self.collide_rect(&Rect::around_segment(pair[0], pair[1])))
    }
}

fn validate_state(state: &SnakeState) -> Result<(), StateError> {
    let len = state.body.len();
    if len < 2 {
        return Err(StateError::TooShort(len));
    }
    if len > MAX_BODY_POINTS {
        return Err(StateError::TooLong(len));
    }

    if let Some(index) = state.body.iter().position(|p| !p.is_finite()) {
        return Err(StateError::NonFinite(index));
    }

    if let Some(index) = state
        .body
        .windows(2)
        .position(|pair| pair[0].x != pair[1].x && pair[0].y != pair[1].y)
    {
        return Err(StateError::Diagonal(index));
    }

    if !state.growth_remaining.is_finite() || state.growth_remaining < 0.0 {
        return Err(StateError::InvalidGrowth(state.growth_remaining));
    }

    Ok(())
}
