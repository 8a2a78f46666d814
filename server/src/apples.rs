//! Live apple positions and their replacement on consumption

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Apple, Point, Rect, Snake, ARENA_SIZE, BLOCK_SIZE};

/// Random cells tried before an overlapping placement is accepted
const MAX_PLACEMENT_ATTEMPTS: usize = 64;

pub struct AppleRegistry {
    apples: Vec<Apple>,
    next_apple_id: u32,
    rng: StdRng,
}

impl AppleRegistry {
    /// Places `count` apples at random cells.
    pub fn new(count: usize) -> Self {
        Self::with_rng(count, StdRng::from_entropy())
    }

    pub fn with_rng(count: usize, rng: StdRng) -> Self {
        let mut registry = Self {
            apples: Vec::with_capacity(count),
            next_apple_id: 1,
            rng,
        };

        for _ in 0..count {
            let position = registry.random_cell();
            let id = registry.allocate_id();
            registry.apples.push(Apple { id, position });
        }

        registry
    }

    /// Starts from fixed positions; replacements still come from `rng`.
    pub fn from_positions(positions: &[Point], rng: StdRng) -> Self {
        let mut registry = Self {
            apples: Vec::with_capacity(positions.len()),
            next_apple_id: 1,
            rng,
        };

        for &position in positions {
            let id = registry.allocate_id();
            registry.apples.push(Apple { id, position });
        }

        registry
    }

    pub fn apples(&self) -> &[Apple] {
        &self.apples
    }

    pub fn len(&self) -> usize {
        self.apples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apples.is_empty()
    }

    /// Moves the apple at `index` to a fresh cell under a new id, avoiding
    /// the given snakes' bodies and the apple's old cell where possible.
    pub fn replace<'a>(
        &mut self,
        index: usize,
        snakes: impl Iterator<Item = &'a Snake> + Clone,
    ) -> Option<Apple> {
        let old_position = self.apples.get(index)?.position;

        let mut candidate = self.random_cell();
        for attempt in 1..=MAX_PLACEMENT_ATTEMPTS {
            if candidate != old_position && !overlaps_any(candidate, snakes.clone()) {
                break;
            }
            if attempt == MAX_PLACEMENT_ATTEMPTS {
                debug!(
                    "No free cell after {} attempts, placing apple at ({}, {})",
                    MAX_PLACEMENT_ATTEMPTS, candidate.x, candidate.y
                );
                break;
            }
            candidate = self.random_cell();
        }

        let apple = Apple {
            id: self.allocate_id(),
            position: candidate,
        };
        self.apples[index] = apple;
        Some(apple)
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_apple_id;
        self.next_apple_id = self.next_apple_id.wrapping_add(1);
        id
    }

    /// A grid cell fully inside the arena walls
    fn random_cell(&mut self) -> Point {
        let cells = (ARENA_SIZE / BLOCK_SIZE) as u32;
        Point::new(
            self.rng.gen_range(1..cells) as f32 * BLOCK_SIZE,
            self.rng.gen_range(1..cells) as f32 * BLOCK_SIZE,
        )
    }
}

fn overlaps_any<'a>(position: Point, mut snakes: impl Iterator<Item = &'a Snake>) -> bool {
    let apple = Rect::block(position);
    snakes.any(|snake| {
        !snake.dead
            && snake
                .body
                .windows(2)
                .any(|pair| Rect::around_segment(pair[0], pair[1]).overlaps(&apple))
    })
}
