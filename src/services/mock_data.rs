//! Synthetic entity rows for seeding tenant databases.

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::EntityRow;

const HOUR_MICROS: i64 = 60 * 60 * 1_000_000;

/// Single-pass stream of mock entities.
///
/// The row count is drawn once, uniformly from `0..max`, when the stream is built, so every
/// tenant ends up with a different volume. Rows are produced lazily: each `next()` advances the
/// id cursor and samples a fresh `last_updated` in `(now - 1h, now]`. Start over by building a
/// new instance.
#[derive(Debug)]
pub struct MockEntities<R = StdRng> {
    rng: R,
    next_id: i32,
    total: i32,
}

impl MockEntities<StdRng> {
    pub fn new(max_entities: u32) -> Self {
        Self::with_rng(max_entities, StdRng::from_entropy())
    }
}

impl<R: Rng> MockEntities<R> {
    pub fn with_rng(max_entities: u32, mut rng: R) -> Self {
        let cap = i32::try_from(max_entities).unwrap_or(i32::MAX);
        let total = if cap == 0 { 0 } else { rng.gen_range(0..cap) };
        Self {
            rng,
            next_id: 0,
            total,
        }
    }

    /// Number of rows this stream yields in total.
    pub fn total(&self) -> usize {
        self.total as usize
    }

    pub fn has_more(&self) -> bool {
        self.next_id < self.total
    }
}

impl<R: Rng> Iterator for MockEntities<R> {
    type Item = EntityRow;

    fn next(&mut self) -> Option<EntityRow> {
        if !self.has_more() {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;

        let back = self.rng.gen_range(0..HOUR_MICROS);
        let last_updated = Utc::now().naive_utc() - Duration::microseconds(back);

        Some(EntityRow { id, last_updated })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total - self.next_id) as usize;
        (remaining, Some(remaining))
    }
}

impl<R: Rng> ExactSizeIterator for MockEntities<R> {}
