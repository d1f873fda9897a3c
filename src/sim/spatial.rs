//! Spatial collision index
//!
//! A wrapping uniform grid that is cleared and refilled every step. Bodies
//! are bucketed into every cell their bounding box touches; `finish()` sorts
//! the buckets into one flat array so queries are a handful of slice reads.
//!
//! Query results are always reported in insertion order, which is also the
//! tie-break for equal-fraction line hits: the body added first wins.

use glam::Vec2;

use super::body::{Collidable, sweep_circle};
use super::government::GovernmentId;

/// One body as seen by the index
#[derive(Debug, Clone, Copy)]
pub struct Entry<K> {
    pub key: K,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub government: Option<GovernmentId>,
}

/// Closest swept-segment hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineHit<K> {
    pub key: K,
    /// Fraction along the path (0 = start)
    pub fraction: f32,
    /// Velocity of the body that was hit
    pub velocity: Vec2,
}

/// Per-step spatial partition over collidable bodies
#[derive(Debug, Clone)]
pub struct CollisionSet<K> {
    cell_size: f32,
    cells: usize,
    entries: Vec<Entry<K>>,
    /// (cell, entry) pairs gathered by `add`, consumed by `finish`
    pending: Vec<(usize, usize)>,
    /// Entry indices grouped by cell
    sorted: Vec<usize>,
    /// `sorted[offsets[c]..offsets[c + 1]]` are the entries of cell `c`
    offsets: Vec<usize>,
    step: u64,
}

impl<K: Copy> CollisionSet<K> {
    /// `cells` is the number of cells per axis; the grid wraps beyond that.
    pub fn new(cell_size: f32, cells: usize) -> Self {
        let cells = cells.max(1);
        Self {
            cell_size: cell_size.max(1.0),
            cells,
            entries: Vec::new(),
            pending: Vec::new(),
            sorted: Vec::new(),
            offsets: vec![0; cells * cells + 1],
            step: 0,
        }
    }

    /// Drop all bodies, keeping allocations
    pub fn clear(&mut self, step: u64) {
        self.step = step;
        self.entries.clear();
        self.pending.clear();
        self.sorted.clear();
        self.offsets.iter_mut().for_each(|o| *o = 0);
    }

    /// Add a body. Call `finish()` before querying.
    pub fn add<B: Collidable + ?Sized>(&mut self, key: K, body: &B) {
        let index = self.entries.len();
        let entry = Entry {
            key,
            position: body.position(),
            velocity: body.velocity(),
            radius: body.radius(),
            government: body.government(),
        };
        let min = entry.position - Vec2::splat(entry.radius);
        let max = entry.position + Vec2::splat(entry.radius);
        self.entries.push(entry);

        let cells = self.cell_range(min, max);
        for cell in cells {
            self.pending.push((cell, index));
        }
    }

    /// Bucket the added bodies so the set can be queried
    pub fn finish(&mut self) {
        self.pending.sort_unstable();
        self.pending.dedup();

        let total = self.cells * self.cells;
        self.offsets.clear();
        self.offsets.resize(total + 1, 0);
        for &(cell, _) in &self.pending {
            self.offsets[cell + 1] += 1;
        }
        for c in 0..total {
            self.offsets[c + 1] += self.offsets[c];
        }
        self.sorted.clear();
        self.sorted.extend(self.pending.iter().map(|&(_, entry)| entry));
    }

    /// Step number this set was last cleared for
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every body added this step, in insertion order
    pub fn entries(&self) -> &[Entry<K>] {
        &self.entries
    }

    /// Bodies overlapping the circle, in insertion order
    pub fn circle(&self, center: Vec2, radius: f32) -> Vec<&Entry<K>> {
        let min = center - Vec2::splat(radius);
        let max = center + Vec2::splat(radius);
        self.candidates(min, max)
            .into_iter()
            .map(|i| &self.entries[i])
            .filter(|e| e.position.distance(center) <= radius + e.radius)
            .collect()
    }

    /// Closest body hit by the segment `from -> from + path` among those
    /// accepted by `filter`. Only hits strictly closer than `limit` count.
    pub fn line<F>(&self, from: Vec2, path: Vec2, limit: f32, filter: F) -> Option<LineHit<K>>
    where
        F: Fn(&Entry<K>) -> bool,
    {
        let to = from + path;
        let mut best: Option<LineHit<K>> = None;
        let mut closest = limit;
        for i in self.candidates(from.min(to), from.max(to)) {
            let entry = &self.entries[i];
            if !filter(entry) {
                continue;
            }
            if let Some(fraction) = sweep_circle(from, path, entry.position, entry.radius)
                && fraction < closest
            {
                closest = fraction;
                best = Some(LineHit {
                    key: entry.key,
                    fraction,
                    velocity: entry.velocity,
                });
            }
        }
        best
    }

    /// Entry indices in every cell the box touches, sorted and unique
    fn candidates(&self, min: Vec2, max: Vec2) -> Vec<usize> {
        let mut found: Vec<usize> = Vec::new();
        for cell in self.cell_range(min, max) {
            found.extend_from_slice(&self.sorted[self.offsets[cell]..self.offsets[cell + 1]]);
        }
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Wrapped cell indices covered by an axis-aligned box
    fn cell_range(&self, min: Vec2, max: Vec2) -> Vec<usize> {
        let n = self.cells as i64;
        let axis = |lo: f32, hi: f32| -> Vec<i64> {
            let lo = (lo / self.cell_size).floor() as i64;
            let hi = (hi / self.cell_size).floor() as i64;
            // Casts saturate, so an infinite box spans i64::MIN..=i64::MAX
            if hi.saturating_sub(lo) >= n - 1 {
                (0..n).collect()
            } else {
                (lo..=hi).map(|c| c.rem_euclid(n)).collect()
            }
        };
        let xs = axis(min.x, max.x);
        let ys = axis(min.y, max.y);
        let mut out = Vec::with_capacity(xs.len() * ys.len());
        for &y in &ys {
            for &x in &xs {
                out.push((y * n + x) as usize);
            }
        }
        out
    }
}
