use std::collections::HashSet;

use palette::Lab;

/// One superpixel: a centroid position and color plus the pixels it owns.
///
/// `pixels` mirrors the engine's label map and is only mutated by the engine,
/// which keeps both in sync.
#[derive(Debug, Clone)]
pub struct Cluster {
    id: usize,
    position: (usize, usize),
    color: Lab,
    pixels: HashSet<(usize, usize)>,
}

impl Cluster {
    pub(crate) fn new(id: usize, position: (usize, usize), color: Lab) -> Self {
        Self {
            id,
            position,
            color,
            pixels: HashSet::new(),
        }
    }

    /// Identifier assigned at creation, unique within one segmentation run.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Centroid as `(row, col)`.
    pub fn position(&self) -> (usize, usize) {
        self.position
    }

    pub fn color(&self) -> Lab {
        self.color
    }

    pub fn pixels(&self) -> &HashSet<(usize, usize)> {
        &self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub(crate) fn update(&mut self, position: (usize, usize), color: Lab) {
        self.position = position;
        self.color = color;
    }

    pub(crate) fn add_pixel(&mut self, row: usize, col: usize) {
        self.pixels.insert((row, col));
    }

    pub(crate) fn remove_pixel(&mut self, row: usize, col: usize) {
        self.pixels.remove(&(row, col));
    }

    /// Truncated mean of the owned coordinates, or `None` for an empty cluster.
    pub(crate) fn mean_position(&self) -> Option<(usize, usize)> {
        if self.pixels.is_empty() {
            return None;
        }
        let (sum_row, sum_col) = self
            .pixels
            .iter()
            .fold((0usize, 0usize), |acc, (row, col)| (acc.0 + row, acc.1 + col));
        let count = self.pixels.len();
        Some((sum_row / count, sum_col / count))
    }
}
