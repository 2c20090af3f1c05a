use std::ops::Range;

#[cfg(feature = "parallel")]
use log::trace;
use palette::Lab;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::cluster::Cluster;
use super::engine::SlicEngine;
use crate::lab_image::{lab_distance, LabImage};

/// `sqrt((dc / m)^2 + (ds / s)^2)`: color distance scaled by the compactness
/// `m`, spatial distance scaled by the grid interval `s`.
pub fn combined_distance(color_distance: f32, spatial_distance: f32, compactness: f32, interval: f32) -> f32 {
    let color_term = color_distance / compactness;
    let spatial_term = spatial_distance / interval;
    (color_term * color_term + spatial_term * spatial_term).sqrt()
}

/// The pixels a cluster competes for: rows and columns within `2S` of its
/// centroid, upper bound exclusive, clipped to the image.
#[derive(Debug, Clone)]
struct SearchWindow {
    center: (usize, usize),
    color: Lab,
    rows: Range<usize>,
    cols: Range<usize>,
}

impl SearchWindow {
    fn around(cluster: &Cluster, radius: usize, image: &LabImage) -> Self {
        let (row, col) = cluster.position();
        Self {
            center: (row, col),
            color: cluster.color(),
            rows: row.saturating_sub(radius)..(row + radius).min(image.height()),
            cols: col.saturating_sub(radius)..(col + radius).min(image.width()),
        }
    }

    /// Row-major `(row, col, distance)` for every pixel of the window.
    fn distances<'i>(
        self,
        image: &'i LabImage,
        compactness: f32,
        interval: f32,
    ) -> impl Iterator<Item = (usize, usize, f32)> + 'i {
        let SearchWindow {
            center,
            color,
            rows,
            cols,
        } = self;
        rows.flat_map(move |row| {
            cols.clone().map(move |col| {
                let d_color = lab_distance(&image.get(row, col), &color);
                let d_row = row as f32 - center.0 as f32;
                let d_col = col as f32 - center.1 as f32;
                let d_space = (d_row * d_row + d_col * d_col).sqrt();
                (row, col, combined_distance(d_color, d_space, compactness, interval))
            })
        })
    }
}

impl<'a> SlicEngine<'a> {
    /// One assignment pass.
    ///
    /// The distance field is reset, then every cluster in index order offers
    /// its window's distances. A pixel changes owner only on a strictly smaller
    /// distance, so exact ties go to the lowest cluster index. Pixels outside
    /// every window keep their previous owner and an infinite distance.
    pub fn assign(&mut self) {
        self.distances.fill(f32::INFINITY);
        #[cfg(feature = "parallel")]
        self.assign_parallel();
        #[cfg(not(feature = "parallel"))]
        self.assign_sequential();
    }

    /// Single-threaded pass over clusters in index order. Does not reset the
    /// distance field.
    pub fn assign_sequential(&mut self) {
        let image = self.image;
        let (compactness, interval) = (self.compactness, self.interval as f32);
        for index in 0..self.clusters.len() {
            let window = SearchWindow::around(&self.clusters[index], 2 * self.interval, image);
            for (row, col, distance) in window.distances(image, compactness, interval) {
                self.offer(index, row, col, distance);
            }
        }
    }

    /// Computes windows concurrently in batches of a few per worker thread,
    /// merging each batch on this thread in cluster order before the next one
    /// starts. Gives the same labels as [`Self::assign_sequential`].
    #[cfg(feature = "parallel")]
    pub fn assign_parallel(&mut self) {
        let batch_size = 2 * rayon::current_num_threads();
        let peak = self.assign_in_batches(batch_size);
        trace!("assignment held at most {} proposals", peak);
    }

    /// Returns the largest number of proposals buffered at once.
    #[cfg(feature = "parallel")]
    fn assign_in_batches(&mut self, batch_size: usize) -> usize {
        let image = self.image;
        let (compactness, interval) = (self.compactness, self.interval as f32);
        let radius = 2 * self.interval;
        let windows: Vec<SearchWindow> = self
            .clusters
            .iter()
            .map(|cluster| SearchWindow::around(cluster, radius, image))
            .collect();

        let batch_size = batch_size.max(1);
        let mut peak = 0;
        for (batch, chunk) in windows.chunks(batch_size).enumerate() {
            let proposals: Vec<Vec<(usize, usize, f32)>> = chunk
                .par_iter()
                .map(|window| {
                    window
                        .clone()
                        .distances(image, compactness, interval)
                        .collect()
                })
                .collect();
            peak = peak.max(proposals.iter().map(Vec::len).sum());

            for (offset, proposal) in proposals.into_iter().enumerate() {
                let index = batch * batch_size + offset;
                for (row, col, distance) in proposal {
                    self.offer(index, row, col, distance);
                }
            }
        }
        peak
    }

    /// Compare-and-update for one pixel. Must not interleave with another
    /// offer for the same pixel.
    fn offer(&mut self, index: usize, row: usize, col: usize, distance: f32) {
        let flat = self.image.index(row, col);
        if distance < self.distances[flat] {
            self.distances[flat] = distance;
            if let Some(previous) = self.labels[flat].replace(index) {
                self.clusters[previous].remove_pixel(row, col);
            }
            self.clusters[index].add_pixel(row, col);
        }
    }
}
