use log::{info, warn};
use palette::Lab;

use super::cluster::Cluster;
use super::Segmentation;
use crate::error::{Error, Result};
use crate::lab_image::LabImage;

/// What to do with a cluster that owns no pixels after an assignment pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegeneratePolicy {
    /// Keep the cluster with its last centroid. It may win pixels back later.
    #[default]
    Retain,
    /// Drop the cluster from the run. Surviving clusters keep their ids.
    Discard,
}

/// Interval between grid seeds: the edge of a square holding `n / k` pixels.
pub fn grid_interval(num_pixels: usize, num_clusters: usize) -> usize {
    ((num_pixels as f64 / num_clusters as f64).sqrt() as usize).max(1)
}

/// Seed positions at `interval / 2 + i * interval` on both axes.
pub fn grid_seeds(height: usize, width: usize, interval: usize) -> Vec<(usize, usize)> {
    let start = interval / 2;
    (start..height)
        .step_by(interval)
        .flat_map(|row| (start..width).step_by(interval).map(move |col| (row, col)))
        .collect()
}

fn check_parameters(image: &LabImage, num_clusters: usize, compactness: f32) -> Result<()> {
    if num_clusters == 0 {
        return Err(Error::invalid("num_clusters", "must be at least 1"));
    }
    if num_clusters > image.len() {
        return Err(Error::invalid(
            "num_clusters",
            format!(
                "{num_clusters} clusters requested for an image of {} pixels",
                image.len()
            ),
        ));
    }
    if !(compactness.is_finite() && compactness > 0.0) {
        return Err(Error::invalid(
            "compactness",
            format!("must be a positive number, got {compactness}"),
        ));
    }
    Ok(())
}

/// State of one SLIC run over a borrowed image.
///
/// The label map and distance field are flat row-major arrays. `labels[i]`
/// holds the index of the owning cluster in `clusters`, and that cluster's
/// pixel set contains the coordinate. Every mutation goes through
/// [`SlicEngine::assign`] or [`SlicEngine::update_centroids`], which preserve
/// this correspondence.
#[derive(Debug)]
pub struct SlicEngine<'a> {
    pub(super) image: &'a LabImage,
    pub(super) interval: usize,
    pub(super) compactness: f32,
    pub(super) clusters: Vec<Cluster>,
    pub(super) labels: Vec<Option<usize>>,
    pub(super) distances: Vec<f32>,
    policy: DegeneratePolicy,
}

impl<'a> SlicEngine<'a> {
    /// Validates the parameters and lays the seed grid over `image`.
    ///
    /// The grid can hold fewer or more seeds than `num_clusters` once its
    /// interval is truncated to whole pixels.
    pub fn new(image: &'a LabImage, num_clusters: usize, compactness: f32) -> Result<Self> {
        check_parameters(image, num_clusters, compactness)?;
        let interval = grid_interval(image.len(), num_clusters);
        let seeds = grid_seeds(image.height(), image.width(), interval);
        if seeds.is_empty() {
            return Err(Error::invalid(
                "num_clusters",
                format!(
                    "grid interval {interval} leaves no seed inside a {}x{} image",
                    image.height(),
                    image.width()
                ),
            ));
        }
        Ok(Self::from_parts(image, interval, compactness, seeds))
    }

    /// Starts from caller-chosen seed positions instead of the grid.
    ///
    /// The interval is derived as if `seeds.len()` clusters had been requested.
    pub fn with_seeds(
        image: &'a LabImage,
        seeds: &[(usize, usize)],
        compactness: f32,
    ) -> Result<Self> {
        check_parameters(image, seeds.len(), compactness)?;
        if let Some(&(row, col)) = seeds
            .iter()
            .find(|(row, col)| *row >= image.height() || *col >= image.width())
        {
            return Err(Error::invalid(
                "seeds",
                format!(
                    "seed ({row}, {col}) outside {}x{} image",
                    image.height(),
                    image.width()
                ),
            ));
        }
        let interval = grid_interval(image.len(), seeds.len());
        Ok(Self::from_parts(image, interval, compactness, seeds.to_vec()))
    }

    fn from_parts(
        image: &'a LabImage,
        interval: usize,
        compactness: f32,
        seeds: Vec<(usize, usize)>,
    ) -> Self {
        let clusters: Vec<Cluster> = seeds
            .into_iter()
            .enumerate()
            .map(|(id, (row, col))| Cluster::new(id, (row, col), image.get(row, col)))
            .collect();
        info!(
            "SLIC over {}x{} image: interval {}, {} clusters, compactness {}",
            image.height(),
            image.width(),
            interval,
            clusters.len(),
            compactness
        );
        Self {
            image,
            interval,
            compactness,
            clusters,
            labels: vec![None; image.len()],
            distances: vec![f32::INFINITY; image.len()],
            policy: DegeneratePolicy::default(),
        }
    }

    pub fn with_degenerate_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Moves every seed to the lowest-gradient pixel of its 3x3 neighbourhood.
    ///
    /// One scan per seed, always over the neighbourhood of the initial seed.
    /// The window does not re-centre on a neighbour after it wins, so a seed
    /// moves by at most one pixel on each axis.
    /// A neighbour only wins with a strictly lower gradient than the best seen
    /// so far, so a flat image leaves every seed in place. Returns how many
    /// seeds moved.
    pub fn perturb_seeds(&mut self) -> usize {
        let image = self.image;
        let mut moved = 0;
        for cluster in self.clusters.iter_mut() {
            let (row, col) = cluster.position();
            let mut best_gradient = image.gradient(row, col);
            let mut best_position = None;
            for d_row in -1isize..=1 {
                for d_col in -1isize..=1 {
                    let (Some(r), Some(c)) = (
                        offset(row, d_row, image.height()),
                        offset(col, d_col, image.width()),
                    ) else {
                        continue;
                    };
                    let gradient = image.gradient(r, c);
                    if gradient < best_gradient {
                        best_gradient = gradient;
                        best_position = Some((r, c));
                    }
                }
            }
            if let Some((r, c)) = best_position {
                cluster.update((r, c), image.get(r, c));
                moved += 1;
            }
        }
        moved
    }

    /// Moves each centroid to the mean position of its pixels and takes the
    /// image color found there.
    ///
    /// The color is sampled rather than averaged so that centroids always
    /// carry a color that occurs in the image. Clusters without pixels are
    /// handled according to the [`DegeneratePolicy`]. Returns the number of
    /// such clusters.
    pub fn update_centroids(&mut self) -> usize {
        let image = self.image;
        let mut degenerate = 0;
        for cluster in self.clusters.iter_mut() {
            match cluster.mean_position() {
                Some((row, col)) => cluster.update((row, col), image.get(row, col)),
                None => {
                    warn!(
                        "cluster {} at {:?} owns no pixels",
                        cluster.id(),
                        cluster.position()
                    );
                    degenerate += 1;
                }
            }
        }
        if degenerate > 0 && self.policy == DegeneratePolicy::Discard {
            self.discard_empty();
        }
        degenerate
    }

    fn discard_empty(&mut self) {
        let mut remap = Vec::with_capacity(self.clusters.len());
        let mut next = 0;
        for cluster in &self.clusters {
            if cluster.is_empty() {
                remap.push(None);
            } else {
                remap.push(Some(next));
                next += 1;
            }
        }
        self.clusters.retain(|cluster| !cluster.is_empty());
        for label in self.labels.iter_mut() {
            *label = label.and_then(|index| remap[index]);
        }
    }

    /// Current centroids in cluster order.
    pub fn centroids(&self) -> Vec<((usize, usize), Lab)> {
        self.clusters
            .iter()
            .map(|cluster| (cluster.position(), cluster.color()))
            .collect()
    }

    /// The image with every owned pixel painted in its cluster's color.
    pub fn snapshot(&self) -> LabImage {
        paint(self.image, |index| {
            self.labels[index].map(|cluster| self.clusters[cluster].color())
        })
    }

    pub fn image(&self) -> &'a LabImage {
        self.image
    }

    /// Grid interval `S`.
    pub fn interval(&self) -> usize {
        self.interval
    }

    pub fn compactness(&self) -> f32 {
        self.compactness
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Owning cluster index per pixel, row-major.
    pub fn labels(&self) -> &[Option<usize>] {
        &self.labels
    }

    /// Best combined distance per pixel from the latest assignment pass.
    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    pub fn into_segmentation(self, rounds: usize) -> Segmentation {
        let labels = self
            .labels
            .iter()
            .map(|label| label.map(|index| self.clusters[index].id()))
            .collect();
        Segmentation {
            width: self.image.width(),
            height: self.image.height(),
            labels,
            clusters: self.clusters,
            rounds,
        }
    }
}

/// Copies `image`, replacing each pixel for which `color_at(flat_index)`
/// returns a color.
pub(super) fn paint(image: &LabImage, color_at: impl Fn(usize) -> Option<Lab>) -> LabImage {
    LabImage::from_fn(image.width(), image.height(), |row, col| {
        color_at(image.index(row, col)).unwrap_or_else(|| image.get(row, col))
    })
}

fn offset(base: usize, delta: isize, bound: usize) -> Option<usize> {
    base.checked_add_signed(delta).filter(|&value| value < bound)
}

#[cfg(test)]
mod tests {
    use palette::Lab;

    use super::{grid_interval, grid_seeds, SlicEngine};
    use crate::{Error, LabImage};

    fn ramp(width: usize, height: usize) -> LabImage {
        LabImage::from_fn(width, height, |row, col| {
            Lab::new((row * width + col) as f32, col as f32, -(row as f32))
        })
    }

    #[test]
    fn test_grid_count() {
        for &(width, height, k) in &[(100, 100, 4), (10, 7, 5), (37, 23, 11), (5, 5, 25), (64, 3, 8), (9, 9, 1)] {
            let img = ramp(width, height);
            let engine = SlicEngine::new(&img, k, 10.0).unwrap();
            let s = grid_interval(width * height, k);
            assert_eq!(engine.interval(), s);

            let per_axis = |len: usize| (len - s / 2 + s - 1) / s;
            let expected = per_axis(height) * per_axis(width);
            assert_eq!(engine.clusters().len(), expected, "{width}x{height}, k={k}");

            let first = &engine.clusters()[0];
            assert_eq!(first.position(), (s / 2, s / 2));
            assert_eq!(first.color(), img.get(s / 2, s / 2));
            assert!(engine.clusters().iter().all(|c| c.is_empty()));
            let ids: Vec<usize> = engine.clusters().iter().map(|c| c.id()).collect();
            assert_eq!(ids, (0..expected).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_grid_seeds_layout() {
        // 10x7 with k = 5 gives an interval of 3 and more seeds than requested.
        assert_eq!(grid_interval(70, 5), 3);
        assert_eq!(
            grid_seeds(7, 10, 3),
            vec![(1, 1), (1, 4), (1, 7), (4, 1), (4, 4), (4, 7)]
        );
    }

    #[test]
    fn test_invalid_parameters() {
        let img = ramp(4, 4);
        let cases = [(0, 10.0), (17, 10.0), (4, 0.0), (4, -1.0), (4, f32::NAN)];
        for (k, m) in cases {
            match SlicEngine::new(&img, k, m) {
                Err(Error::InvalidParameter { .. }) => {}
                other => panic!("k={k}, m={m}: expected InvalidParameter, got {other:?}"),
            }
        }
        assert!(SlicEngine::new(&img, 16, 1.0).is_ok());

        // A one-row strip with interval 2 has no row at offset 1 to seed.
        let strip = ramp(64, 1);
        assert!(matches!(
            SlicEngine::new(&strip, 8, 10.0),
            Err(Error::InvalidParameter { name: "num_clusters", .. })
        ));

        let empty = LabImage::filled(0, 0, Lab::default());
        assert!(SlicEngine::new(&empty, 1, 10.0).is_err());
    }

    #[test]
    fn test_seeds_out_of_bounds() {
        let img = ramp(4, 3);
        let err = SlicEngine::with_seeds(&img, &[(0, 0), (3, 1)], 10.0).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "seeds", .. }));
        assert!(SlicEngine::with_seeds(&img, &[], 10.0).is_err());
    }

    #[test]
    fn test_perturb_flat_image() {
        let img = LabImage::filled(30, 20, Lab::new(60.0, -4.0, 12.0));
        let mut engine = SlicEngine::new(&img, 6, 10.0).unwrap();
        let before = engine.centroids();
        assert_eq!(engine.perturb_seeds(), 0);
        assert_eq!(engine.centroids(), before);
    }

    #[test]
    fn test_perturb_leaves_edge() {
        // Dark left, bright from column 3: the seed at (2, 2) sits on the edge.
        let dark = Lab::new(10.0, 0.0, 0.0);
        let img = LabImage::from_fn(5, 5, |_, col| if col >= 3 { Lab::new(90.0, 0.0, 0.0) } else { dark });
        let mut engine = SlicEngine::with_seeds(&img, &[(2, 2)], 10.0).unwrap();
        assert_eq!(img.gradient(2, 2), 80.0);

        assert_eq!(engine.perturb_seeds(), 1);
        // First strictly lower neighbour in scan order wins; later ties do not.
        assert_eq!(engine.clusters()[0].position(), (1, 1));
        assert_eq!(engine.clusters()[0].color(), dark);
    }

    #[test]
    fn test_perturb_at_corner() {
        let img = ramp(3, 3);
        let mut engine = SlicEngine::with_seeds(&img, &[(0, 0), (2, 2)], 10.0).unwrap();
        engine.perturb_seeds();
        for cluster in engine.clusters() {
            let (row, col) = cluster.position();
            assert!(row < 3 && col < 3);
        }
    }

    #[test]
    fn test_update_single_pixel() {
        let img = ramp(5, 5);
        let mut engine = SlicEngine::with_seeds(&img, &[(0, 0)], 10.0).unwrap();
        engine.clusters[0].add_pixel(2, 2);
        engine.labels[img.index(2, 2)] = Some(0);

        assert_eq!(engine.update_centroids(), 0);
        assert_eq!(engine.clusters()[0].position(), (2, 2));
        assert_eq!(engine.clusters()[0].color(), img.get(2, 2));
    }

    #[test]
    fn test_update_samples_color_at_mean() {
        let img = ramp(5, 5);
        let mut engine = SlicEngine::with_seeds(&img, &[(0, 0)], 10.0).unwrap();
        for (row, col) in [(0, 0), (0, 4), (3, 0), (3, 3)] {
            engine.clusters[0].add_pixel(row, col);
            engine.labels[img.index(row, col)] = Some(0);
        }
        engine.update_centroids();
        // Mean (1.5, 1.75) truncates to (1, 1); the color is the pixel there,
        // not the average of the four colors.
        assert_eq!(engine.clusters()[0].position(), (1, 1));
        assert_eq!(engine.clusters()[0].color(), img.get(1, 1));
    }

    #[test]
    fn test_snapshot_paints_owned_pixels() {
        let img = ramp(3, 2);
        let mut engine = SlicEngine::with_seeds(&img, &[(1, 2)], 10.0).unwrap();
        engine.clusters[0].add_pixel(0, 0);
        engine.labels[0] = Some(0);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.get(0, 0), img.get(1, 2));
        assert_eq!(snapshot.get(0, 1), img.get(0, 1));
        assert_eq!(snapshot.get(1, 2), img.get(1, 2));
    }
}
