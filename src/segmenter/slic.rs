// Simple Linear Iterative Clustering (SLIC)
// Achanta et al., "SLIC Superpixels Compared to State-of-the-Art Superpixel Methods", TPAMI 2012

use log::{debug, info};

use super::engine::{DegeneratePolicy, SlicEngine};
use super::{Segmentation, Segmenter};
use crate::error::{Error, Result};
use crate::lab_image::LabImage;

pub struct SlicSegmenter {
    num_clusters: usize,
    compactness: f32, // recommended range is 1 to 40, higher is more compact
    iterations: usize, // default is 10
    stop_on_convergence: bool,
    degenerate_policy: DegeneratePolicy,
}

impl SlicSegmenter {
    pub fn new(num_clusters: usize, compactness: f32) -> Self {
        Self {
            num_clusters,
            compactness,
            iterations: 10,
            stop_on_convergence: false,
            degenerate_policy: DegeneratePolicy::Retain,
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Stop early once a round leaves every centroid exactly where it was.
    pub fn with_convergence_check(mut self, enabled: bool) -> Self {
        self.stop_on_convergence = enabled;
        self
    }

    pub fn with_degenerate_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.degenerate_policy = policy;
        self
    }

    /// Runs the segmentation, calling `observer(round, &engine)` after each
    /// centroid update. Rounds are numbered from 0.
    pub fn segment_with<F>(&self, img: &LabImage, mut observer: F) -> Result<Segmentation>
    where
        F: FnMut(usize, &SlicEngine<'_>),
    {
        if self.iterations == 0 {
            return Err(Error::invalid("iterations", "must be at least 1"));
        }
        let mut engine = SlicEngine::new(img, self.num_clusters, self.compactness)?
            .with_degenerate_policy(self.degenerate_policy);

        let moved = engine.perturb_seeds();
        debug!("{} of {} seeds moved off an edge", moved, engine.clusters().len());

        let mut rounds = 0;
        for round in 0..self.iterations {
            let before = self.stop_on_convergence.then(|| engine.centroids());
            engine.assign();
            let degenerate = engine.update_centroids();
            rounds += 1;
            debug!("round {}: {} empty clusters", round, degenerate);
            observer(round, &engine);

            if before.is_some_and(|centroids| centroids == engine.centroids()) {
                info!("centroids stable after {} rounds", rounds);
                break;
            }
        }

        Ok(engine.into_segmentation(rounds))
    }
}

impl Segmenter for SlicSegmenter {
    fn segment(&self, img: &LabImage) -> Result<Segmentation> {
        self.segment_with(img, |_, _| {})
    }
}
