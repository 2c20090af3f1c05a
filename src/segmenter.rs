use crate::error::Result;
use crate::lab_image::LabImage;

pub mod assignment;
pub mod cluster;
pub mod engine;
pub mod slic;

use cluster::Cluster;

pub trait Segmenter {
    fn segment(&self, img: &LabImage) -> Result<Segmentation>;
}

/// Final label map and clusters of a segmentation run.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) labels: Vec<Option<usize>>,
    pub(crate) clusters: Vec<Cluster>,
    pub(crate) rounds: usize,
}

impl Segmentation {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Cluster id owning `(row, col)`. `None` if no cluster ever reached it
    /// or the coordinate lies outside the image.
    pub fn label(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.labels[row * self.width + col]
    }

    /// Cluster ids per pixel, row-major.
    pub fn labels(&self) -> &[Option<usize>] {
        &self.labels
    }

    /// Clusters in ascending id order.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, id: usize) -> Option<&Cluster> {
        self.clusters
            .binary_search_by_key(&id, Cluster::id)
            .ok()
            .map(|index| &self.clusters[index])
    }

    /// Number of assign/update rounds that ran.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// `image` with each owned pixel replaced by its cluster's centroid color.
    pub fn snapshot(&self, image: &LabImage) -> LabImage {
        assert_eq!((image.width(), image.height()), (self.width, self.height));
        engine::paint(image, |index| {
            self.labels[index]
                .and_then(|id| self.cluster(id))
                .map(Cluster::color)
        })
    }
}
