mod error;
mod lab_image;
mod segmenter;

pub use error::{Error, Result};
pub use lab_image::{lab_distance, LabImage};
pub use segmenter::Segmenter;
pub use segmenter::Segmentation;
pub use segmenter::assignment::combined_distance;
pub use segmenter::cluster::Cluster;
pub use segmenter::engine::{grid_interval, grid_seeds, DegeneratePolicy, SlicEngine};
pub use segmenter::slic::SlicSegmenter;
