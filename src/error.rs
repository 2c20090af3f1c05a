/// Result alias for segmentation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the segmentation engine.
///
/// A cluster that ends a round with no pixels is not an error: it is recovered
/// according to the engine's [`DegeneratePolicy`](crate::DegeneratePolicy).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration value is out of range. Raised before any work is done.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        name: &'static str,
        message: String,
    },

    /// A raw pixel buffer does not match the stated image dimensions.
    #[error("shape mismatch: expected {expected} pixels, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}
