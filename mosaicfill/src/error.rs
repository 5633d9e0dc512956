use std::path::PathBuf;

/// Fatal errors raised while setting up or feeding the pipeline.
///
/// Per-frame classification and stabilization never fail; these variants only
/// surface at construction time or at the frame source/sink boundary.
#[derive(Debug, thiserror::Error)]
pub enum MosaicError {
    /// The reference image of a layout could not be read or decoded.
    #[error("failed to load layout reference image {path}")]
    LayoutLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The reference image decoded, but no patch survived the area filter.
    #[error("layout '{name}' contains no valid patches")]
    EmptyLayout { name: String },

    /// The pipeline was constructed without any layout.
    #[error("at least one layout is required")]
    NoLayouts,

    /// The frame source could not be opened or a frame could not be acquired.
    #[error("frame acquisition failed: {message}")]
    Capture {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A rendered frame or patch report could not be written.
    #[error("failed to write output {path}")]
    Output {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A configuration file could not be read or parsed.
    #[error("invalid configuration {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Configuration values that are out of range, wherever they came from.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl MosaicError {
    pub(crate) fn capture(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        MosaicError::Capture {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub(crate) fn output(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        MosaicError::Output {
            path: path.into(),
            source: source.into(),
        }
    }
}
