//! Stable per-patch color readings for a mosaic board seen through a camera.
//!
//! Rectified frames go through [`MosaicPipeline::process`], which debounces
//! the board orientation, picks the matching layout, classifies every patch and
//! smooths the result over time before rendering a composite.

pub mod classifier;
pub mod color;
pub mod config;
pub mod error;
pub mod history;
pub mod layout;
pub mod pipeline;
pub mod render;
pub mod replay;
pub mod rotation;
pub mod selector;

pub use classifier::{ClassificationResult, PatchColorClassifier};
pub use config::MosaicConfig;
pub use error::MosaicError;
pub use history::{PatchHistory, PatchTracker, RatioEma};
pub use layout::{Patch, PatchMask, TemplateLayout};
pub use pipeline::{FrameInput, FrameOutput, MosaicPipeline};
pub use replay::{run_session, Command, DirectorySink, FrameSink, FrameSource, ReplaySource, SessionSummary};
pub use rotation::{MarkerCorners, RotationEstimator};
pub use selector::TemplateSelector;

pub use mosaicfill_common::{ColorLabel, OutputFormat, PatchState, Point2D, Rotation};
