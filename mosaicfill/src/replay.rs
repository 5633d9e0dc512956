// Session loop and file-based frame I/O
// Frames come from a JSON manifest of rectified images; results go to a directory

use crate::error::MosaicError;
use crate::pipeline::{FrameInput, FrameOutput, MosaicPipeline};
use crate::rotation::MarkerCorners;
use log::{debug, info};
use mosaicfill_common::{OutputFormat, PatchState, Point2D, Rotation};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Operator command, checked once per frame boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Quit,
    Reset,
}

/// Where rectified frames come from
pub trait FrameSource {
    /// Block until the next frame is available; `None` once the stream has ended
    fn next_frame(&mut self) -> Result<Option<FrameInput>, MosaicError>;

    /// Operator input received since the last poll, if any
    fn poll_command(&mut self) -> Option<Command>;
}

/// Where processed frames go
pub trait FrameSink {
    fn present(&mut self, output: &FrameOutput) -> Result<(), MosaicError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub frames: u64,
    pub layout_switches: u32,
    pub resets: u32,
    /// The loop ended on a quit command rather than end of stream
    pub quit: bool,
    pub final_rotation: Rotation,
    pub final_layout: usize,
}

/// Pull, process and present frames one at a time until the source ends or a
/// quit command arrives. The frame in progress always completes first.
pub fn run_session<S, K>(
    pipeline: &mut MosaicPipeline,
    source: &mut S,
    sink: &mut K,
) -> Result<SessionSummary, MosaicError>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    let mut frames = 0u64;
    let mut layout_switches = 0u32;
    let mut resets = 0u32;
    let mut quit = false;

    while let Some(input) = source.next_frame()? {
        let output = pipeline.process(&input);
        frames += 1;
        if output.layout_switched {
            layout_switches += 1;
        }
        sink.present(&output)?;

        match source.poll_command() {
            Some(Command::Quit) => {
                info!("quit requested after frame {}", output.index);
                quit = true;
                break;
            }
            Some(Command::Reset) => {
                pipeline.reset();
                resets += 1;
            }
            None => {}
        }
    }

    Ok(SessionSummary {
        frames,
        layout_switches,
        resets,
        quit,
        final_rotation: pipeline.rotation(),
        final_layout: pipeline.active_layout(),
    })
}

#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    frames: Vec<ManifestFrame>,
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestFrame {
    image: PathBuf,
    #[serde(default)]
    marker: Option<[[f32; 2]; 4]>,
    #[serde(default)]
    command: Option<Command>,
}

/// Replays a recorded session described by a JSON manifest:
///
/// ```json
/// { "frames": [ { "image": "f000.png", "marker": [[40,40],[60,40],[60,60],[40,60]] },
///               { "image": "f001.png", "command": "reset" } ] }
/// ```
///
/// Relative image paths resolve against the manifest's directory. A frame's
/// `command` is delivered by the poll that follows it.
#[derive(Debug)]
pub struct ReplaySource {
    base_dir: PathBuf,
    frames: VecDeque<ManifestFrame>,
    pending: Option<Command>,
}

impl ReplaySource {
    pub fn open(manifest_path: &Path) -> Result<Self, MosaicError> {
        let contents = fs::read_to_string(manifest_path).map_err(|e| {
            MosaicError::capture(format!("cannot read manifest {}", manifest_path.display()), e)
        })?;
        let manifest: Manifest = serde_json::from_str(&contents).map_err(|e| {
            MosaicError::capture(format!("malformed manifest {}", manifest_path.display()), e)
        })?;
        let base_dir = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        info!(
            "replaying {} frame(s) from {}",
            manifest.frames.len(),
            manifest_path.display()
        );
        Ok(Self {
            base_dir,
            frames: manifest.frames.into(),
            pending: None,
        })
    }

    /// Frames not yet delivered
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<FrameInput>, MosaicError> {
        let Some(entry) = self.frames.pop_front() else {
            return Ok(None);
        };
        let path = if entry.image.is_absolute() {
            entry.image.clone()
        } else {
            self.base_dir.join(&entry.image)
        };
        let frame = image::open(&path)
            .map_err(|e| MosaicError::capture(format!("cannot read frame {}", path.display()), e))?
            .to_rgb8();
        debug!("loaded frame {} ({}x{})", path.display(), frame.width(), frame.height());

        let marker = entry
            .marker
            .map(|corners| MarkerCorners::new(corners.map(|[x, y]| Point2D::new(x, y))));
        self.pending = entry.command;
        Ok(Some(FrameInput::new(frame, marker)))
    }

    fn poll_command(&mut self) -> Option<Command> {
        self.pending.take()
    }
}

/// One line of the JSON-lines patch report
#[derive(Debug, Serialize)]
struct FrameRecord<'a> {
    index: u64,
    rotation: Rotation,
    layout: usize,
    layout_name: &'a str,
    switched: bool,
    patches: &'a [PatchState],
}

/// Writes `frame_NNNNN.png` composites and/or `patches.jsonl` into a directory
pub struct DirectorySink {
    dir: PathBuf,
    format: OutputFormat,
    report: Option<BufWriter<File>>,
}

impl DirectorySink {
    pub const REPORT_FILE: &'static str = "patches.jsonl";

    pub fn create(dir: &Path, format: OutputFormat) -> Result<Self, MosaicError> {
        fs::create_dir_all(dir).map_err(|e| MosaicError::output(dir, e))?;
        let report = if format.includes_json() {
            let path = dir.join(Self::REPORT_FILE);
            let file = File::create(&path).map_err(|e| MosaicError::output(&path, e))?;
            Some(BufWriter::new(file))
        } else {
            None
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            format,
            report,
        })
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:05}.png", index))
    }
}

impl FrameSink for DirectorySink {
    fn present(&mut self, output: &FrameOutput) -> Result<(), MosaicError> {
        if self.format.includes_png() {
            let path = self.frame_path(output.index);
            output
                .composite
                .save(&path)
                .map_err(|e| MosaicError::output(&path, e))?;
        }

        if let Some(report) = self.report.as_mut() {
            let path = self.dir.join(Self::REPORT_FILE);
            let record = FrameRecord {
                index: output.index,
                rotation: output.rotation,
                layout: output.active_layout,
                layout_name: &output.layout_name,
                switched: output.layout_switched,
                patches: &output.patches,
            };
            serde_json::to_writer(&mut *report, &record).map_err(|e| MosaicError::output(&path, e))?;
            writeln!(report)
                .and_then(|_| report.flush())
                .map_err(|e| MosaicError::output(&path, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_entries_parse() {
        let json = r#"{ "frames": [
            { "image": "a.png", "marker": [[1,2],[3,4],[5,6],[7,8]] },
            { "image": "b.png", "command": "reset" },
            { "image": "c.png", "command": "quit" }
        ] }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.frames.len(), 3);
        assert_eq!(manifest.frames[0].marker.unwrap()[3], [7.0, 8.0]);
        assert_eq!(manifest.frames[1].command, Some(Command::Reset));
        assert_eq!(manifest.frames[2].command, Some(Command::Quit));
        assert!(manifest.frames[1].marker.is_none());
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let json = r#"{ "frames": [ { "image": "a.png", "command": "pause" } ] }"#;
        assert!(serde_json::from_str::<Manifest>(json).is_err());
    }

    #[test]
    fn test_missing_manifest_is_capture_error() {
        let err = ReplaySource::open(Path::new("/nonexistent/frames.json")).unwrap_err();
        assert!(matches!(err, MosaicError::Capture { .. }));
    }
}
