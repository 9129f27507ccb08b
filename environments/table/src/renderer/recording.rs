//! Frame recorder with named recordings and animated GIF export.
//!
//! A recorder owns at most one active buffer. `start` opens it (optionally
//! seeded with a copy of an existing recording), `add_frame` samples frames
//! every `frequency` calls, and `stop` files the buffer under an id.
//! Buffers hold at most `max_frames` frames; later frames are dropped.
//! `save` writes every non-empty recording to `<dir>/<stem><id>.gif`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use gif::{Encoder, Repeat};

use crate::error::TableEnvError;

use super::Frame;

/// Playback rate of exported GIFs.
const GIF_FPS: u16 = 10;

/// NeuQuant speed: 1-30, lower is better quality but slower.
const GIF_QUANTIZE_SPEED: i32 = 10;

/// 30 seconds of playback.
const DEFAULT_MAX_FRAMES: usize = 300;

#[derive(Debug)]
pub struct Recorder {
    frequency: usize,
    recordings: BTreeMap<String, Vec<Frame>>,
    buffer: Option<Vec<Frame>>,
    timestep: usize,
    max_frames: Option<usize>,
}

impl Recorder {
    pub fn new(frequency: usize) -> Self {
        Self {
            frequency: frequency.max(1),
            recordings: BTreeMap::new(),
            buffer: None,
            timestep: 0,
            max_frames: Some(DEFAULT_MAX_FRAMES),
        }
    }

    /// Cap on frames per buffer. `None` keeps every frame.
    pub fn set_max_frames(&mut self, max: Option<usize>) {
        self.max_frames = max;
    }

    pub fn max_frames(&self) -> Option<usize> {
        self.max_frames
    }

    /// True if the active buffer has reached `max_frames`.
    pub fn is_full(&self) -> bool {
        match (&self.buffer, self.max_frames) {
            (Some(frames), Some(max)) => frames.len() >= max,
            _ => false,
        }
    }

    pub fn frequency(&self) -> usize {
        self.frequency
    }

    pub fn is_recording(&self) -> bool {
        self.buffer.is_some()
    }

    /// Frames filed under `id`.
    pub fn recording(&self, id: &str) -> Option<&[Frame]> {
        self.recordings.get(id).map(Vec::as_slice)
    }

    pub fn num_recordings(&self) -> usize {
        self.recordings.len()
    }

    /// Open a buffer, continuing from `prepend_id` if that recording exists.
    pub fn start(&mut self, prepend_id: Option<&str>, frequency: Option<usize>) {
        if let Some(frequency) = frequency {
            self.frequency = frequency.max(1);
        }
        self.timestep = 0;
        let prefix = match prepend_id {
            Some(id) => match self.recordings.get(id) {
                Some(frames) => frames.clone(),
                None => {
                    log::warn!("recording '{}' not found, starting empty", id);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        self.buffer = Some(prefix);
    }

    /// File the active buffer under `save_id` (or ""). False if not recording.
    pub fn stop(&mut self, save_id: Option<&str>) -> bool {
        match self.buffer.take() {
            Some(frames) => {
                self.recordings.insert(save_id.unwrap_or_default().to_string(), frames);
                true
            }
            None => false,
        }
    }

    /// Capture a frame if recording and the sampling step is due.
    ///
    /// `grab` is only invoked when a frame is actually kept.
    pub fn add_frame(&mut self, grab: impl FnOnce() -> Frame, override_frequency: bool) -> bool {
        let full = self.is_full();
        let Some(buffer) = self.buffer.as_mut() else {
            return false;
        };
        let due = override_frequency || self.timestep % self.frequency == 0;
        self.timestep += 1;
        if !due {
            return false;
        }
        if full {
            log::debug!("recording full at {} frames, dropping frame", buffer.len());
            return false;
        }
        buffer.push(grab());
        true
    }

    /// Write every non-empty recording next to `path`. Returns whether
    /// anything was written.
    pub fn save(&mut self, path: &Path, reset: bool) -> Result<bool, TableEnvError> {
        let mut saved = false;
        for (id, frames) in &self.recordings {
            if frames.is_empty() {
                continue;
            }
            let target = recording_path(path, id);
            if let Some(dir) = target.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            write_gif(&target, frames)?;
            log::debug!("saved {} frames to {}", frames.len(), target.display());
            saved = true;
        }
        if reset {
            self.recordings.clear();
        }
        Ok(saved)
    }
}

/// `<dir>/<stem><id>.gif`
fn recording_path(path: &Path, id: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{id}.gif"))
}

fn write_gif(path: &Path, frames: &[Frame]) -> Result<(), TableEnvError> {
    let Some(first) = frames.first() else {
        return Ok(());
    };
    let (width, height) = (first.width as u16, first.height as u16);
    let writer = BufWriter::new(File::create(path)?);

    let gif_err = |e: gif::EncodingError| TableEnvError::Recording(e.to_string());
    let mut encoder = Encoder::new(writer, width, height, &[]).map_err(gif_err)?;
    encoder.set_repeat(Repeat::Infinite).map_err(gif_err)?;

    for frame in frames {
        if frame.width != first.width || frame.height != first.height {
            log::warn!(
                "skipping {}x{} frame in {}x{} recording",
                frame.width,
                frame.height,
                first.width,
                first.height
            );
            continue;
        }
        let mut gif_frame = gif::Frame::from_rgb_speed(width, height, &frame.rgb, GIF_QUANTIZE_SPEED);
        gif_frame.delay = (100 / GIF_FPS).max(1);
        encoder.write_frame(&gif_frame).map_err(gif_err)?;
    }
    Ok(())
}
