//! Frame extraction from video containers.
//!
//! [`VideoSource`] opens a video file via FFmpeg and yields every frame in
//! presentation order as an [`image::DynamicImage`]. Frames are decoded
//! lazily — each call to [`FrameSource::next_frame`] reads and decodes just
//! enough packets to produce the next frame, so the full frame set is never
//! buffered in memory.
//!
//! The [`FrameSource`] trait is the seam between decoding and the task
//! runner: production code uses `VideoSource`, tests drive the runner with
//! synthetic sources.
//!
//! # Example
//!
//! ```no_run
//! use stillcut::{FrameSource, VideoSource};
//!
//! let mut source = VideoSource::open("input.mp4")?;
//! println!("container declares ~{} frames", source.declared_frames());
//!
//! while let Some(frame) = source.next_frame()? {
//!     println!("decoded a {}x{} frame", frame.width(), frame.height());
//! }
//! # Ok::<(), stillcut::StillcutError>(())
//! ```

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, RgbImage};

use crate::error::StillcutError;

/// A lazy, finite, non-restartable sequence of decoded video frames.
///
/// Implementations yield frames strictly in presentation order; each frame
/// is produced exactly once. [`declared_frames`](FrameSource::declared_frames)
/// reports the frame count the container claims, which may be inaccurate for
/// malformed files — callers must treat it as an estimate for progress
/// reporting, not a guarantee of how many frames
/// [`next_frame`](FrameSource::next_frame) will yield.
///
/// Sources are not required to be `Send`: the task runner constructs its
/// source *inside* the blocking decode thread (FFmpeg contexts hold raw
/// pointers), so a source never crosses a thread boundary.
pub trait FrameSource {
    /// The total frame count reported by the container.
    fn declared_frames(&self) -> u64;

    /// Decode and return the next frame, `None` once the stream is drained.
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, StillcutError>;
}

/// FFmpeg-backed [`FrameSource`] over a video file.
///
/// Created via [`VideoSource::open`]. Holds the demuxer, the video decoder,
/// and a scaler converting whatever the codec produces into packed RGB24.
pub struct VideoSource {
    input_context: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    video_stream_index: usize,
    declared_frames: u64,
    width: u32,
    height: u32,
    decoded_frame: VideoFrame,
    scaled_frame: VideoFrame,
    eof_sent: bool,
    done: bool,
    file_path: PathBuf,
}

impl VideoSource {
    /// Open a video file for frame extraction.
    ///
    /// Initializes FFmpeg (idempotent), opens the container, locates the
    /// best video stream, and derives the declared frame count from the
    /// container duration and average frame rate — the container itself
    /// rarely records an exact count.
    ///
    /// # Errors
    ///
    /// - [`StillcutError::MediaOpen`] if the file cannot be opened, has no
    ///   video stream, or no decoder can be created for it.
    /// - [`StillcutError::EmptyMedia`] if the declared frame count is
    ///   non-positive.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StillcutError> {
        let path = path.as_ref();
        let file_path = path.to_path_buf();

        log::debug!("Opening video source: {}", file_path.display());

        // Safe to call multiple times.
        ffmpeg_next::init().map_err(|error| StillcutError::MediaOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| StillcutError::MediaOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or_else(|| StillcutError::MediaOpen {
                path: file_path.clone(),
                reason: "No video stream found in file".to_string(),
            })?;
        let video_stream_index = stream.index();

        let frames_per_second = frames_per_second(stream.avg_frame_rate(), stream.rate());

        let duration_microseconds = input_context.duration();
        let duration_seconds = if duration_microseconds > 0 {
            duration_microseconds as f64 / 1_000_000.0
        } else {
            0.0
        };

        // Prefer the stream's own frame count when the demuxer knows it;
        // fall back to duration x fps like the metadata probe does.
        let declared_frames = if stream.frames() > 0 {
            stream.frames() as u64
        } else {
            (duration_seconds * frames_per_second) as u64
        };

        let codec_parameters = stream.parameters();
        let decoder_context =
            CodecContext::from_parameters(codec_parameters).map_err(|error| {
                StillcutError::MediaOpen {
                    path: file_path.clone(),
                    reason: format!("Failed to read video codec parameters: {error}"),
                }
            })?;
        let decoder =
            decoder_context
                .decoder()
                .video()
                .map_err(|error| StillcutError::MediaOpen {
                    path: file_path.clone(),
                    reason: format!("Failed to create video decoder: {error}"),
                })?;

        if declared_frames == 0 {
            return Err(StillcutError::EmptyMedia { path: file_path });
        }

        let width = decoder.width();
        let height = decoder.height();

        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| StillcutError::MediaOpen {
            path: file_path.clone(),
            reason: format!("Failed to create scaling context: {error}"),
        })?;

        log::info!(
            "Opened video source: {} ({}x{}, ~{} frames, {:.2} fps)",
            file_path.display(),
            width,
            height,
            declared_frames,
            frames_per_second,
        );

        Ok(Self {
            input_context,
            decoder,
            scaler,
            video_stream_index,
            declared_frames,
            width,
            height,
            decoded_frame: VideoFrame::empty(),
            scaled_frame: VideoFrame::empty(),
            eof_sent: false,
            done: false,
            file_path,
        })
    }

    /// Scale and convert the current `decoded_frame` to a `DynamicImage`.
    fn convert_current_frame(&mut self) -> Result<DynamicImage, StillcutError> {
        self.scaler
            .run(&self.decoded_frame, &mut self.scaled_frame)?;

        let buffer = frame_to_rgb_buffer(&self.scaled_frame, self.width, self.height);
        let img = RgbImage::from_raw(self.width, self.height, buffer).ok_or_else(|| {
            StillcutError::Decode(format!(
                "{}: failed to construct RGB image from decoded frame data",
                self.file_path.display(),
            ))
        })?;

        Ok(DynamicImage::ImageRgb8(img))
    }
}

impl FrameSource for VideoSource {
    fn declared_frames(&self) -> u64 {
        self.declared_frames
    }

    fn next_frame(&mut self) -> Result<Option<DynamicImage>, StillcutError> {
        if self.done {
            return Ok(None);
        }

        loop {
            // Try to receive a frame the decoder has already produced.
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                return self.convert_current_frame().map(Some);
            }

            // Decoder has no buffered frames. Feed it more packets.
            if self.eof_sent {
                // Already sent EOF and decoder is drained.
                self.done = true;
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        self.decoder.send_packet(&packet).map_err(|error| {
                            self.done = true;
                            StillcutError::Decode(format!(
                                "{}: {error}",
                                self.file_path.display(),
                            ))
                        })?;
                    }
                    // Non-video packets are silently skipped.
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof().map_err(|error| {
                        self.done = true;
                        StillcutError::Decode(format!(
                            "{}: {error}",
                            self.file_path.display(),
                        ))
                    })?;
                    self.eof_sent = true;
                }
                Err(_) => {
                    // Non-fatal read error — try the next packet.
                }
            }
        }
    }
}

/// Compute frames per second from the stream's average frame rate, falling
/// back to the raw rate field when the average is unavailable.
fn frames_per_second(average: Rational, raw: Rational) -> f64 {
    if average.denominator() != 0 {
        average.numerator() as f64 / average.denominator() as f64
    } else if raw.denominator() != 0 {
        raw.numerator() as f64 / raw.denominator() as f64
    } else {
        0.0
    }
}

/// Copy pixel data from an FFmpeg video frame into a tightly-packed RGB
/// buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × 3).
/// This strips the padding so the result can be passed directly to
/// [`image::RgbImage::from_raw`].
fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == expected_stride {
        // No padding — copy the entire plane at once.
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        // Stride includes padding bytes — copy row by row.
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}
