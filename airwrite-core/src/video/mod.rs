//! video — frame sources feeding the tracking pipeline
//!
//! Sources are pull-based: the caller asks for the next frame at its own
//! cadence and gets `Ok(None)` once the stream is exhausted.  Two sources are
//! provided, an FFmpeg-decoded video file and a directory of still images.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{format, frame, media, software::scaling};
use image::{ImageBuffer, Rgb, RgbImage};
use tracing::{debug, info};

use crate::persistence::natural_cmp;

/// Scaling flags — bilinear is fast and good enough for the decode path.
const SCALE_FLAGS: scaling::Flags = scaling::Flags::BILINEAR;
/// Image extensions picked up by [`ImageSequenceSource`].
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// A single video frame in RGB24 format, along with its presentation
/// timestamp (in the source's time-base units, or the frame number).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    pub data: Vec<u8>, // packed RGB24, row-major
    pub width: u32,
    pub height: u32,
    pub pts: i64,
}

impl RgbFrame {
    pub fn from_image(img: RgbImage, pts: i64) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
            pts,
        }
    }

    /// Write the frame as an image; the format follows the file extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let img: ImageBuffer<Rgb<u8>, &[u8]> =
            ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
                .context("frame buffer does not match its dimensions")?;
        img.save(path)
            .with_context(|| format!("failed to save frame to {}", path.display()))
    }
}

/// Mirror a frame left-to-right in place (selfie view for webcam footage).
pub fn flip_horizontal(frame: &mut RgbFrame) {
    let row_len = frame.width as usize * 3;
    if row_len == 0 {
        return;
    }
    for row in frame.data.chunks_exact_mut(row_len) {
        let (mut l, mut r) = (0, frame.width as usize - 1);
        while l < r {
            for c in 0..3 {
                row.swap(l * 3 + c, r * 3 + c);
            }
            l += 1;
            r -= 1;
        }
    }
}

/// Anything that can hand out frames one at a time.
pub trait FrameSource {
    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<RgbFrame>>;
}

/// Open `input` as an image directory if it is a directory, otherwise as a
/// video file.
pub fn open_source<P: AsRef<Path>>(input: P) -> Result<Box<dyn FrameSource>> {
    let input = input.as_ref();
    if input.is_dir() {
        Ok(Box::new(ImageSequenceSource::open(input)?))
    } else {
        Ok(Box::new(VideoFileSource::open(input)?))
    }
}

// ── Video file ───────────────────────────────────────────────────────────────

/// FFmpeg-decoded video stream converted to RGB24.
pub struct VideoFileSource {
    ictx: format::context::Input,
    decoder: ffmpeg::decoder::Video,
    to_rgb: scaling::Context,
    stream_index: usize,
    decoded: frame::Video,
    rgb: frame::Video,
    width: u32,
    height: u32,
    frame_count: i64,
    eof: bool,
}

impl VideoFileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        ffmpeg::init().context("failed to initialise FFmpeg")?;

        let ictx = format::input(&path).context("could not open input file")?;
        let stream = ictx
            .streams()
            .best(media::Type::Video)
            .context("no video stream found in input")?;
        let stream_index = stream.index();

        let decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("failed to build decoder context")?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .context("failed to open video decoder")?;

        let width = decoder.width();
        let height = decoder.height();
        if width == 0 || height == 0 {
            bail!("video stream reports an empty frame size");
        }
        let to_rgb = scaling::Context::get(
            decoder.format(),
            width,
            height,
            format::Pixel::RGB24,
            width,
            height,
            SCALE_FLAGS,
        )
        .context("failed to create to-RGB scaler")?;

        info!(width, height, path = %path.as_ref().display(), "opened video stream");

        Ok(Self {
            ictx,
            decoder,
            to_rgb,
            stream_index,
            decoded: frame::Video::empty(),
            rgb: frame::Video::empty(),
            width,
            height,
            frame_count: 0,
            eof: false,
        })
    }

    fn convert(&mut self) -> Result<RgbFrame> {
        self.to_rgb
            .run(&self.decoded, &mut self.rgb)
            .context("to-RGB scaling failed")?;

        // Compact to a plain Vec<u8> (remove stride padding if any)
        let stride = self.rgb.stride(0);
        let raw = self.rgb.data(0);
        let row_len = self.width as usize * 3;
        let mut data = Vec::with_capacity(row_len * self.height as usize);
        for row in 0..self.height as usize {
            let start = row * stride;
            data.extend_from_slice(&raw[start..start + row_len]);
        }

        let pts = self.decoded.pts().unwrap_or(self.frame_count);
        self.frame_count += 1;
        if self.frame_count % 100 == 0 {
            debug!(frame_count = self.frame_count, "decoded frames");
        }
        Ok(RgbFrame {
            data,
            width: self.width,
            height: self.height,
            pts,
        })
    }
}

impl FrameSource for VideoFileSource {
    fn next_frame(&mut self) -> Result<Option<RgbFrame>> {
        loop {
            if self.decoder.receive_frame(&mut self.decoded).is_ok() {
                return self.convert().map(Some);
            }
            if self.eof {
                return Ok(None);
            }

            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.ictx) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder
                            .send_packet(&packet)
                            .context("decoder send_packet")?;
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    // Drain whatever the decoder still buffers.
                    self.decoder.send_eof().ok();
                    self.eof = true;
                }
                Err(e) => return Err(e).context("failed to read packet"),
            }
        }
    }
}

// ── Image sequence ───────────────────────────────────────────────────────────

/// Still images from one directory, visited in natural filename order.
pub struct ImageSequenceSource {
    paths: std::vec::IntoIter<PathBuf>,
    next_pts: i64,
}

impl ImageSequenceSource {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for dirent in
            fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?
        {
            let path = dirent
                .with_context(|| format!("failed to list {}", dir.display()))?
                .path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if is_image && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));

        info!(frames = paths.len(), dir = %dir.display(), "opened image sequence");
        Ok(Self {
            paths: paths.into_iter(),
            next_pts: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<RgbFrame>> {
        let Some(path) = self.paths.next() else {
            return Ok(None);
        };
        let img = image::open(&path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .into_rgb8();
        let pts = self.next_pts;
        self.next_pts += 1;
        Ok(Some(RgbFrame::from_image(img, pts)))
    }
}
