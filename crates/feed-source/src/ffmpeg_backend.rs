//! Native clip decoding through FFmpeg (feature `ffmpeg`).
//!
//! Decode-on-demand: every request seeks to the target timestamp and
//! decodes forward until a frame lands. This trades per-frame latency for
//! not keeping a running pipeline, which matches how the manager models
//! playback with its own clock.

use crate::{Error, Frame, PixelFormat, Result, VideoClip};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::media::Type;
use ffmpeg_next::software::scaling;
use std::path::Path;
use time::OffsetDateTime;
use tracing::debug;

pub struct FfmpegClip {
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    time_base: f64,
    duration_ms: u64,
}

impl FfmpegClip {
    pub fn open_local(path: &str) -> Result<Self> {
        if !Path::new(path).is_file() {
            return Err(Error::NotFound(path.to_string()));
        }
        Self::open(path)
    }

    pub fn open_url(url: &str) -> Result<Self> {
        Self::open(url)
    }

    fn open(source: &str) -> Result<Self> {
        ffmpeg::init().map_err(|e| Error::PrepareFailed(e.to_string()))?;
        let ictx = ffmpeg::format::input(&source).map_err(|e| Error::PrepareFailed(e.to_string()))?;
        let stream = ictx
            .streams()
            .best(Type::Video)
            .ok_or_else(|| Error::PrepareFailed(format!("no video stream in {source}")))?;
        let stream_index = stream.index();
        let time_base = f64::from(stream.time_base());

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| Error::PrepareFailed(e.to_string()))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| Error::PrepareFailed(e.to_string()))?;

        let duration_ms = if ictx.duration() > 0 {
            (ictx.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE) * 1000.0) as u64
        } else {
            0
        };
        debug!(source, duration_ms, "opened ffmpeg clip");

        Ok(Self {
            ictx,
            decoder,
            stream_index,
            time_base,
            duration_ms,
        })
    }

    fn to_rgb_frame(&self, decoded: &ffmpeg::util::frame::Video) -> Result<Frame> {
        let mut scaler = scaling::Context::get(
            decoded.format(),
            decoded.width(),
            decoded.height(),
            Pixel::RGB24,
            decoded.width(),
            decoded.height(),
            scaling::Flags::BILINEAR,
        )
        .map_err(|e| Error::Decode(e.to_string()))?;

        let mut rgb = ffmpeg::util::frame::Video::empty();
        scaler
            .run(decoded, &mut rgb)
            .map_err(|e| Error::Decode(e.to_string()))?;

        let width = rgb.width();
        let height = rgb.height();
        let stride = rgb.stride(0);
        let row_len = width as usize * 3;
        let mut data = Vec::with_capacity(row_len * height as usize);
        let plane = rgb.data(0);
        for row in 0..height as usize {
            let start = row * stride;
            data.extend_from_slice(&plane[start..start + row_len]);
        }

        Ok(Frame {
            width,
            height,
            pixel_format: PixelFormat::Rgb8,
            data,
            ts: Some(OffsetDateTime::now_utc()),
        })
    }
}

impl VideoClip for FfmpegClip {
    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn frame_at(&mut self, position_ms: u64) -> Result<Frame> {
        let target = (position_ms as i64) * i64::from(ffmpeg::ffi::AV_TIME_BASE) / 1000;
        self.ictx
            .seek(target, ..target)
            .map_err(|e| Error::Decode(e.to_string()))?;
        self.decoder.flush();

        let wanted_ts = position_ms as f64 / 1000.0;
        let stream_index = self.stream_index;
        let mut decoded = ffmpeg::util::frame::Video::empty();
        for (stream, packet) in self.ictx.packets() {
            if stream.index() != stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .map_err(|e| Error::Decode(e.to_string()))?;
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let pts = decoded.pts().unwrap_or(0) as f64 * self.time_base;
                if pts + f64::EPSILON >= wanted_ts {
                    return self.to_rgb_frame(&decoded);
                }
            }
        }

        // Past end of stream: deliver the last decoded frame if any.
        if decoded.width() > 0 {
            return self.to_rgb_frame(&decoded);
        }
        Err(Error::Decode(format!("no frame at {position_ms} ms")))
    }

    fn supports_rate(&self) -> bool {
        true
    }
}
