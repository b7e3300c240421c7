use std::io::{Read, Write as _};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::config::ExportDefaults;
use crate::encode::sink::{
    FrameSink, SinkConfig, discard_artifact, ensure_parent_dir, expect_raster,
};
use crate::foundation::error::{InkdeckError, InkdeckResult};
use crate::foundation::math::flatten_premul_over;
use crate::render::backend::RenderedSlide;

/// Options for [`VideoSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct VideoSinkOpts {
    pub out_path: PathBuf,
    /// How long each slide stays on screen.
    pub delay_ms: u32,
    pub fps: u32,
    /// Replay the whole deck until at least this much time is covered.
    pub loop_to_ms: Option<u64>,
    /// Trailing hold after the last frame so the recorder captures it.
    pub flush_ms: u32,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
}

impl VideoSinkOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self::from_defaults(out_path, &ExportDefaults::default())
    }

    pub fn from_defaults(out_path: impl Into<PathBuf>, defaults: &ExportDefaults) -> Self {
        Self {
            out_path: out_path.into(),
            delay_ms: defaults.frame_delay_ms,
            fps: defaults.video_fps,
            loop_to_ms: None,
            flush_ms: defaults.video_flush_ms,
            overwrite: true,
        }
    }

    pub fn validate(&self) -> InkdeckResult<()> {
        if self.fps == 0 {
            return Err(InkdeckError::validation("fps must be non-zero"));
        }
        if self.delay_ms == 0 {
            return Err(InkdeckError::validation("video frame delay must be non-zero"));
        }
        Ok(())
    }
}

/// How the slide sequence maps onto encoded video frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoTimeline {
    /// Encoded frames per slide.
    pub hold_frames: u32,
    /// Times the full slide sequence is played.
    pub repeat: u32,
    /// Extra copies of the final frame.
    pub flush_frames: u32,
    pub total_frames: u64,
}

impl VideoTimeline {
    pub fn duration_ms(&self, fps: u32) -> u64 {
        self.total_frames * 1000 / u64::from(fps.max(1))
    }
}

/// Plan hold, loop and flush frame counts.
///
/// With `loop_to_ms` the deck repeats `ceil(loop_to_ms / (frame_count · delay_ms))` times.
pub fn plan_video_timeline(
    frame_count: usize,
    delay_ms: u32,
    fps: u32,
    loop_to_ms: Option<u64>,
    flush_ms: u32,
) -> InkdeckResult<VideoTimeline> {
    if frame_count == 0 {
        return Err(InkdeckError::validation("video needs at least one frame"));
    }
    if fps == 0 || delay_ms == 0 {
        return Err(InkdeckError::validation("fps and frame delay must be non-zero"));
    }
    let hold_frames = ((u64::from(delay_ms) * u64::from(fps) + 500) / 1000).max(1);
    let pass_ms = frame_count as u64 * u64::from(delay_ms);
    let repeat = match loop_to_ms {
        Some(target) if target > 0 => target.div_ceil(pass_ms).max(1),
        _ => 1,
    };
    let flush_frames = (u64::from(flush_ms) * u64::from(fps)).div_ceil(1000);
    let total_frames = frame_count as u64 * hold_frames * repeat + flush_frames;

    let narrow = |v: u64, what: &str| {
        u32::try_from(v).map_err(|_| InkdeckError::validation(format!("video {what} too large")))
    };
    Ok(VideoTimeline {
        hold_frames: narrow(hold_frames, "hold")?,
        repeat: narrow(repeat, "repeat count")?,
        flush_frames: narrow(flush_frames, "flush")?,
        total_frames,
    })
}

/// Sink that spawns the system `ffmpeg` and streams a fixed-size RGBA surface to stdin.
///
/// Each slide is drawn onto the surface at (0, 0) and held for the slide delay. Odd output sizes
/// are padded with the background to satisfy yuv420p.
pub struct VideoSink {
    opts: VideoSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    surface: Vec<u8>,
    surface_w: u32,
    surface_h: u32,
    bg_rgba: [u8; 4],
    timeline: Option<VideoTimeline>,
    /// Composed surfaces kept for loop replays.
    replay: Vec<Vec<u8>>,
    frames_written: u64,
}

impl VideoSink {
    pub fn new(opts: VideoSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            surface: Vec::new(),
            surface_w: 0,
            surface_h: 0,
            bg_rgba: [0, 0, 0, 255],
            timeline: None,
            replay: Vec::new(),
            frames_written: 0,
        }
    }

    pub fn timeline(&self) -> Option<VideoTimeline> {
        self.timeline
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn write_surface(&mut self, data_from_replay: Option<usize>, times: u32) -> InkdeckResult<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(InkdeckError::encode("ffmpeg sink is already finalized"));
        };
        let data = match data_from_replay {
            Some(i) => &self.replay[i],
            None => &self.surface,
        };
        for _ in 0..times {
            stdin.write_all(data).map_err(|e| {
                InkdeckError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
            })?;
        }
        self.frames_written += u64::from(times);
        Ok(())
    }

    fn finish_child(&mut self) -> InkdeckResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| InkdeckError::encode("ffmpeg sink not started"))?;

        let status = child.wait().map_err(|e| {
            InkdeckError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| InkdeckError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| InkdeckError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(InkdeckError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl FrameSink for VideoSink {
    fn begin(&mut self, cfg: SinkConfig) -> InkdeckResult<()> {
        self.opts.validate()?;
        if cfg.width == 0 || cfg.height == 0 {
            return Err(InkdeckError::validation(
                "video sink width/height must be non-zero",
            ));
        }
        if !is_ffmpeg_on_path() {
            return Err(InkdeckError::unsupported(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }
        let timeline = plan_video_timeline(
            cfg.frame_count,
            self.opts.delay_ms,
            self.opts.fps,
            self.opts.loop_to_ms,
            self.opts.flush_ms,
        )?;

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(InkdeckError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        self.surface_w = cfg.width + cfg.width % 2;
        self.surface_h = cfg.height + cfg.height % 2;

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if self.opts.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", self.surface_w, self.surface_h),
            "-r",
            &self.opts.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]);
        cmd.arg(&self.opts.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            InkdeckError::unsupported(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| InkdeckError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| InkdeckError::encode("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::debug!(
            width = self.surface_w,
            height = self.surface_h,
            hold = timeline.hold_frames,
            repeat = timeline.repeat,
            flush = timeline.flush_frames,
            "ffmpeg started"
        );
        self.bg_rgba = cfg.background.to_array();
        self.bg_rgba[3] = 255;
        self.surface = vec![0u8; (self.surface_w * self.surface_h * 4) as usize];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.timeline = Some(timeline);
        self.replay.clear();
        self.frames_written = 0;
        Ok(())
    }

    fn push_frame(&mut self, index: usize, frame: &RenderedSlide) -> InkdeckResult<()> {
        let timeline = self
            .timeline
            .ok_or_else(|| InkdeckError::encode("ffmpeg sink not started"))?;
        let frame = expect_raster(index, frame)?;
        if frame.width > self.surface_w || frame.height > self.surface_h {
            return Err(InkdeckError::validation(format!(
                "frame size mismatch: got {}x{}, surface is {}x{}",
                frame.width, frame.height, self.surface_w, self.surface_h
            )));
        }

        let bg = self.bg_rgba;
        for px in self.surface.chunks_exact_mut(4) {
            px.copy_from_slice(&bg);
        }
        let premul = frame.premultiplied_data();
        let src_stride = frame.width as usize * 4;
        let dst_stride = self.surface_w as usize * 4;
        for (y, src_row) in premul.chunks_exact(src_stride).enumerate() {
            let start = y * dst_stride;
            flatten_premul_over(&mut self.surface[start..start + src_stride], src_row, bg);
        }

        if timeline.repeat > 1 {
            self.replay.push(self.surface.clone());
        }
        self.write_surface(None, timeline.hold_frames)
    }

    fn end(&mut self) -> InkdeckResult<()> {
        let timeline = self
            .timeline
            .take()
            .ok_or_else(|| InkdeckError::encode("ffmpeg sink not started"))?;
        for _ in 1..timeline.repeat {
            for i in 0..self.replay.len() {
                self.write_surface(Some(i), timeline.hold_frames)?;
            }
        }
        // The surface still holds the last slide.
        self.write_surface(None, timeline.flush_frames)?;
        self.replay.clear();
        self.finish_child()?;
        tracing::debug!(frames = self.frames_written, "ffmpeg finalized");
        Ok(())
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
        self.timeline = None;
        self.replay.clear();
        discard_artifact(&self.opts.out_path);
    }
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_to_duration_rounds_repeats_up() {
        let t = plan_video_timeline(3, 1000, 30, Some(10_000), 100).unwrap();
        assert_eq!(t.hold_frames, 30);
        assert_eq!(t.repeat, 4);
        assert_eq!(t.flush_frames, 3);
        assert_eq!(t.total_frames, 3 * 30 * 4 + 3);
    }

    #[test]
    fn exact_multiple_does_not_add_a_pass() {
        let t = plan_video_timeline(2, 500, 24, Some(2_000), 0).unwrap();
        assert_eq!(t.repeat, 2);
        assert_eq!(t.flush_frames, 0);
        assert_eq!(t.hold_frames, 12);
    }

    #[test]
    fn short_delays_still_hold_one_frame() {
        let t = plan_video_timeline(1, 10, 24, None, 0).unwrap();
        assert_eq!(t.hold_frames, 1);
        assert_eq!(t.repeat, 1);
        assert_eq!(t.duration_ms(24), 41);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert!(plan_video_timeline(0, 100, 30, None, 0).is_err());
        assert!(plan_video_timeline(1, 0, 30, None, 0).is_err());
        assert!(plan_video_timeline(1, 100, 0, None, 0).is_err());
    }
}
