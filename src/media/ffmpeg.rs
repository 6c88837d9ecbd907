//! FFmpeg subprocess wrapper
//!
//! Every invocation runs under a deadline. A process that outlives it is
//! killed and reported as `ToolError::TimedOut`.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{
    vertical_crop, AudioExtractor, ExtractionError, MuxError, ToolError, VideoMuxer,
    VERTICAL_HEIGHT,
};
use crate::audio_util::{read_wav, Waveform};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// Keep only the end of stderr in error messages
const STDERR_TAIL: usize = 2000;

/// FFmpeg settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FfmpegSettings {
    /// Explicit ffmpeg binary, otherwise looked up on PATH
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe binary, otherwise looked up on PATH
    pub ffprobe_path: Option<PathBuf>,
    /// Sample rate of extracted audio
    pub sample_rate: u32,
    pub video_codec: String,
    pub audio_codec: String,
    /// Upper bound for a single ffmpeg/ffprobe invocation.
    ///
    /// Applied per call, not per run: a vertical run makes three calls
    /// (probe, crop, mux) and can take up to three times this long.
    pub timeout_secs: u64,
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            sample_rate: 44100,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            timeout_secs: 600,
        }
    }
}

impl FfmpegSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Extracts, crops and re-muxes through the ffmpeg command line tools
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    settings: FfmpegSettings,
    ffmpeg_path: Option<PathBuf>,
    ffprobe_path: Option<PathBuf>,
}

impl FfmpegTool {
    /// Resolve binaries now; a missing binary only fails the call that needs it
    pub fn new(settings: FfmpegSettings) -> Self {
        let ffmpeg_path = settings
            .ffmpeg_path
            .clone()
            .or_else(|| which::which("ffmpeg").ok());
        let ffprobe_path = settings
            .ffprobe_path
            .clone()
            .or_else(|| which::which("ffprobe").ok());

        log::debug!("ffmpeg: {:?}, ffprobe: {:?}", ffmpeg_path, ffprobe_path);

        Self {
            settings,
            ffmpeg_path,
            ffprobe_path,
        }
    }

    pub fn settings(&self) -> &FfmpegSettings {
        &self.settings
    }

    pub fn is_available(&self) -> bool {
        self.ffmpeg_path.is_some()
    }

    fn ffmpeg(&self) -> Result<&Path, ToolError> {
        self.ffmpeg_path
            .as_deref()
            .ok_or(ToolError::NotFound("ffmpeg"))
    }

    fn ffprobe(&self) -> Result<&Path, ToolError> {
        self.ffprobe_path
            .as_deref()
            .ok_or(ToolError::NotFound("ffprobe"))
    }

    fn run_ffmpeg(&self, args: Vec<OsString>) -> Result<String, ToolError> {
        run_tool("ffmpeg", self.ffmpeg()?, &args, self.settings.timeout())
    }

    /// Frame size of the first video stream
    pub fn probe_dimensions(&self, video: &Path) -> Result<(u32, u32), MuxError> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-select_streams".into(),
            "v:0".into(),
            "-show_entries".into(),
            "stream=width,height".into(),
            "-of".into(),
            "json".into(),
            video.into(),
        ];
        let stdout = run_tool("ffprobe", self.ffprobe()?, &args, self.settings.timeout())?;
        parse_dimensions(&stdout)
    }
}

impl AudioExtractor for FfmpegTool {
    fn extract_audio(&self, video: &Path, output: &Path) -> Result<Waveform, ExtractionError> {
        let args: Vec<OsString> = vec![
            "-nostdin".into(),
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            video.into(),
            "-vn".into(),
            "-acodec".into(),
            "pcm_s16le".into(),
            "-ar".into(),
            self.settings.sample_rate.to_string().into(),
            output.into(),
        ];
        self.run_ffmpeg(args)?;

        let waveform = read_wav(output)?;
        log::info!(
            "Extracted {:.2}s of audio ({} ch, {} Hz) from {:?}",
            waveform.duration_secs(),
            waveform.channels(),
            waveform.sample_rate(),
            video
        );
        Ok(waveform)
    }
}

impl VideoMuxer for FfmpegTool {
    fn remux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MuxError> {
        let args: Vec<OsString> = vec![
            "-nostdin".into(),
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            video.into(),
            "-i".into(),
            audio.into(),
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
            "-c:v".into(),
            self.settings.video_codec.as_str().into(),
            "-c:a".into(),
            self.settings.audio_codec.as_str().into(),
            output.into(),
        ];
        self.run_ffmpeg(args)?;

        log::info!("Muxed {:?} + {:?} into {:?}", video, audio, output);
        Ok(())
    }

    fn crop_to_vertical(&self, video: &Path, output: &Path) -> Result<PathBuf, MuxError> {
        let (width, height) = self.probe_dimensions(video)?;

        let Some(crop) = vertical_crop(width, height) else {
            log::info!("{:?} is already {}x{}, skipping vertical crop", video, width, height);
            return Ok(video.to_path_buf());
        };

        let filter = format!(
            "crop={}:{}:{}:{},scale=-2:{}",
            crop.width, crop.height, crop.x, crop.y, VERTICAL_HEIGHT
        );
        let args: Vec<OsString> = vec![
            "-nostdin".into(),
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            video.into(),
            "-vf".into(),
            filter.into(),
            "-an".into(),
            "-c:v".into(),
            self.settings.video_codec.as_str().into(),
            output.into(),
        ];
        self.run_ffmpeg(args)?;

        log::info!("Cropped {}x{} video to vertical: {:?}", width, height, output);
        Ok(output.to_path_buf())
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

fn parse_dimensions(json: &str) -> Result<(u32, u32), MuxError> {
    let probe: ProbeOutput =
        serde_json::from_str(json).map_err(|e| MuxError::Probe(e.to_string()))?;

    probe
        .streams
        .first()
        .and_then(|s| Some((s.width?, s.height?)))
        .filter(|(w, h)| *w > 0 && *h > 0)
        .ok_or_else(|| MuxError::Probe("no video stream with a frame size".to_string()))
}

/// Run a tool to completion under a deadline, returning its stdout
fn run_tool(
    tool: &'static str,
    program: &Path,
    args: &[OsString],
    timeout: Duration,
) -> Result<String, ToolError> {
    log::debug!("Running {} {:?}", tool, args);

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ToolError::Spawn { tool, source })?;

    // Drain both pipes on their own threads so a chatty child cannot block
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match wait_with_deadline(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            log::warn!("{} timed out after {:?}, killed", tool, timeout);
            return Err(ToolError::TimedOut { tool, timeout });
        }
        Err(source) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::Spawn { tool, source });
        }
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if !status.success() {
        return Err(ToolError::Failed {
            tool,
            code: status.code(),
            stderr: tail(&stderr),
        });
    }

    Ok(stdout)
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    // A timeout too large to represent means no deadline
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut bytes);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

fn tail(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().rev().nth(STDERR_TAIL) {
        Some((idx, _)) => format!("...{}", &text[idx..]),
        None => text.to_string(),
    }
}

/// True when an ffmpeg binary can be found and runs
pub fn check_ffmpeg_available() -> bool {
    let tool = FfmpegTool::new(FfmpegSettings::default());
    match tool.ffmpeg() {
        Ok(path) => Command::new(path)
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimensions() {
        let json = r#"{ "programs": [], "streams": [ { "width": 1280, "height": 720 } ] }"#;
        assert_eq!(parse_dimensions(json).unwrap(), (1280, 720));
    }

    #[test]
    fn test_parse_dimensions_without_video() {
        assert!(matches!(parse_dimensions(r#"{ "streams": [] }"#), Err(MuxError::Probe(_))));
        assert!(matches!(parse_dimensions("not json"), Err(MuxError::Probe(_))));
    }

    #[test]
    fn test_missing_binary_is_reported() {
        let tool = FfmpegTool {
            settings: FfmpegSettings::default(),
            ffmpeg_path: None,
            ffprobe_path: None,
        };
        let dir = tempfile::tempdir().unwrap();
        let result = tool.extract_audio(&dir.path().join("in.mp4"), &dir.path().join("out.wav"));
        assert!(matches!(
            result,
            Err(ExtractionError::Tool(ToolError::NotFound("ffmpeg")))
        ));
    }

    #[test]
    fn test_tail_keeps_end() {
        let long = "x".repeat(5000) + "final error";
        let tailed = tail(&long);
        assert!(tailed.starts_with("..."));
        assert!(tailed.ends_with("final error"));
        assert!(tailed.len() < 2100);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_times_out() {
        let started = Instant::now();
        let result = run_tool(
            "sleep",
            Path::new("sleep"),
            &["5".into()],
            Duration::from_millis(200),
        );
        assert!(matches!(result, Err(ToolError::TimedOut { tool: "sleep", .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_with_huge_timeout() {
        let result = run_tool("true", Path::new("true"), &[], Duration::from_secs(u64::MAX));
        assert_eq!(result.unwrap(), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_reports_failure() {
        let result = run_tool(
            "sh",
            Path::new("sh"),
            &["-c".into(), "echo broken >&2; exit 3".into()],
            Duration::from_secs(10),
        );
        match result {
            Err(ToolError::Failed { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    /// Requires ffmpeg; skips gracefully if unavailable.
    #[test]
    fn test_extract_audio_from_generated_video() {
        if !check_ffmpeg_available() {
            eprintln!("Skipping extraction test: ffmpeg not available");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("tone.mp4");
        let status = Command::new("ffmpeg")
            .args(["-nostdin", "-y", "-loglevel", "error"])
            .args(["-f", "lavfi", "-i", "color=c=black:s=160x120:r=25:d=2"])
            .args(["-f", "lavfi", "-i", "sine=frequency=440:sample_rate=48000:duration=2"])
            .args(["-c:v", "mpeg4", "-c:a", "aac", "-shortest"])
            .arg(&video)
            .status()
            .unwrap();
        assert!(status.success());

        let tool = FfmpegTool::new(FfmpegSettings::default());
        let waveform = tool.extract_audio(&video, &dir.path().join("audio.wav")).unwrap();

        assert_eq!(waveform.sample_rate(), 44100);
        assert!((waveform.duration_secs() - 2.0).abs() < 0.1);
        assert!(waveform.peak() > 1000);
    }
}
