use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use tokio::fs as async_fs;
use tracing::{debug, warn};

use crate::executor::{run_checked, CommandExecutor};
use crate::render::ffmpeg::escape_filter_value;

use super::GenerationError;

const MAX_CAPTION_CHARS: usize = 80;

/// Paints the stand-in still used when image generation gives up.
pub struct PlaceholderPainter {
    ffmpeg: PathBuf,
    executor: Arc<dyn CommandExecutor>,
    width: u32,
    height: u32,
    color: String,
    font_size: u32,
}

impl std::fmt::Debug for PlaceholderPainter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceholderPainter")
            .field("ffmpeg", &self.ffmpeg)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("color", &self.color)
            .finish()
    }
}

impl PlaceholderPainter {
    pub fn new(ffmpeg: impl Into<PathBuf>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            executor,
            width: 1024,
            height: 576,
            color: "0x001428".to_string(),
            font_size: 36,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_font_size(mut self, font_size: u32) -> Self {
        self.font_size = font_size;
        self
    }

    /// Writes a PNG bearing `caption` to `dest`. ffmpeg's `drawtext` is tried
    /// first; without it a plain colour frame is encoded in-process.
    pub async fn paint(&self, caption: &str, dest: &Path) -> Result<PathBuf, GenerationError> {
        if let Some(parent) = dest.parent() {
            async_fs::create_dir_all(parent).await?;
        }
        let args = self.drawtext_args(caption, dest);
        match run_checked(self.executor.as_ref(), &self.ffmpeg, &args).await {
            Ok(_) if dest.exists() => {
                debug!(path = %dest.display(), "placeholder painted with caption");
                return Ok(dest.to_path_buf());
            }
            Ok(_) => warn!(path = %dest.display(), "ffmpeg produced no placeholder"),
            Err(error) => warn!(%error, "drawtext placeholder failed"),
        }
        self.paint_solid(dest)?;
        Ok(dest.to_path_buf())
    }

    fn drawtext_args(&self, caption: &str, dest: &Path) -> Vec<String> {
        let text: String = caption.chars().take(MAX_CAPTION_CHARS).collect();
        vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!(
                "color=c={}:s={}x{}:d=1",
                self.color, self.width, self.height
            ),
            "-vf".to_string(),
            format!(
                "drawtext=text='{}':fontcolor=white:fontsize={}:x=(w-text_w)/2:y=(h-text_h)/2",
                escape_filter_value(&text),
                self.font_size
            ),
            "-frames:v".to_string(),
            "1".to_string(),
            dest.to_string_lossy().to_string(),
        ]
    }

    fn paint_solid(&self, dest: &Path) -> Result<(), GenerationError> {
        let [r, g, b] = parse_color(&self.color);
        let frame = RgbImage::from_pixel(self.width, self.height, Rgb([r, g, b]));
        frame
            .save_with_format(dest, image::ImageFormat::Png)
            .map_err(|err| GenerationError::Placeholder(err.to_string()))
    }
}

/// Accepts `0xRRGGBB`, `#RRGGBB` or `RRGGBB`; anything else is black.
pub fn parse_color(value: &str) -> [u8; 3] {
    let hex = value
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches('#');
    if hex.len() != 6 {
        return [0, 0, 0];
    }
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|part| u8::from_str_radix(part, 16).ok())
            .unwrap_or(0)
    };
    [channel(0..2), channel(2..4), channel(4..6)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Output;
    use tokio::process::Command;

    #[cfg(unix)]
    use std::os::unix::process::ExitStatusExt;

    struct FailingExecutor;

    #[async_trait::async_trait]
    impl CommandExecutor for FailingExecutor {
        async fn run(&self, _command: &mut Command) -> std::io::Result<Output> {
            Ok(Output {
                status: std::process::ExitStatus::from_raw(1 << 8),
                stdout: Vec::new(),
                stderr: b"No such filter: 'drawtext'".to_vec(),
            })
        }
    }

    #[test]
    fn colors_parse_in_common_notations() {
        assert_eq!(parse_color("0x001428"), [0x00, 0x14, 0x28]);
        assert_eq!(parse_color("#ff8000"), [0xff, 0x80, 0x00]);
        assert_eq!(parse_color("blue"), [0, 0, 0]);
    }

    #[tokio::test]
    async fn falls_back_to_solid_png_without_drawtext() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("placeholders").join("s0_0.png");
        let painter = PlaceholderPainter::new("ffmpeg", Arc::new(FailingExecutor)).with_size(32, 18);
        let path = painter.paint("The river rose.", &dest).await.unwrap();
        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (32, 18));
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([0x00, 0x14, 0x28]));
    }
}
