use std::fmt::Write as _;

use super::CaptionCue;

/// `HH:MM:SS,mmm`, rounded to the nearest millisecond.
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_seconds = total_ms / 1000;
    let s = total_seconds % 60;
    let m = (total_seconds / 60) % 60;
    let h = total_seconds / 3600;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

pub fn to_srt(cues: &[CaptionCue]) -> String {
    let mut out = String::new();
    for (position, cue) in cues.iter().enumerate() {
        let _ = writeln!(out, "{}", position + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            format_timestamp(cue.start_time),
            format_timestamp(cue.end_time)
        );
        let _ = writeln!(out, "{}", cue.text.trim());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_use_comma_millis() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(3.2), "00:00:03,200");
        assert_eq!(format_timestamp(3725.0456), "01:02:05,046");
    }

    #[test]
    fn srt_blocks_are_numbered() {
        let cues = vec![
            CaptionCue {
                start_time: 0.0,
                end_time: 1.5,
                text: "First line.".into(),
            },
            CaptionCue {
                start_time: 1.5,
                end_time: 3.0,
                text: "Second line.".into(),
            },
        ];
        let srt = to_srt(&cues);
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:01,500\nFirst line.\n\n2\n00:00:01,500 --> 00:00:03,000\nSecond line.\n\n"
        );
    }
}
