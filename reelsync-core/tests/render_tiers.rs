#![cfg(unix)]

mod common;

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use common::*;
use reelsync_core::captions::{CaptionAligner, CaptionConfig, CaptionMode};
use reelsync_core::render::{
    BackendTier, EmergencyBackend, FallbackBackend, PrimaryBackend, RenderBackend,
    RenderErrorKind, RenderOptions, RenderRequest, RenderSettings,
};
use reelsync_core::segment::{AudioRef, ImageRef, Segment};
use reelsync_core::timeline::{DurationReconciler, ReconcilerConfig};
use reelsync_core::transition::{TransitionCompositor, TransitionConfig};

const TEXTS: [&str; 3] = [
    "Morning light falls across the market square.",
    "Vendors set out bread, cheese and early cherries for the crowd.",
    "By noon the square is quiet again.",
];

/// Builds a three segment request with media on disk under `work_dir`.
fn build_request(
    temp: &TempDir,
    audio: [Option<f64>; 3],
    mode: CaptionMode,
) -> (RenderRequest, RenderSettings) {
    let config = test_config(temp);
    let work_dir = temp.path().join("job");
    let segments: Vec<Segment> = TEXTS
        .iter()
        .zip(audio)
        .enumerate()
        .map(|(index, (text, seconds))| {
            let image = work_dir.join("images").join(format!("still_{index}.png"));
            write_image(&image);
            let mut segment = Segment::new(index, *text).with_images(vec![ImageRef::new(image, 0)]);
            if let Some(seconds) = seconds {
                let path = work_dir.join("audio").join(format!("segment_{index:03}.mp3"));
                write_audio(&path, seconds);
                segment = segment.with_audio(AudioRef::new(path, seconds));
            }
            segment
        })
        .collect();

    let timeline = DurationReconciler::new(ReconcilerConfig::from(&config.timeline))
        .reconcile(&segments)
        .unwrap();
    let transitions = TransitionCompositor::new(TransitionConfig::from(&config.transitions))
        .compose(&timeline);
    let captions = CaptionAligner::new(CaptionConfig::from(&config.captions)).align(&timeline);
    let request = RenderRequest {
        job_id: "render-test".to_string(),
        timeline,
        transitions,
        captions,
        options: RenderOptions::default().with_caption_mode(mode),
        work_dir,
    };
    (request, RenderSettings::from(&config))
}

fn read_log(work_dir: &Path, tier: BackendTier) -> String {
    std::fs::read_to_string(work_dir.join("logs").join(format!("{tier}.log"))).unwrap()
}

#[tokio::test]
async fn primary_zooms_stills_and_normalises_loudness() {
    let temp = TempDir::new().unwrap();
    let toolchain = FakeToolchain::new();
    let (request, settings) =
        build_request(&temp, [Some(4.0), Some(6.5), Some(3.2)], CaptionMode::Burned);
    let backend = PrimaryBackend::new(settings, Arc::new(toolchain.clone()));

    let artifact = backend.render(&request).await.unwrap();

    assert_eq!(artifact.tier, BackendTier::Primary);
    assert!(artifact.has_audio);
    assert!((artifact.duration_seconds - 11.7).abs() < 1e-6);
    assert_eq!(artifact.path, request.work_dir.join("primary.mp4"));
    assert!(artifact.path.exists());

    let calls = toolchain.ffmpeg_calls();
    assert_eq!(calls.len(), 4, "one clip per segment plus the assembly");
    for clip in &calls[..3] {
        let joined = clip.joined();
        assert!(joined.contains("zoompan=z='1.0000+0.1000*on/"));
        assert!(clip.args.contains(&"-an".to_string()));
        assert!(clip.output().unwrap().contains("clips/primary/segment_"));
    }
    let assembly = calls[3].joined();
    assert!(assembly.contains("loudnorm=I=-16:TP=-1.5:LRA=11"));
    assert!(assembly.contains("captions.srt"));
    assert!(assembly.contains("force_style='FontName=DejaVu Sans"));
    assert!(assembly.contains("atrim=end=11.700"));

    let log = read_log(&request.work_dir, BackendTier::Primary);
    assert_eq!(log.matches("$ ffmpeg -hide_banner").count(), 4);
    assert!(request.work_dir.join("captions.srt").exists());
}

#[tokio::test]
async fn fallback_skips_zoom_and_loudness() {
    let temp = TempDir::new().unwrap();
    let toolchain = FakeToolchain::new();
    let (request, settings) =
        build_request(&temp, [Some(4.0), Some(6.5), Some(3.2)], CaptionMode::Burned);
    let backend = FallbackBackend::new(settings, Arc::new(toolchain.clone()));

    let artifact = backend.render(&request).await.unwrap();

    assert_eq!(artifact.tier, BackendTier::Fallback);
    let calls = toolchain.ffmpeg_calls();
    assert!(calls.iter().all(|call| !call.joined().contains("zoompan")));
    let assembly = calls.last().unwrap().joined();
    assert!(!assembly.contains("loudnorm"));
    assert!(assembly.contains("subtitles="));
    assert!(!assembly.contains("force_style"));
    assert!(assembly.contains("xfade=transition=fade"));
}

#[tokio::test]
async fn sidecar_mode_burns_nothing() {
    let temp = TempDir::new().unwrap();
    let toolchain = FakeToolchain::new();
    let (request, settings) =
        build_request(&temp, [Some(4.0), Some(6.5), Some(3.2)], CaptionMode::Sidecar);
    let backend = PrimaryBackend::new(settings, Arc::new(toolchain.clone()));

    backend.render(&request).await.unwrap();

    let assembly = toolchain.ffmpeg_calls().pop().unwrap().joined();
    assert!(!assembly.contains("subtitles="));
    assert!(!request.work_dir.join("captions.srt").exists());
}

#[tokio::test]
async fn clip_tiers_require_narration() {
    let temp = TempDir::new().unwrap();
    let toolchain = FakeToolchain::new();
    let (request, settings) = build_request(&temp, [None, None, None], CaptionMode::Burned);

    let primary = PrimaryBackend::new(settings.clone(), Arc::new(toolchain.clone()));
    let err = primary.render(&request).await.unwrap_err();
    assert_eq!(err.kind, RenderErrorKind::MissingAudioTrack);

    let fallback = FallbackBackend::new(settings, Arc::new(toolchain.clone()));
    let err = fallback.render(&request).await.unwrap_err();
    assert_eq!(err.kind, RenderErrorKind::MissingAudioTrack);
    assert!(toolchain.ffmpeg_calls().is_empty());
}

#[tokio::test]
async fn deleted_narration_file_is_a_missing_track() {
    let temp = TempDir::new().unwrap();
    let toolchain = FakeToolchain::new();
    let (request, settings) =
        build_request(&temp, [Some(4.0), Some(6.5), Some(3.2)], CaptionMode::Burned);
    std::fs::remove_file(request.work_dir.join("audio").join("segment_001.mp3")).unwrap();

    let backend = PrimaryBackend::new(settings, Arc::new(toolchain));
    let err = backend.render(&request).await.unwrap_err();
    assert_eq!(err.kind, RenderErrorKind::MissingAudioTrack);
    assert!(err.message.contains("segment 1"));
}

#[tokio::test]
async fn ffmpeg_failures_are_classified() {
    let temp = TempDir::new().unwrap();
    let (request, settings) =
        build_request(&temp, [Some(4.0), Some(6.5), Some(3.2)], CaptionMode::Burned);

    let codec = FakeToolchain::new().fail_when("zoompan");
    let backend = PrimaryBackend::new(settings.clone(), Arc::new(codec));
    let err = backend.render(&request).await.unwrap_err();
    assert_eq!(err.kind, RenderErrorKind::CodecFailure);
    assert!(read_log(&request.work_dir, BackendTier::Primary).contains("zoompan"));

    let disk = FakeToolchain::new().fail_with("+faststart", "av_interleaved_write_frame(): No space left on device");
    let backend = FallbackBackend::new(settings, Arc::new(disk));
    let err = backend.render(&request).await.unwrap_err();
    assert_eq!(err.kind, RenderErrorKind::ResourceExhausted);
    assert!(err.message.contains("No space left"));
}

#[tokio::test]
async fn emergency_paints_cards_and_keeps_available_audio() {
    let temp = TempDir::new().unwrap();
    let toolchain = FakeToolchain::new();
    let (request, settings) =
        build_request(&temp, [Some(4.0), None, Some(3.2)], CaptionMode::Burned);
    std::fs::remove_file(request.work_dir.join("images").join("still_0.png")).unwrap();

    let backend = EmergencyBackend::new(settings, Arc::new(toolchain.clone()));
    let artifact = backend.render(&request).await.unwrap();

    assert_eq!(artifact.tier, BackendTier::Emergency);
    assert!(artifact.has_audio);
    let calls = toolchain.ffmpeg_calls();
    assert_eq!(calls.len(), 1, "emergency renders in a single pass");
    let joined = calls[0].joined();
    assert!(joined.contains("lavfi"));
    assert!(joined.contains("color=c=0x001428:s=1024x576:r=24"));
    assert!(joined.contains("[aout]"));
    assert!(!joined.contains("xfade"));
    assert!(!joined.contains("subtitles="));
    assert!(!joined.contains("loudnorm"));
}

#[tokio::test]
async fn emergency_renders_silent_video_without_narration() {
    let temp = TempDir::new().unwrap();
    let toolchain = FakeToolchain::new();
    let (request, settings) = build_request(&temp, [None, None, None], CaptionMode::Burned);

    let backend = EmergencyBackend::new(settings, Arc::new(toolchain.clone()));
    let artifact = backend.render(&request).await.unwrap();

    assert!(!artifact.has_audio);
    assert!((artifact.duration_seconds - 13.0).abs() < 1e-9);
    let call = toolchain.ffmpeg_calls().pop().unwrap();
    assert!(call.args.contains(&"-an".to_string()));
    assert!(!call.joined().contains("[aout]"));
    // Exclusive windows: 4 + 4 + 5 seconds of stills.
    assert!(call.joined().contains("trim=duration=4.000"));
    assert!(call.joined().contains("trim=duration=5.000"));
}
