use reelsync_core::captions::{to_srt, CaptionAligner, CaptionConfig};
use reelsync_core::config::load_reelsync_config;
use reelsync_core::segment::{AudioRef, ImageRef, ScriptBlock, Segment, SegmentPlanner};
use reelsync_core::timeline::{DurationReconciler, ReconcilerConfig, Timeline};
use reelsync_core::transition::{TransitionCompositor, TransitionConfig};

fn fixture_path(relative: &str) -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(relative)
}

fn script() -> Vec<ScriptBlock> {
    let mut intro = ScriptBlock::new("A storm is coming. The harbour empties, boats pulled high onto the stones.");
    intro.image_prompts = vec!["dark clouds over a harbour".into(), "boats on a beach".into()];
    let middle = ScriptBlock::new(
        "Fishermen tie down what they can. Nobody speaks much; everyone has seen this before.",
    );
    let mut outro = ScriptBlock::new("By morning, the sea is flat again.");
    outro.caption = Some("Morning. Flat sea again.".into());
    vec![intro, middle, outro]
}

/// Attaches probed narration and one still per planned image.
fn with_media(segments: Vec<Segment>, audio: &[Option<f64>]) -> Vec<Segment> {
    segments
        .into_iter()
        .zip(audio)
        .map(|(segment, seconds)| {
            let images = (0..segment.planned_image_count)
                .map(|ordinal| {
                    ImageRef::new(
                        format!("/media/segment_{}_{ordinal}.png", segment.index),
                        ordinal as u32,
                    )
                })
                .collect();
            let index = segment.index;
            let segment = segment.with_images(images);
            match seconds {
                Some(seconds) => {
                    segment.with_audio(AudioRef::new(format!("/media/audio_{index}.mp3"), *seconds))
                }
                None => segment,
            }
        })
        .collect()
}

fn reconcile(audio: &[Option<f64>]) -> (Timeline, CaptionConfig) {
    let config = load_reelsync_config(fixture_path("configs/reelsync.toml")).unwrap();
    let planner = SegmentPlanner::new((&config.planner).into()).unwrap();
    let segments = with_media(planner.plan(&script()).unwrap(), audio);
    let timeline = DurationReconciler::new(ReconcilerConfig::from(&config.timeline))
        .reconcile(&segments)
        .unwrap();
    (timeline, CaptionConfig::from(&config.captions))
}

#[test]
fn planned_script_reconciles_to_probed_audio() {
    let (timeline, _) = reconcile(&[Some(5.2), Some(7.8), Some(2.4)]);

    timeline.check_invariants().unwrap();
    assert!((timeline.total_duration - (5.2 + 7.8 + 2.4 - 2.0)).abs() < 1e-9);
    for window in timeline.segments.windows(2) {
        let overlap = window[0].end_offset - window[1].start_offset;
        assert!((overlap - 1.0).abs() < 1e-9);
    }
    // 2.4s of audio leaves room for a single 2s still.
    assert_eq!(timeline.segments[2].image_slices.len(), 1);
    assert_eq!(
        timeline.segments[0].segment.image_prompts[0],
        "dark clouds over a harbour"
    );
}

#[test]
fn short_neighbour_halves_the_crossfade() {
    let (timeline, _) = reconcile(&[Some(5.2), Some(1.5), Some(4.0)]);

    timeline.check_invariants().unwrap();
    // The middle segment is stretched to the 2s floor, which is still long
    // enough for a full one second crossfade on both sides.
    assert!((timeline.segments[1].duration() - 2.0).abs() < 1e-9);
    assert_eq!(timeline.overlaps, vec![1.0, 1.0]);
    assert!((timeline.segments[1].audio_seconds - 1.5).abs() < 1e-9);
}

#[test]
fn captions_stay_inside_their_segments() {
    let (timeline, captions) = reconcile(&[Some(5.2), None, Some(2.4)]);
    let cues = CaptionAligner::new(captions).align(&timeline);

    assert!(!cues.is_empty());
    for pair in cues.windows(2) {
        assert!(pair[0].end_time <= pair[1].start_time + 1e-9);
    }
    for cue in &cues {
        assert!(cue.end_time > cue.start_time);
        assert!(cue.end_time <= timeline.total_duration + 1e-9);
    }
    let outro = timeline.exclusive_window(2).unwrap();
    let last = cues.last().unwrap();
    assert!(last.start_time >= outro.0 - 1e-9);
    assert!(last.text.contains("Flat sea again."));

    let srt = to_srt(&cues);
    assert_eq!(srt.matches(" --> ").count(), cues.len());
}

#[test]
fn transitions_follow_the_timeline() {
    let (timeline, _) = reconcile(&[Some(5.2), Some(7.8), Some(2.4)]);
    let set = TransitionCompositor::new(TransitionConfig::default()).compose(&timeline);

    assert_eq!(set.crossfades.len(), 2);
    for fade in &set.crossfades {
        let next = &timeline.segments[fade.boundary + 1];
        assert!((fade.start - next.start_offset).abs() < 1e-9);
        assert!((fade.end() - timeline.segments[fade.boundary].end_offset).abs() < 1e-9);
    }
    let slices: usize = timeline.segments.iter().map(|s| s.image_slices.len()).sum();
    assert_eq!(set.zooms.len(), slices);
}

#[test]
fn reconciliation_is_deterministic() {
    let audio = [Some(5.2), Some(7.8), None];
    let (first, _) = reconcile(&audio);
    let (second, _) = reconcile(&audio);
    assert_eq!(first, second);
    assert_eq!(first.fingerprint(), second.fingerprint());
}
