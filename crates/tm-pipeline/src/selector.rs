//! Variant selection.
//!
//! Given everything a source offers for a URL, pick either one combined
//! variant or a (video-only, audio-only) pair to be muxed.
//!
//! Only mp4 combined variants are delivered as-is, since the response is
//! always an mp4. Anything else goes through the muxer.
//!
//! Ordering rules, applied in turn until one decides:
//!
//! - combined: height, bitrate
//! - video-only: height (capped at `max_video_height` when any candidate
//!   fits under the cap), container, bitrate
//! - audio-only: container (m4a/mp4 > webm > other), bitrate
//!
//! Remaining ties go to the lexicographically smallest id, so the result
//! never depends on the order the source listed variants in.

use std::cmp::{Ordering, Reverse};

use tm_core::config::SelectionConfig;
use tm_core::{Container, StreamVariant, VariantKind};

/// Thresholds the selector applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Smallest height at which a combined variant is used as-is.
    pub min_combined_height: u32,
    /// Upper bound on video-only height, when set.
    pub max_video_height: Option<u32>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::from(&SelectionConfig::default())
    }
}

impl From<&SelectionConfig> for SelectionPolicy {
    fn from(cfg: &SelectionConfig) -> Self {
        Self {
            min_combined_height: cfg.min_combined_height,
            max_video_height: cfg.max_video_height,
        }
    }
}

/// Outcome of variant selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Deliver this variant directly.
    Combined(StreamVariant),
    /// Download both and mux them.
    Split {
        video: StreamVariant,
        audio: StreamVariant,
    },
}

impl Selection {
    /// Number of fetches this selection requires.
    pub fn download_count(&self) -> usize {
        match self {
            Selection::Combined(_) => 1,
            Selection::Split { .. } => 2,
        }
    }
}

/// Choose the variant(s) to download.
///
/// # Errors
///
/// Returns [`tm_core::Error::NoViableStream`] when there is no adequate
/// mp4 combined variant and the source lacks either a video-only or an
/// audio-only variant.
pub fn select_variants(
    variants: &[StreamVariant],
    policy: &SelectionPolicy,
) -> tm_core::Result<Selection> {
    let combined = variants
        .iter()
        .filter(|v| v.kind == VariantKind::Combined && v.has_audio)
        .filter(|v| v.container == Container::Mp4)
        .filter(|v| height(v) >= policy.min_combined_height)
        .max_by(|a, b| compare_video(a, b));

    if let Some(v) = combined {
        return Ok(Selection::Combined(v.clone()));
    }

    let video_only: Vec<&StreamVariant> = variants
        .iter()
        .filter(|v| v.kind == VariantKind::VideoOnly)
        .collect();
    let audio_only: Vec<&StreamVariant> = variants
        .iter()
        .filter(|v| v.kind == VariantKind::AudioOnly)
        .collect();

    let video = best_video(&video_only, policy.max_video_height);
    let audio = audio_only.iter().copied().max_by(|a, b| compare_audio(a, b));

    match (video, audio) {
        (Some(video), Some(audio)) => Ok(Selection::Split {
            video: video.clone(),
            audio: audio.clone(),
        }),
        (None, _) => Err(tm_core::Error::NoViableStream(format!(
            "no combined variant of at least {}p and no video-only variant",
            policy.min_combined_height
        ))),
        (_, None) => Err(tm_core::Error::NoViableStream(format!(
            "no combined variant of at least {}p and no audio-only variant",
            policy.min_combined_height
        ))),
    }
}

fn best_video<'a>(
    candidates: &[&'a StreamVariant],
    max_height: Option<u32>,
) -> Option<&'a StreamVariant> {
    let capped = max_height.and_then(|max| {
        candidates
            .iter()
            .copied()
            .filter(|v| height(v) <= max)
            .max_by(|a, b| compare_video(a, b))
    });

    capped.or_else(|| candidates.iter().copied().max_by(|a, b| compare_video(a, b)))
}

fn height(v: &StreamVariant) -> u32 {
    v.height.unwrap_or(0)
}

fn video_container_rank(c: Container) -> u8 {
    match c {
        Container::Mp4 => 2,
        Container::Webm => 1,
        Container::M4a | Container::Other => 0,
    }
}

fn audio_container_rank(c: Container) -> u8 {
    match c {
        Container::M4a | Container::Mp4 => 2,
        Container::Webm => 1,
        Container::Other => 0,
    }
}

/// `Greater` means `a` is the better video variant.
fn compare_video(a: &StreamVariant, b: &StreamVariant) -> Ordering {
    height(a)
        .cmp(&height(b))
        .then_with(|| video_container_rank(a.container).cmp(&video_container_rank(b.container)))
        .then_with(|| a.bitrate_kbps.cmp(&b.bitrate_kbps))
        .then_with(|| Reverse(&a.id).cmp(&Reverse(&b.id)))
}

/// `Greater` means `a` is the better audio variant.
fn compare_audio(a: &StreamVariant, b: &StreamVariant) -> Ordering {
    audio_container_rank(a.container)
        .cmp(&audio_container_rank(b.container))
        .then_with(|| a.bitrate_kbps.cmp(&b.bitrate_kbps))
        .then_with(|| Reverse(&a.id).cmp(&Reverse(&b.id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SelectionPolicy {
        SelectionPolicy {
            min_combined_height: 720,
            max_video_height: Some(1080),
        }
    }

    fn youtube_like() -> Vec<StreamVariant> {
        vec![
            StreamVariant::combined("18", Container::Mp4, 360).with_bitrate(500),
            StreamVariant::video_only("137", Container::Mp4, 1080).with_bitrate(4000),
            StreamVariant::video_only("248", Container::Webm, 1080).with_bitrate(2600),
            StreamVariant::video_only("313", Container::Webm, 2160).with_bitrate(12000),
            StreamVariant::video_only("136", Container::Mp4, 720).with_bitrate(2000),
            StreamVariant::audio_only("140", Container::M4a).with_bitrate(129),
            StreamVariant::audio_only("251", Container::Webm).with_bitrate(135),
        ]
    }

    #[test]
    fn adequate_combined_wins_over_split() {
        let mut variants = youtube_like();
        variants.push(StreamVariant::combined("22", Container::Mp4, 720).with_bitrate(1500));

        let selection = select_variants(&variants, &policy()).unwrap();
        assert_eq!(selection.download_count(), 1);
        match selection {
            Selection::Combined(v) => assert_eq!(v.id, "22"),
            other => panic!("expected combined, got {other:?}"),
        }
    }

    #[test]
    fn highest_combined_is_chosen() {
        let variants = vec![
            StreamVariant::combined("22", Container::Mp4, 720),
            StreamVariant::combined("37", Container::Mp4, 1080),
            StreamVariant::combined("43", Container::Webm, 1080),
        ];
        match select_variants(&variants, &policy()).unwrap() {
            Selection::Combined(v) => assert_eq!(v.id, "37"),
            other => panic!("expected combined, got {other:?}"),
        }
    }

    #[test]
    fn low_combined_falls_back_to_best_pair() {
        let selection = select_variants(&youtube_like(), &policy()).unwrap();
        assert_eq!(
            selection,
            Selection::Split {
                video: StreamVariant::video_only("137", Container::Mp4, 1080).with_bitrate(4000),
                audio: StreamVariant::audio_only("140", Container::M4a).with_bitrate(129),
            }
        );
    }

    #[test]
    fn video_cap_ignored_when_nothing_fits() {
        let variants = vec![
            StreamVariant::video_only("400", Container::Mp4, 1440),
            StreamVariant::video_only("401", Container::Mp4, 2160),
            StreamVariant::audio_only("140", Container::M4a),
        ];
        match select_variants(&variants, &policy()).unwrap() {
            Selection::Split { video, .. } => assert_eq!(video.id, "401"),
            other => panic!("expected split, got {other:?}"),
        }
    }

    #[test]
    fn uncapped_policy_takes_tallest_video() {
        let policy = SelectionPolicy {
            max_video_height: None,
            ..policy()
        };
        match select_variants(&youtube_like(), &policy).unwrap() {
            Selection::Split { video, .. } => assert_eq!(video.id, "313"),
            other => panic!("expected split, got {other:?}"),
        }
    }

    #[test]
    fn zero_threshold_accepts_any_combined() {
        let policy = SelectionPolicy {
            min_combined_height: 0,
            ..policy()
        };
        match select_variants(&youtube_like(), &policy).unwrap() {
            Selection::Combined(v) => assert_eq!(v.id, "18"),
            other => panic!("expected combined, got {other:?}"),
        }
    }

    #[test]
    fn non_mp4_combined_goes_through_muxer() {
        let variants = vec![
            StreamVariant::combined("45", Container::Webm, 720),
            StreamVariant::combined("46", Container::Other, 1080),
            StreamVariant::video_only("137", Container::Mp4, 1080),
            StreamVariant::audio_only("140", Container::M4a),
        ];
        match select_variants(&variants, &policy()).unwrap() {
            Selection::Split { video, audio } => {
                assert_eq!(video.id, "137");
                assert_eq!(audio.id, "140");
            }
            other => panic!("expected split, got {other:?}"),
        }
    }

    #[test]
    fn webm_only_combined_without_pair_is_no_viable_stream() {
        let variants = vec![StreamVariant::combined("45", Container::Webm, 1080)];
        let err = select_variants(&variants, &policy()).unwrap_err();
        assert!(matches!(err, tm_core::Error::NoViableStream(_)));
    }

    #[test]
    fn missing_audio_is_no_viable_stream() {
        let variants = vec![
            StreamVariant::combined("18", Container::Mp4, 360),
            StreamVariant::video_only("137", Container::Mp4, 1080),
        ];
        let err = select_variants(&variants, &policy()).unwrap_err();
        assert!(matches!(err, tm_core::Error::NoViableStream(_)));
        assert!(err.to_string().contains("audio-only"));
    }

    #[test]
    fn missing_video_is_no_viable_stream() {
        let variants = vec![StreamVariant::audio_only("140", Container::M4a)];
        let err = select_variants(&variants, &policy()).unwrap_err();
        assert!(matches!(err, tm_core::Error::NoViableStream(_)));
        assert!(err.to_string().contains("video-only"));
    }

    #[test]
    fn empty_input_is_no_viable_stream() {
        let err = select_variants(&[], &policy()).unwrap_err();
        assert!(matches!(err, tm_core::Error::NoViableStream(_)));
    }

    #[test]
    fn combined_without_audio_flag_is_not_adequate() {
        let mut silent = StreamVariant::combined("99", Container::Mp4, 1080);
        silent.has_audio = false;
        let err = select_variants(&[silent], &policy()).unwrap_err();
        assert!(matches!(err, tm_core::Error::NoViableStream(_)));
    }

    #[test]
    fn audio_prefers_mp4_family_then_bitrate() {
        let variants = vec![
            StreamVariant::video_only("137", Container::Mp4, 1080),
            StreamVariant::audio_only("251", Container::Webm).with_bitrate(160),
            StreamVariant::audio_only("139", Container::M4a).with_bitrate(48),
            StreamVariant::audio_only("140", Container::M4a).with_bitrate(129),
        ];
        match select_variants(&variants, &policy()).unwrap() {
            Selection::Split { audio, .. } => assert_eq!(audio.id, "140"),
            other => panic!("expected split, got {other:?}"),
        }
    }

    #[test]
    fn selection_is_independent_of_input_order() {
        let base = youtube_like();
        let expected = select_variants(&base, &policy()).unwrap();

        // Every rotation and the reversal must agree.
        for shift in 0..base.len() {
            let mut rotated = base.clone();
            rotated.rotate_left(shift);
            assert_eq!(select_variants(&rotated, &policy()).unwrap(), expected);
        }
        let mut reversed = base;
        reversed.reverse();
        assert_eq!(select_variants(&reversed, &policy()).unwrap(), expected);
    }

    #[test]
    fn full_ties_break_on_smallest_id() {
        let variants = vec![
            StreamVariant::combined("b", Container::Mp4, 720),
            StreamVariant::combined("a", Container::Mp4, 720),
            StreamVariant::combined("c", Container::Mp4, 720),
        ];
        match select_variants(&variants, &policy()).unwrap() {
            Selection::Combined(v) => assert_eq!(v.id, "a"),
            other => panic!("expected combined, got {other:?}"),
        }
    }
}
