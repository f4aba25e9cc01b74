//! SubRip caption rendering.
use scribe_model::Segment;

const CUE_ARROW: &str = "-->";

/// Formats `seconds` as `[HH:]MM:SS<marker>mmm`.
///
/// The value is rounded to the nearest millisecond (ties to even). The hours
/// field is emitted when forced or when non-zero.
///
/// # Panics
/// On negative or NaN input; timestamps come from the engine and must be non-negative.
pub fn format_timestamp(seconds: f64, always_include_hours: bool, decimal_marker: &str) -> String {
    assert!(
        seconds >= 0.0,
        "non-negative timestamp expected, got {seconds}"
    );

    let mut millis = (seconds * 1000.0).round_ties_even() as u64;

    let hours = millis / 3_600_000;
    millis -= hours * 3_600_000;
    let minutes = millis / 60_000;
    millis -= minutes * 60_000;
    let secs = millis / 1_000;
    millis -= secs * 1_000;

    let hours_field = if always_include_hours || hours > 0 {
        format!("{hours:02}:")
    } else {
        String::new()
    };
    format!("{hours_field}{minutes:02}:{secs:02}{decimal_marker}{millis:03}")
}

/// Caption form: hours always present, comma before milliseconds.
pub fn srt_timestamp(seconds: f64) -> String {
    format_timestamp(seconds, true, ",")
}

/// Renders segments as one SubRip document.
///
/// Cues are numbered from 1 in the order given. Cue text is trimmed, kept on one
/// line, and never contains the `-->` timing separator.
pub fn to_srt(segments: &[Segment]) -> String {
    segments
        .iter()
        .enumerate()
        .map(|(idx, seg)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                idx + 1,
                srt_timestamp(seg.start),
                srt_timestamp(seg.end),
                cue_text(&seg.text),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn cue_text(raw: &str) -> String {
    // A blank line would end the cue early.
    let mut text = raw.trim().lines().map(str::trim).collect::<Vec<_>>().join(" ");
    while text.contains(CUE_ARROW) {
        text = text.replace(CUE_ARROW, "->");
    }
    text
}
