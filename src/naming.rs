//! Name sanitization and frame display names.
//!
//! Two distinct sanitizers live here. [`sanitize_video_name`] is applied to
//! uploaded file names before they become part of frame display names and
//! scratch paths; it is strict (alphanumeric plus `-` and `_`).
//! [`sanitize_component`] is applied to archive entry components supplied by
//! the client; it additionally allows `.` and spaces so display names like
//! `clip-0001.jpg` survive intact. Both are idempotent and never return an
//! empty string.

/// Fallback used when sanitization strips a name down to nothing.
pub const FALLBACK_NAME: &str = "unnamed";

/// Width of the zero-padded sequence number in frame display names.
const SEQUENCE_PAD: usize = 4;

/// Sanitize the base name of an uploaded video.
///
/// Keeps ASCII alphanumerics, `-`, and `_`; drops everything else. Returns
/// [`FALLBACK_NAME`] if nothing survives.
///
/// # Example
///
/// ```
/// use stillcut::naming::sanitize_video_name;
///
/// assert_eq!(sanitize_video_name("lecture take #3"), "lecturetake3");
/// assert_eq!(sanitize_video_name("../../etc/passwd"), "etcpasswd");
/// ```
pub fn sanitize_video_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();

    if sanitized.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        sanitized
    }
}

/// Sanitize one path component of an archive entry.
///
/// Keeps characters in `[A-Za-z0-9._ -]`; drops everything else, including
/// path separators. Components consisting only of dots (`.`, `..`) collapse
/// to [`FALLBACK_NAME`] — they would still be path-relevant inside the
/// archive — so a client-supplied name can never escape its folder. Returns
/// [`FALLBACK_NAME`] if nothing survives.
///
/// Sanitizing an already-sanitized name returns it unchanged.
pub fn sanitize_component(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ' ' | '-'))
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        FALLBACK_NAME.to_string()
    } else {
        sanitized
    }
}

/// Build the deterministic display name for an extracted frame.
///
/// The sequence number is zero-padded to four digits, matching decode order:
/// `<video-name>-<NNNN>.jpg`.
///
/// # Example
///
/// ```
/// use stillcut::naming::frame_display_name;
///
/// assert_eq!(frame_display_name("intro", 7), "intro-0007.jpg");
/// ```
pub fn frame_display_name(video_name: &str, sequence_number: u64) -> String {
    format!("{video_name}-{sequence_number:0SEQUENCE_PAD$}.jpg")
}
