//! Turns arbitrary names into path segments every common filesystem accepts.

use regex::Regex;
use std::sync::LazyLock;

/// Characters replaced with `_` before anything else happens.
pub const FORBIDDEN_CHARS: &[char] = &['/', '\\', '*', '?', '<', '>', ':', '|'];

/// Some NAS-encrypted filesystems cap names at 144 characters, so stop short.
pub const MAX_SEGMENT_LEN: usize = 140;

const TRUNCATION_MARKER: &str = "...";

static UNDERSCORE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("valid underscore pattern"));
static NON_PRINTABLE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^ -~]+").expect("valid printable pattern"));

/// Sanitizes `input` into a filesystem-safe path segment.
///
/// Forbidden characters become `_`, runs of `_` collapse into one, runs of
/// non-printable or non-ASCII characters become a single `X`, and the result
/// is cut to [`MAX_SEGMENT_LEN`] characters followed by `...` when longer.
pub fn sanitize(input: &str) -> String {
    let scrubbed = input.replace(FORBIDDEN_CHARS, "_");
    let collapsed = UNDERSCORE_RUNS.replace_all(&scrubbed, "_");
    let printable = NON_PRINTABLE_RUNS.replace_all(&collapsed, "X");

    // Only printable ASCII is left, so byte offsets are char offsets.
    if printable.len() > MAX_SEGMENT_LEN {
        format!("{}{}", &printable[..MAX_SEGMENT_LEN], TRUNCATION_MARKER)
    } else {
        printable.into_owned()
    }
}
