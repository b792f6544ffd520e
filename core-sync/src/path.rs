//! # Path Normalizer
//!
//! Pure string canonicalization for device paths. Nothing here touches the
//! file system and every function is total.
//!
//! - [`normalize_device_path`] cleans up a raw path as it appears in a scan or
//!   inside a playlist file (quotes, `file://`, backslashes, doubled slashes).
//! - [`normalize_relative_segments`] resolves `.` and `..` segments.
//! - [`strip_volume_prefixes`] turns an OS mount path into a device-relative one.

use std::borrow::Cow;

/// Canonicalize a raw path string.
///
/// Strips one pair of surrounding quotes and a `file://` scheme (decoding
/// percent escapes when the scheme was present), converts backslashes to
/// forward slashes and collapses repeated slashes.
pub fn normalize_device_path(raw: &str) -> String {
    let mut path = raw.trim();

    for quote in ['"', '\''] {
        if path.len() >= 2 && path.starts_with(quote) && path.ends_with(quote) {
            path = path[1..path.len() - 1].trim();
            break;
        }
    }

    let path: Cow<'_, str> = match strip_prefix_ignore_ascii_case(path, "file://") {
        Some(rest) => {
            // `file://localhost/x` and `file:///x` both name `/x`
            let rest = strip_prefix_ignore_ascii_case(rest, "localhost").unwrap_or(rest);
            match urlencoding::decode(rest) {
                Ok(decoded) => Cow::Owned(decoded.into_owned()),
                Err(_) => Cow::Borrowed(rest),
            }
        }
        None => Cow::Borrowed(path),
    };

    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for ch in path.chars() {
        let ch = if ch == '\\' { '/' } else { ch };
        if ch == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        out.push(ch);
    }
    out
}

/// Resolve `.` and `..` segments.
///
/// Empty and `.` segments are dropped, `..` pops the previous segment and is
/// discarded when there is nothing left to pop. A leading `/` is preserved.
/// The function is idempotent.
pub fn normalize_relative_segments(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut stack: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    let joined = stack.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Split a normalized path into its non-empty segments
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Parent directory of a relative path, or `""` at the root
pub fn parent_dir(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Join a directory and a relative path, normalizing the result
pub fn join(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        normalize_relative_segments(rest)
    } else {
        normalize_relative_segments(&format!("{}/{}", dir, rest))
    }
}

/// Mount prefixes worth trying for a device.
///
/// Order: the explicit absolute prefix, `/Volumes/<name>`, `/<name>`, then
/// caller extras. Empty entries are skipped.
pub fn volume_prefix_candidates(
    absolute_prefix: Option<&str>,
    device_name: &str,
    extras: &[String],
) -> Vec<String> {
    let mut out = Vec::new();
    let mut push = |candidate: String| {
        let candidate = normalize_relative_segments(&normalize_device_path(&candidate));
        if candidate != "/" && !candidate.is_empty() && !out.contains(&candidate) {
            out.push(candidate);
        }
    };

    if let Some(prefix) = absolute_prefix.filter(|p| !p.trim().is_empty()) {
        push(format!("/{}", prefix.trim().trim_start_matches('/')));
    }

    let name = device_name.trim().trim_matches('/');
    if !name.is_empty() {
        push(format!("/Volumes/{}", name));
        push(format!("/{}", name));
    }

    for extra in extras {
        push(extra.clone());
    }

    out
}

/// Remove the longest matching mount prefix from an absolute path.
///
/// Matching is case-insensitive and only on whole segments, so `/media/usb`
/// does not strip `/media/usb2/a.mp3`. The result keeps its leading `/`;
/// callers that want a device-relative path trim it themselves.
pub fn strip_volume_prefixes(path: &str, prefixes: &[String]) -> String {
    match match_volume_prefix(path, prefixes) {
        Some((_, rest)) if rest.is_empty() => "/".to_string(),
        Some((_, rest)) => rest,
        None => normalize_relative_segments(&normalize_device_path(path)),
    }
}

/// The longest of `prefixes` that `path` starts with, and what follows it
pub fn match_volume_prefix(path: &str, prefixes: &[String]) -> Option<(String, String)> {
    let normalized = normalize_relative_segments(&normalize_device_path(path));

    prefixes
        .iter()
        .map(|p| normalize_relative_segments(&normalize_device_path(p)))
        .map(|p| p.trim_end_matches('/').to_string())
        .filter(|p| !p.is_empty())
        .filter_map(|p| {
            let rest = strip_prefix_ignore_case(&normalized, &p)?;
            if rest.is_empty() || rest.starts_with('/') {
                let rest = rest.to_string();
                Some((p, rest))
            } else {
                None
            }
        })
        .max_by_key(|(p, _)| p.chars().count())
}

/// Case-insensitive `strip_prefix` comparing whole characters
pub(crate) fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let mut value_chars = value.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = value_chars.next()?;
        if !chars_eq_ignore_case(actual, expected) {
            return None;
        }
    }
    match value_chars.next() {
        Some((idx, _)) => Some(&value[idx..]),
        None => Some(""),
    }
}

fn strip_prefix_ignore_ascii_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if value.len() >= prefix.len()
        && value.is_char_boundary(prefix.len())
        && value[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_device_path() {
        assert_eq!(normalize_device_path("  \"MUSIC\\A\\b.mp3\" "), "MUSIC/A/b.mp3");
        assert_eq!(normalize_device_path("MUSIC//A///b.mp3"), "MUSIC/A/b.mp3");
        assert_eq!(
            normalize_device_path("file:///Volumes/WALKMAN/My%20Song.mp3"),
            "/Volumes/WALKMAN/My Song.mp3"
        );
        assert_eq!(
            normalize_device_path("FILE://localhost/media/a.mp3"),
            "/media/a.mp3"
        );
        assert_eq!(normalize_device_path("'single.mp3'"), "single.mp3");
        assert_eq!(normalize_device_path(""), "");
    }

    #[test]
    fn test_percent_only_decoded_for_file_urls() {
        assert_eq!(normalize_device_path("MUSIC/100%25.mp3"), "MUSIC/100%25.mp3");
    }

    #[test]
    fn test_normalize_relative_segments() {
        assert_eq!(normalize_relative_segments("a/./b/../c"), "a/c");
        assert_eq!(normalize_relative_segments("../../a"), "a");
        assert_eq!(normalize_relative_segments("/x/../../y"), "/y");
        assert_eq!(normalize_relative_segments("a//b/"), "a/b");
        assert_eq!(normalize_relative_segments(""), "");
        assert_eq!(normalize_relative_segments("/"), "/");
    }

    #[test]
    fn test_normalize_relative_segments_is_idempotent() {
        let samples = [
            "a/./b/../c",
            "../x",
            "/Volumes/../WALKMAN/./MUSIC",
            "a/b/c/../../..",
            "./",
            "//a//b",
            "/..",
            "x/.../y",
        ];
        for sample in samples {
            let once = normalize_relative_segments(sample);
            assert_eq!(normalize_relative_segments(&once), once, "input {sample}");
        }
    }

    #[test]
    fn test_volume_prefix_candidates() {
        let extras = vec!["/run/media/alice/WALKMAN".to_string()];
        let candidates = volume_prefix_candidates(Some("media/music/"), "WALKMAN", &extras);
        assert_eq!(
            candidates,
            vec![
                "/media/music",
                "/Volumes/WALKMAN",
                "/WALKMAN",
                "/run/media/alice/WALKMAN"
            ]
        );
        assert!(volume_prefix_candidates(None, "", &[]).is_empty());
    }

    #[test]
    fn test_strip_volume_prefixes_longest_wins() {
        let prefixes = vec!["/Volumes".to_string(), "/volumes/walkman".to_string()];
        assert_eq!(
            strip_volume_prefixes("/Volumes/WALKMAN/MUSIC/a.mp3", &prefixes),
            "/MUSIC/a.mp3"
        );
    }

    #[test]
    fn test_strip_volume_prefixes_whole_segments_only() {
        let prefixes = vec!["/media/usb".to_string()];
        assert_eq!(
            strip_volume_prefixes("/media/usb2/a.mp3", &prefixes),
            "/media/usb2/a.mp3"
        );
        assert_eq!(strip_volume_prefixes("/media/usb", &prefixes), "/");
    }

    #[test]
    fn test_match_volume_prefix_reports_prefix() {
        let prefixes = vec!["/WALKMAN".to_string(), "/walkman/MUSIC/".to_string()];
        assert_eq!(
            match_volume_prefix("/WALKMAN/MUSIC/A/b.mp3", &prefixes),
            Some(("/walkman/MUSIC".to_string(), "/A/b.mp3".to_string()))
        );
        assert_eq!(match_volume_prefix("/media/a.mp3", &prefixes), None);
    }

    #[test]
    fn test_parent_and_join() {
        assert_eq!(parent_dir("PLAYLISTS/ROCK/list.m3u"), "PLAYLISTS/ROCK");
        assert_eq!(parent_dir("list.m3u"), "");
        assert_eq!(join("PLAYLISTS/ROCK", "../../MUSIC/a.mp3"), "MUSIC/a.mp3");
        assert_eq!(join("", "./a.mp3"), "a.mp3");
    }

    #[test]
    fn test_strip_prefix_ignore_case_non_ascii() {
        assert_eq!(strip_prefix_ignore_case("/ÉTÉ/a", "/été"), Some("/a"));
        assert_eq!(strip_prefix_ignore_case("/a", "/abc"), None);
    }
}
