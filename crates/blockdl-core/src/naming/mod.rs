//! Local file names for downloads.
//!
//! A name comes from the server's `Content-Disposition` when it carries one,
//! otherwise from the last segment of the URL path, and is always sanitized
//! for Linux before use.

mod disposition;
mod sanitize;

use std::path::{Path, PathBuf};

pub use disposition::disposition_filename;
pub use sanitize::sanitize_for_linux;

/// Used when neither the header nor the URL yields a usable name.
pub const FALLBACK_NAME: &str = "download.bin";

/// Last non-empty path segment of `url`, percent-decoded.
pub fn url_filename(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.rev().find(|s| !s.is_empty())?;
    let decoded = disposition::percent_decode(segment);
    match decoded.as_str() {
        "." | ".." => None,
        _ => Some(decoded),
    }
}

/// Pick a safe file name for the object at `url`.
pub fn file_name_for(url: &str, content_disposition: Option<&str>) -> String {
    let raw = content_disposition
        .and_then(disposition_filename)
        .or_else(|| url_filename(url));
    let Some(raw) = raw else {
        return FALLBACK_NAME.to_string();
    };
    let clean = sanitize_for_linux(&raw);
    if clean.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        clean
    }
}

/// `dir/<file_name_for(url, content_disposition)>`.
pub fn destination_in(dir: &Path, url: &str, content_disposition: Option<&str>) -> PathBuf {
    dir.join(file_name_for(url, content_disposition))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_from_url() {
        assert_eq!(file_name_for("https://mirror.test/iso/disk-12.iso", None), "disk-12.iso");
        assert_eq!(file_name_for("https://mirror.test/pkg.tar.gz?sig=abc", None), "pkg.tar.gz");
        assert_eq!(file_name_for("https://mirror.test/dir/", None), "dir");
    }

    #[test]
    fn url_segment_is_decoded() {
        assert_eq!(file_name_for("https://mirror.test/my%20file.bin", None), "my_file.bin");
    }

    #[test]
    fn header_wins_over_url() {
        let cd = "attachment; filename=\"release.tar.xz\"";
        assert_eq!(file_name_for("https://mirror.test/get?id=7", Some(cd)), "release.tar.xz");
    }

    #[test]
    fn unusable_header_falls_back_to_url() {
        assert_eq!(file_name_for("https://mirror.test/a.bin", Some("inline")), "a.bin");
    }

    #[test]
    fn fallback_name() {
        assert_eq!(file_name_for("https://mirror.test/", None), FALLBACK_NAME);
        assert_eq!(file_name_for("https://mirror.test", None), FALLBACK_NAME);
        assert_eq!(file_name_for("https://mirror.test/..", None), FALLBACK_NAME);
        assert_eq!(file_name_for("not a url", None), FALLBACK_NAME);
        assert_eq!(
            file_name_for("https://mirror.test/x", Some("attachment; filename=\"...\"")),
            FALLBACK_NAME
        );
    }

    #[test]
    fn destination_joins_dir() {
        let p = destination_in(Path::new("/tmp/dl"), "https://mirror.test/a.bin", None);
        assert_eq!(p, PathBuf::from("/tmp/dl/a.bin"));
    }
}
