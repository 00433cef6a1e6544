use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Season/episode marker, e.g. "S01E02", "s1 e2".
regex!(EPISODE_MARKER_REGEX, r"[sS](\d{1,2})\s*[eE](\d{1,2})");
// Years wrapped in brackets are the most reliable; bare years are a fallback.
regex!(WRAPPED_YEAR_REGEX, r"[\(\[]((?:19|20)\d{2})[\)\]]");
regex!(BARE_YEAR_REGEX, r"\b((?:19|20)\d{2})\b");
regex!(BRACKETED_TAG_REGEX, r"\[[^\]]*\]|\{[^}]*\}");
// Release tags that never belong to a title. Words that also occur in real
// titles ("web", "french") must not be listed.
regex!(
    NOISE_TOKEN_REGEX,
    r"(?i)\b(?:2160p|1080p|720p|576p|480p|4k|uhd|hdr10|hdr|x264|x265|h[. ]?264|h[. ]?265|hevc|bluray|blu-ray|brrip|bdrip|webrip|web-?dl|hdtv|dvdrip|remux|multi|vostfr|truefrench|proper|repack)\b"
);
// Characters that cannot appear in a file name on common filesystems.
regex!(UNSAFE_FILENAME_REGEX, r#"[<>:"/\\|?*\x00-\x1F]"#);
regex!(WHITESPACE_REGEX, r"\s+");
// `key="value"` pairs inside an `#EXTINF` directive.
regex!(EXTINF_ATTRIBUTE_REGEX, r#"([\w-]+)="([^"]*)""#);
