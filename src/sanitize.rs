use once_cell::sync::Lazy;
use regex::Regex;

static ILLEGAL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("valid regex"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[()\[\]{} ]").expect("valid regex"));
static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("valid regex"));

/// Name used when a title sanitizes down to nothing.
pub const FALLBACK_NAME: &str = "video";

/// Turns a video title into a filesystem-safe file stem.
///
/// Characters illegal in file names are dropped, brackets and spaces become
/// underscores, runs of underscores collapse and edge underscores are trimmed.
pub fn sanitize_filename(title: &str) -> String {
    let name = ILLEGAL.replace_all(title, "");
    let name = SEPARATORS.replace_all(&name, "_");
    let name = UNDERSCORES.replace_all(&name, "_");
    let name = name.trim_matches('_');
    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name.to_string()
    }
}
