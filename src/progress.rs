/// Parses a yt-dlp `--newline` progress line such as
/// `[download]  42.3% of  10.00MiB at  1.20MiB/s ETA 00:05` into a fraction.
pub fn parse_progress_from_line(line: &str) -> Option<f32> {
    let rest = line.trim_start().strip_prefix("[download]")?;
    let token = rest.split_whitespace().next()?;
    let number = token.strip_suffix('%')?;
    let v = number.parse::<f32>().ok()?;
    Some((v / 100.0).clamp(0.0, 1.0))
}
