//! Text fitting for the build-time error box
//!
//! Shared by `build.rs` and the library tests, since a build script's own
//! tests never run.

/// Cut `line` to at most `width` characters, ending in `...` when cut
pub fn fit(line: &str, width: usize) -> String {
    if line.chars().count() <= width {
        return line.to_string();
    }
    let kept: String = line.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}
