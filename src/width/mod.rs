//! Terminal display width helpers.
//!
//! Provides ANSI-aware width calculation so banners center correctly, plus
//! the row counting used by the viewport overflow rule.

/// Compute the display width of a string after stripping ANSI escapes.
pub fn display_width(text: &str) -> usize {
    let clean = strip_ansi_escapes::strip(text);
    let clean_str = String::from_utf8_lossy(&clean);
    unicode_width::UnicodeWidthStr::width(&*clean_str)
}

/// Number of terminal rows an image occupies. Empty text takes no rows.
pub fn row_count(image: &str) -> usize {
    image.lines().count()
}

/// Overwrite `base` starting at character `pos` with `text`, extending the
/// result if `text` runs past the end of `base`.
pub fn overwrite(base: &str, pos: usize, text: &str) -> String {
    let mut chars: Vec<char> = base.chars().collect();
    if chars.len() < pos {
        chars.resize(pos, ' ');
    }
    for (offset, ch) in text.chars().enumerate() {
        let idx = pos + offset;
        if idx < chars.len() {
            chars[idx] = ch;
        } else {
            chars.push(ch);
        }
    }
    chars.into_iter().collect()
}
