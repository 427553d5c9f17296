use crate::width::{display_width, overwrite};

/// Builders for the single-row bars that frame the field.
pub struct Banner;

impl Banner {
    /// A `width`-wide bar of `fill` with ` text ` roughly centered on it.
    pub fn centered(text: &str, width: usize, fill: char) -> String {
        let padded = format!(" {text} ");
        let pos = width.saturating_sub(display_width(&padded)) / 2;
        let bar: String = std::iter::repeat(fill).take(width).collect();
        let mut line = overwrite(&bar, pos, &padded);
        line.push('\n');
        line
    }

    /// Title bar pinned to the very top of the field.
    pub fn header(title: &str, width: usize, fill: char) -> String {
        Self::centered(title, width, fill)
    }

    /// Bar separating the body of the field from the prompt.
    pub fn separator(instructions: &str, width: usize, fill: char) -> String {
        Self::centered(instructions, width, fill)
    }
}
