use std::io::Write;

use crossterm::cursor::{MoveTo, MoveToNextLine};
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;

use crate::error::Result;

use super::Frame;

/// Presenter runtime parameters.
#[derive(Debug, Clone, Default)]
pub struct PresenterSettings {
    /// Clear the whole surface before each frame instead of per line.
    pub clear_screen: bool,
    /// Where to leave the cursor once the frame is written (row, column).
    pub restore_cursor: Option<(u16, u16)>,
}

/// Writes composed frames to a terminal handle with crossterm commands.
pub struct TerminalPresenter {
    settings: PresenterSettings,
}

impl TerminalPresenter {
    pub fn new(settings: PresenterSettings) -> Self {
        Self { settings }
    }

    pub fn with_default() -> Self {
        Self::new(PresenterSettings::default())
    }

    pub fn settings_mut(&mut self) -> &mut PresenterSettings {
        &mut self.settings
    }

    pub fn present(&mut self, writer: &mut impl Write, frame: &Frame) -> Result<()> {
        queue!(writer, MoveTo(0, 0))?;
        if self.settings.clear_screen {
            queue!(writer, Clear(ClearType::All))?;
        }
        for line in frame.lines() {
            if !self.settings.clear_screen {
                queue!(writer, Clear(ClearType::CurrentLine))?;
            }
            queue!(writer, Print(line), MoveToNextLine(1))?;
        }
        queue!(writer, Clear(ClearType::FromCursorDown))?;

        if let Some((row, col)) = self.settings.restore_cursor {
            queue!(writer, MoveTo(col, row))?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::FieldElement;
    use crate::field::ReceptiveField;
    use crate::placement::Placement;

    #[test]
    fn presenter_writes_each_line() {
        let field = ReceptiveField::new();
        let _header = FieldElement::text(Placement::PinnedTop, "head\n", Some(&field)).unwrap();
        let _body = FieldElement::text(Placement::SlideTop, "body\n", Some(&field)).unwrap();
        let frame = field.render_frame().unwrap();

        let mut output = Vec::new();
        let mut presenter = TerminalPresenter::with_default();
        presenter.settings_mut().restore_cursor = Some((4, 2));
        presenter.present(&mut output, &frame).unwrap();

        let rendered = String::from_utf8(output).unwrap();
        assert!(rendered.starts_with("\u{1b}[1;1H"));
        assert!(rendered.contains("head"));
        assert!(rendered.contains("body"));
        assert!(rendered.find("head") < rendered.find("body"));
        assert!(rendered.ends_with("\u{1b}[5;3H"));
    }
}
