use std::fmt;

use serde::{Deserialize, Serialize};

/// Requested placement for a field element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Placement {
    PinnedTop,
    PinnedBottom,
    AnchoredTop,
    AnchoredBottom,
    SlideTop,
    SlideBottom,
}

/// How strongly a slot is tied to its boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Pinned,
    Anchored,
    Floating,
}

/// The boundary a slot is placed toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gravity {
    Top,
    Bottom,
}

/// Ordering group in the field, top to bottom. Floating slots share one
/// group regardless of gravity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Group {
    PinnedTop,
    AnchoredTop,
    Floating,
    AnchoredBottom,
    PinnedBottom,
}

impl Placement {
    pub const ALL: [Placement; 6] = [
        Placement::PinnedTop,
        Placement::PinnedBottom,
        Placement::AnchoredTop,
        Placement::AnchoredBottom,
        Placement::SlideTop,
        Placement::SlideBottom,
    ];

    pub const fn mode(self) -> Mode {
        match self {
            Placement::PinnedTop | Placement::PinnedBottom => Mode::Pinned,
            Placement::AnchoredTop | Placement::AnchoredBottom => Mode::Anchored,
            Placement::SlideTop | Placement::SlideBottom => Mode::Floating,
        }
    }

    pub const fn gravity(self) -> Gravity {
        match self {
            Placement::PinnedTop | Placement::AnchoredTop | Placement::SlideTop => Gravity::Top,
            Placement::PinnedBottom | Placement::AnchoredBottom | Placement::SlideBottom => {
                Gravity::Bottom
            }
        }
    }

    pub const fn group(self) -> Group {
        match self {
            Placement::PinnedTop => Group::PinnedTop,
            Placement::AnchoredTop => Group::AnchoredTop,
            Placement::SlideTop | Placement::SlideBottom => Group::Floating,
            Placement::AnchoredBottom => Group::AnchoredBottom,
            Placement::PinnedBottom => Group::PinnedBottom,
        }
    }

    pub fn is_pinned(self) -> bool {
        self.mode() == Mode::Pinned
    }

    pub fn is_floating(self) -> bool {
        self.mode() == Mode::Floating
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Placement::PinnedTop => "pinned-top",
            Placement::PinnedBottom => "pinned-bottom",
            Placement::AnchoredTop => "anchored-top",
            Placement::AnchoredBottom => "anchored-bottom",
            Placement::SlideTop => "slide-top",
            Placement::SlideBottom => "slide-bottom",
        };
        f.write_str(name)
    }
}
