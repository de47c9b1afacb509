//! Text Style
//!
//! The attribute set an SGR stream can toggle on the log: foreground and
//! background color, bold and underline. Colors are resolved to RGB at the
//! time the code is applied so a snapshot never depends on a palette lookup.

use serde::{Deserialize, Serialize};

/// An RGB triple
pub type Rgb = (u8, u8, u8);

/// Color used for the `[HH:MM:SS.mmm] ` prefix of timestamped lines
pub const TIMESTAMP_GRAY: Rgb = (150, 150, 150);

/// The 16 ANSI colors (0-7 normal, 8-15 bright)
pub const ANSI_PALETTE: [Rgb; 16] = [
    (0, 0, 0),       // 0: Black
    (205, 49, 49),   // 1: Red
    (13, 188, 121),  // 2: Green
    (229, 229, 16),  // 3: Yellow
    (36, 114, 200),  // 4: Blue
    (188, 63, 188),  // 5: Magenta
    (17, 168, 205),  // 6: Cyan
    (229, 229, 229), // 7: White
    (102, 102, 102), // 8: Bright Black (gray)
    (241, 76, 76),   // 9: Bright Red
    (35, 209, 139),  // 10: Bright Green
    (245, 245, 67),  // 11: Bright Yellow
    (59, 142, 234),  // 12: Bright Blue
    (214, 112, 214), // 13: Bright Magenta
    (41, 184, 219),  // 14: Bright Cyan
    (255, 255, 255), // 15: Bright White
];

/// Current text attributes
///
/// `None` colors mean "whatever the theme uses by default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleState {
    /// Foreground color
    pub fg: Option<Rgb>,
    /// Background color
    pub bg: Option<Rgb>,
    pub bold: bool,
    pub underline: bool,
}

impl StyleState {
    /// A default style with only the foreground set
    pub const fn with_fg(fg: Rgb) -> Self {
        Self {
            fg: Some(fg),
            bg: None,
            bold: false,
            underline: false,
        }
    }

    /// Reset all attributes to default
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Check whether no attribute is set
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Apply a single numeric SGR code. Unrecognized codes are ignored.
    pub fn apply_code(&mut self, code: u16) {
        match code {
            0 => self.reset(),
            1 => self.bold = true,
            4 => self.underline = true,
            7 => std::mem::swap(&mut self.fg, &mut self.bg),
            22 => self.bold = false,
            24 => self.underline = false,
            30..=37 => self.fg = Some(ANSI_PALETTE[usize::from(code - 30)]),
            90..=97 => self.fg = Some(ANSI_PALETTE[usize::from(code - 90) + 8]),
            40..=47 => self.bg = Some(ANSI_PALETTE[usize::from(code - 40)]),
            100..=107 => self.bg = Some(ANSI_PALETTE[usize::from(code - 100) + 8]),
            _ => {}
        }
    }

    /// Encode this style as a single truecolor SGR sequence.
    ///
    /// The sequence always starts with a reset so it can be emitted without
    /// knowing what the output terminal currently has active.
    pub fn to_sgr(&self) -> String {
        let mut sgr = String::from("\x1b[0");
        if self.bold {
            sgr.push_str(";1");
        }
        if self.underline {
            sgr.push_str(";4");
        }
        if let Some((r, g, b)) = self.fg {
            sgr.push_str(&format!(";38;2;{r};{g};{b}"));
        }
        if let Some((r, g, b)) = self.bg {
            sgr.push_str(&format!(";48;2;{r};{g};{b}"));
        }
        sgr.push('m');
        sgr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_default() {
        let style = StyleState::default();
        assert!(style.is_default());
        assert_eq!(style.fg, None);
        assert!(!style.bold);
    }

    #[test]
    fn test_apply_color_codes() {
        let mut style = StyleState::default();
        style.apply_code(31);
        assert_eq!(style.fg, Some((205, 49, 49)));
        style.apply_code(94);
        assert_eq!(style.fg, Some((59, 142, 234)));
        style.apply_code(42);
        assert_eq!(style.bg, Some((13, 188, 121)));
        style.apply_code(107);
        assert_eq!(style.bg, Some((255, 255, 255)));
    }

    #[test]
    fn test_bold_and_underline_toggle() {
        let mut style = StyleState::default();
        style.apply_code(1);
        style.apply_code(4);
        assert!(style.bold && style.underline);
        style.apply_code(22);
        assert!(!style.bold);
        style.apply_code(24);
        assert!(!style.underline);
    }

    #[test]
    fn test_inverse_swaps_colors() {
        let mut style = StyleState::default();
        style.apply_code(7);
        assert_eq!((style.fg, style.bg), (None, None));

        style.apply_code(31);
        style.apply_code(7);
        assert_eq!(style.fg, None);
        assert_eq!(style.bg, Some(ANSI_PALETTE[1]));
    }

    #[test]
    fn test_reset_and_unknown_codes() {
        let mut style = StyleState::default();
        style.apply_code(1);
        style.apply_code(33);
        style.apply_code(58);
        style.apply_code(999);
        assert!(style.bold);
        style.apply_code(0);
        assert!(style.is_default());
    }

    #[test]
    fn test_to_sgr() {
        assert_eq!(StyleState::default().to_sgr(), "\x1b[0m");
        let mut style = StyleState::with_fg((1, 2, 3));
        style.bold = true;
        assert_eq!(style.to_sgr(), "\x1b[0;1;38;2;1;2;3m");
    }
}
