// src/pipeline/direction.rs
//! Trend code to display glyph mapping.

use crate::models::Direction;

// ---

/// Glyph per trend code, fixed for the lifetime of the widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionIcons {
    // ---
    pub double_up: String,
    pub single_up: String,
    pub forty_five_up: String,
    pub flat: String,
    pub forty_five_down: String,
    pub single_down: String,
    pub double_down: String,
}

impl Default for DirectionIcons {
    fn default() -> Self {
        DirectionIcons {
            double_up: "⬆️⬆️".into(),
            single_up: "⬆️".into(),
            forty_five_up: "↗️".into(),
            flat: "➡️".into(),
            forty_five_down: "↘️".into(),
            single_down: "⬇️".into(),
            double_down: "⬇️⬇️".into(),
        }
    }
}

impl DirectionIcons {
    pub fn glyph(&self, direction: Direction) -> &str {
        // ---
        match direction {
            Direction::DoubleUp => &self.double_up,
            Direction::SingleUp => &self.single_up,
            Direction::FortyFiveUp => &self.forty_five_up,
            Direction::Flat => &self.flat,
            Direction::FortyFiveDown => &self.forty_five_down,
            Direction::SingleDown => &self.single_down,
            Direction::DoubleDown => &self.double_down,
        }
    }

    /// Lookup by wire code. Unknown codes yield an empty string.
    pub fn glyph_for_code(&self, code: &str) -> &str {
        Direction::from_code(code).map_or("", |d| self.glyph(d))
    }
}
