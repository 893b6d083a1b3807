//! Colour, short code and icon for every production state.

use console::{Color, Emoji, Style};

use crate::models::PartState;
use crate::ui::icons::{
    BRUSH, DONE, DRAFT, FACTORY, HAMMER, HOUSE, MISSING, PACKAGE, ROLLER, RULER, SEARCH, TOOLS,
    WRENCH,
};

#[derive(Clone, Copy)]
pub struct StateStyle {
    /// Two-letter column code.
    pub code: &'static str,
    pub color: Color,
    pub icon: Emoji<'static, 'static>,
}

impl StateStyle {
    /// The match is exhaustive, so a new state cannot ship without a style.
    pub fn of(state: PartState) -> Self {
        use PartState::*;
        let (code, color, icon) = match state {
            Development => ("DV", Color::White, DRAFT),
            InProduction => ("PR", Color::White, FACTORY),
            FactoryQualityControl => ("QC", Color::Blue, SEARCH),
            WeldingFlapping => ("WF", Color::Blue, WRENCH),
            PhosphatingSanding => ("PS", Color::Blue, TOOLS),
            Painting => ("PT", Color::Blue, BRUSH),
            Packing => ("PK", Color::Blue, PACKAGE),
            HomeInstallation => ("HI", Color::Blue, HOUSE),
            InstalledSuccess => ("OK", Color::Green, DONE),
            Missing => ("MS", Color::Red, MISSING),
            OutOfSpecReturn => ("RT", Color::Color256(208), RULER),
            Repainting => ("RP", Color::Yellow, ROLLER),
            Repair => ("RR", Color::Red, HAMMER),
        };
        Self { code, color, icon }
    }

    pub fn style(&self) -> Style {
        Style::new().fg(self.color).bold()
    }

    /// `icon LABEL` in the state colour.
    pub fn heading(&self, state: PartState) -> String {
        format!("{}{}", self.icon, self.style().apply_to(state.label()))
    }
}
