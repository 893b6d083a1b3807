pub mod icons;
pub mod palette;
pub mod render;

pub use palette::StateStyle;
