//! Shared terminal icons.
//!
//! Each icon has a plain-text fallback for terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static SCAN: Emoji<'_, '_> = Emoji("📷 ", "[QR]");
pub static IMAGE: Emoji<'_, '_> = Emoji("🖼️  ", "[IMG]");

// Production stages
pub static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[QC]");
pub static WRENCH: Emoji<'_, '_> = Emoji("🔧 ", "[WF]");
pub static TOOLS: Emoji<'_, '_> = Emoji("🛠️  ", "[PS]");
pub static BRUSH: Emoji<'_, '_> = Emoji("🖌️  ", "[PT]");
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "[PK]");
pub static HOUSE: Emoji<'_, '_> = Emoji("🏠 ", "[HI]");
pub static DONE: Emoji<'_, '_> = Emoji("✔️  ", "[OK]");
pub static MISSING: Emoji<'_, '_> = Emoji("⛔ ", "[MS]");
pub static RULER: Emoji<'_, '_> = Emoji("📏 ", "[RT]");
pub static ROLLER: Emoji<'_, '_> = Emoji("🎨 ", "[RP]");
pub static HAMMER: Emoji<'_, '_> = Emoji("🔨 ", "[RR]");
pub static DRAFT: Emoji<'_, '_> = Emoji("📐 ", "[DV]");
pub static FACTORY: Emoji<'_, '_> = Emoji("🏭 ", "[PR]");
