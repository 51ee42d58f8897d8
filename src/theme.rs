use catppuccin::PALETTE;
use ratatui::style::Color;

const fn to_color(c: &catppuccin::Color) -> Color {
    Color::Rgb(c.rgb.r, c.rgb.g, c.rgb.b)
}

/// Application theme.
///
/// Holds resolved colors directly so the rest of the code never touches
/// the palette crate. Use [`theme_from_name`] to pick a flavor.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub base: Color,
    pub mantle: Color,
    pub surface0: Color,
    pub surface1: Color,
    pub surface2: Color,
    pub overlay0: Color,
    pub overlay1: Color,
    pub text: Color,
    pub subtext0: Color,
    pub red: Color,
    pub green: Color,
    pub yellow: Color,
    pub blue: Color,
    pub mauve: Color,
    pub peach: Color,
    pub lavender: Color,
}

impl Theme {
    const fn from_catppuccin(flavor: &catppuccin::Flavor) -> Self {
        let c = &flavor.colors;
        Self {
            base: to_color(&c.base),
            mantle: to_color(&c.mantle),
            surface0: to_color(&c.surface0),
            surface1: to_color(&c.surface1),
            surface2: to_color(&c.surface2),
            overlay0: to_color(&c.overlay0),
            overlay1: to_color(&c.overlay1),
            text: to_color(&c.text),
            subtext0: to_color(&c.subtext0),
            red: to_color(&c.red),
            green: to_color(&c.green),
            yellow: to_color(&c.yellow),
            blue: to_color(&c.blue),
            mauve: to_color(&c.mauve),
            peach: to_color(&c.peach),
            lavender: to_color(&c.lavender),
        }
    }
}

pub const MOCHA: Theme = Theme::from_catppuccin(&PALETTE.mocha);
pub const MACCHIATO: Theme = Theme::from_catppuccin(&PALETTE.macchiato);
pub const FRAPPE: Theme = Theme::from_catppuccin(&PALETTE.frappe);
pub const LATTE: Theme = Theme::from_catppuccin(&PALETTE.latte);

/// Resolve a configured theme name, falling back to Mocha.
pub fn theme_from_name(name: &str) -> Theme {
    match name.to_lowercase().as_str() {
        "latte" => LATTE,
        "frappe" | "frappé" => FRAPPE,
        "macchiato" => MACCHIATO,
        _ => MOCHA,
    }
}
