use bevy::prelude::*;

/// Marks an object the host considers for capability injection when its
/// scene or scope is composed.
#[derive(Component, Clone, Copy)]
pub struct Injectable;

/// A scene binding whose bound capability includes light/ID management.
/// Only one provider of this capability may exist per composition, so the
/// generic environment's copy has to be dropped in multiplayer.
#[derive(Component, Clone, Copy)]
pub struct LightIdBinding;

/// The core head-up display controller.
#[derive(Component, Clone, Copy)]
pub struct CoreHud;

/// The multiplayer position indicator attached to a player scope.
#[derive(Component, Clone, Copy)]
pub struct PositionHud;

/// Light-pair rotation effect. Incompatible with deferred injection; the
/// coordinator disables its parent instead of letting it queue.
#[derive(Component, Clone, Copy)]
pub struct LightPairRotationEffect;

/// Manages a set of track lane ring objects that are constructed before
/// their container exists.
#[derive(Component, Clone, Default)]
pub struct RingsManager {
    pub rings: Vec<Entity>,
}

/// A light-emitting fixture owned by a place or environment.
#[derive(Component, Clone, Copy)]
pub struct TubeLight {
    pub color: Color,
    pub refreshes: u32,
}

impl Default for TubeLight {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            refreshes: 0,
        }
    }
}

/// Resting-state fade used by a light switch between event updates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorFade {
    pub from: Color,
    pub to: Color,
}

/// A light switch that toggles fixture groups on beatmap events. Its
/// resting colors and fade are normally set up in a lifecycle call the
/// coordinator cannot invoke, so they get rebuilt manually after install.
#[derive(Component, Clone)]
pub struct LightSwitchEffect {
    pub light_on_start: bool,
    pub on_color: Color,
    pub on_color_boost: Color,
    pub off_intensity: f32,
    pub using_boost_colors: bool,
    pub resting_color: Color,
    pub resting_color_boost: Color,
    pub fade: Option<ColorFade>,
}

impl LightSwitchEffect {
    pub fn new(light_on_start: bool, on_color: Color, on_color_boost: Color) -> Self {
        Self {
            light_on_start,
            on_color,
            on_color_boost,
            off_intensity: 0.2,
            using_boost_colors: false,
            resting_color: Color::BLACK,
            resting_color_boost: Color::BLACK,
            fade: None,
        }
    }
}

/// The environment's color manager. Its awake step is re-run manually when
/// the environment is composed inside a player scope.
#[derive(Component, Clone, Copy, Default)]
pub struct EnvironmentColorManager {
    pub awakened: bool,
}

/// Container binding for the canonical HUD instance of a scope.
pub struct HudRef(pub Entity);

/// Container binding pointing at the environment color manager object.
pub struct ColorManagerRef(pub Entity);

/// Initializer data the branding-manager installer registers. Presence of
/// this binding means the installer already ran for the container.
#[derive(Clone, Default)]
pub struct BrandingInitData {
    pub brand_name: String,
}
