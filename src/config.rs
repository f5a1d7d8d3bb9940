use bevy::prelude::*;

/// Mod configuration, loaded once from a JSON file and exposed as a resource.
/// All flags are read-only for the rest of the crate.
#[derive(Resource, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ModConfig {
    /// Render the local player's own environment instead of the shared one.
    pub solo_environment: bool,
    /// Hide construction decoration on connected players' platforms.
    pub disable_multiplayer_platforms: bool,
    /// Hide laser decoration on connected players' platforms.
    pub disable_multiplayer_lights: bool,
    pub custom_songs: bool,
    pub free_mod: bool,
    /// RGBA color advertised for the local player's place.
    pub player_color: [f32; 4],
    /// RGBA color used for peers that have not published a color yet.
    pub default_player_color: [f32; 4],
}

impl Default for ModConfig {
    fn default() -> Self {
        Self {
            solo_environment: false,
            disable_multiplayer_platforms: false,
            disable_multiplayer_lights: false,
            custom_songs: true,
            free_mod: false,
            player_color: [0.031, 0.752, 0.847, 1.0],
            default_player_color: [0.6, 0.6, 0.6, 1.0],
        }
    }
}

/// Convert a stored `[r, g, b, a]` array into a [`Color`].
pub fn rgba(channels: [f32; 4]) -> Color {
    Color::srgba(channels[0], channels[1], channels[2], channels[3])
}

pub fn load_mod_config() -> ModConfig {
    let path = std::env::var("SOLOENV_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "soloenv.json".to_string());
    match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<ModConfig>(&contents) {
            Ok(cfg) => {
                info!("Loaded config from {}", path);
                cfg
            }
            Err(e) => {
                warn!("Failed to parse {}: {}", path, e);
                ModConfig::default()
            }
        },
        Err(_) => ModConfig::default(),
    }
}

pub struct ModConfigPlugin;

impl Plugin for ModConfigPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<ModConfig>() {
            app.insert_resource(load_mod_config());
        }
    }
}
