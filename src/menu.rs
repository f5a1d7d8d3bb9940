use bevy::prelude::*;
use std::collections::HashMap;

use crate::config::ModConfig;

/// Position the re-added multiplayer environment scene takes in the
/// transition's scene list: right after the primary gameplay scene, ahead
/// of the substituted environment scene.
const ENVIRONMENT_SCENE_SLOT: usize = 1;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EnvironmentKind {
    Normal,
    Rotational,
}

/// Descriptor for one loadable environment.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentInfo {
    pub serialized_name: String,
    pub scene_name: String,
    pub kind: EnvironmentKind,
}

/// Every environment the host knows about, plus the stock multiplayer one.
#[derive(Resource, Default)]
pub struct EnvironmentCatalog {
    by_name: HashMap<String, EnvironmentInfo>,
    default_multiplayer: Option<EnvironmentInfo>,
}

impl EnvironmentCatalog {
    pub fn insert(&mut self, info: EnvironmentInfo) {
        self.by_name.insert(info.serialized_name.clone(), info);
    }

    pub fn get(&self, serialized_name: &str) -> Option<&EnvironmentInfo> {
        self.by_name.get(serialized_name)
    }

    pub fn set_default_multiplayer(&mut self, info: EnvironmentInfo) {
        self.default_multiplayer = Some(info);
    }

    pub fn default_multiplayer(&self) -> Option<&EnvironmentInfo> {
        self.default_multiplayer.as_ref()
    }
}

/// The player's base-game environment override selection.
#[derive(Resource, Default, Clone)]
pub struct EnvironmentOverrideSettings {
    pub override_environments: bool,
    overrides: HashMap<EnvironmentKind, String>,
}

impl EnvironmentOverrideSettings {
    pub fn set_override(&mut self, kind: EnvironmentKind, serialized_name: impl Into<String>) {
        self.overrides.insert(kind, serialized_name.into());
    }

    pub fn override_for(&self, kind: EnvironmentKind) -> Option<&str> {
        self.overrides.get(&kind).map(String::as_str)
    }
}

/// The host's in-flight multiplayer level transition, as handed to the
/// hooks below while it initializes.
#[derive(Default, Debug)]
pub struct MultiplayerTransitionSetup {
    /// Environment the selected beatmap asks for.
    pub beatmap_environment: String,
    /// Environment the host will actually load for the transition.
    pub multiplayer_environment: Option<EnvironmentInfo>,
}

/// Swaps the multiplayer transition's environment for the beatmap's own,
/// remembering the original so it can be restored after init and its scene
/// re-added to the transition.
#[derive(Resource, Default)]
pub struct MenuTransition {
    original_environment: Option<EnvironmentInfo>,
}

impl MenuTransition {
    /// Runs before the transition setup initializes.
    pub fn before_transition_init(&mut self, world: &World, setup: &mut MultiplayerTransitionSetup) {
        if !world.resource::<ModConfig>().solo_environment {
            return;
        }
        let catalog = world.resource::<EnvironmentCatalog>();

        // If the stock environment info is not loaded yet, load it first so
        // there is something to restore.
        if setup.multiplayer_environment.is_none() {
            setup.multiplayer_environment = catalog.default_multiplayer().cloned();
        }
        self.original_environment = setup.multiplayer_environment.clone();

        match catalog.get(&setup.beatmap_environment) {
            Some(info) => setup.multiplayer_environment = Some(info.clone()),
            None => {
                warn!(
                    "unknown environment '{}', keeping the multiplayer one",
                    setup.beatmap_environment
                );
                return;
            }
        }

        let settings = world.resource::<EnvironmentOverrideSettings>();
        if settings.override_environments {
            if let Some(current) = setup.multiplayer_environment.clone() {
                if let Some(name) = settings.override_for(current.kind) {
                    if let Some(info) = catalog.get(name) {
                        setup.multiplayer_environment = Some(info.clone());
                    }
                }
            }
        }
    }

    /// Runs after the transition setup initialized; puts the stock
    /// environment info back so later transitions start from it.
    pub fn after_transition_init(
        &mut self,
        world: &World,
        setup: &mut MultiplayerTransitionSetup,
    ) {
        if world.resource::<ModConfig>().solo_environment {
            setup.multiplayer_environment = self.original_environment.clone();
        }
    }

    /// Puts the stock multiplayer environment's scene back into the
    /// transition's scene list, at a fixed position rather than appended.
    pub fn add_environment_scenes(&self, world: &World, scenes: &mut Vec<String>) {
        if !world.resource::<ModConfig>().solo_environment {
            return;
        }
        if !scenes.iter().any(|s| s.contains("Multiplayer")) {
            return;
        }
        let Some(original) = self.original_environment.as_ref() else {
            return;
        };
        debug!(
            "Multiplayer transition detected, inserting environment scene '{}'",
            original.scene_name
        );
        let slot = ENVIRONMENT_SCENE_SLOT.min(scenes.len());
        scenes.insert(slot, original.scene_name.clone());
    }
}

pub fn on_before_transition_init(world: &mut World, setup: &mut MultiplayerTransitionSetup) {
    world.resource_scope(|world, mut menu: Mut<MenuTransition>| {
        menu.before_transition_init(world, setup)
    });
}

pub fn on_after_transition_init(world: &mut World, setup: &mut MultiplayerTransitionSetup) {
    world.resource_scope(|world, mut menu: Mut<MenuTransition>| {
        menu.after_transition_init(world, setup)
    });
}

pub fn on_add_environment_scenes(world: &mut World, scenes: &mut Vec<String>) {
    world.resource_scope(|world, menu: Mut<MenuTransition>| {
        menu.add_environment_scenes(world, scenes)
    });
}

pub struct MenuTransitionPlugin;

impl Plugin for MenuTransitionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EnvironmentCatalog>()
            .init_resource::<EnvironmentOverrideSettings>()
            .init_resource::<MenuTransition>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(serialized: &str, scene: &str, kind: EnvironmentKind) -> EnvironmentInfo {
        EnvironmentInfo {
            serialized_name: serialized.into(),
            scene_name: scene.into(),
            kind,
        }
    }

    fn test_app(solo: bool) -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(ModConfig {
                solo_environment: solo,
                ..default()
            })
            .add_plugins(MenuTransitionPlugin);
        let mut catalog = app.world_mut().resource_mut::<EnvironmentCatalog>();
        catalog.insert(env("NiceEnvironment", "NiceEnvironment", EnvironmentKind::Normal));
        catalog.insert(env("GlassDesertEnvironment", "GlassDesertEnvironment", EnvironmentKind::Rotational));
        catalog.set_default_multiplayer(env(
            "MultiplayerEnvironment",
            "MultiplayerEnvironment",
            EnvironmentKind::Normal,
        ));
        app
    }

    #[test]
    fn transition_swaps_in_the_beatmap_environment_and_restores() {
        let mut app = test_app(true);
        let mut setup = MultiplayerTransitionSetup {
            beatmap_environment: "NiceEnvironment".into(),
            multiplayer_environment: None,
        };

        on_before_transition_init(app.world_mut(), &mut setup);
        assert_eq!(
            setup.multiplayer_environment.as_ref().unwrap().scene_name,
            "NiceEnvironment"
        );

        on_after_transition_init(app.world_mut(), &mut setup);
        assert_eq!(
            setup.multiplayer_environment.as_ref().unwrap().scene_name,
            "MultiplayerEnvironment"
        );
    }

    #[test]
    fn base_game_override_wins_when_enabled() {
        let mut app = test_app(true);
        {
            let mut settings = app
                .world_mut()
                .resource_mut::<EnvironmentOverrideSettings>();
            settings.override_environments = true;
            settings.set_override(EnvironmentKind::Normal, "GlassDesertEnvironment");
        }
        let mut setup = MultiplayerTransitionSetup {
            beatmap_environment: "NiceEnvironment".into(),
            multiplayer_environment: None,
        };
        on_before_transition_init(app.world_mut(), &mut setup);
        assert_eq!(
            setup.multiplayer_environment.as_ref().unwrap().scene_name,
            "GlassDesertEnvironment"
        );
    }

    #[test]
    fn unknown_beatmap_environment_keeps_the_multiplayer_one() {
        let mut app = test_app(true);
        let mut setup = MultiplayerTransitionSetup {
            beatmap_environment: "NoSuchEnvironment".into(),
            multiplayer_environment: None,
        };
        on_before_transition_init(app.world_mut(), &mut setup);
        assert_eq!(
            setup.multiplayer_environment.as_ref().unwrap().scene_name,
            "MultiplayerEnvironment"
        );
    }

    #[test]
    fn environment_scene_is_inserted_at_fixed_position() {
        let mut app = test_app(true);
        let mut setup = MultiplayerTransitionSetup {
            beatmap_environment: "NiceEnvironment".into(),
            multiplayer_environment: None,
        };
        on_before_transition_init(app.world_mut(), &mut setup);

        // The transition carries the substituted environment; the stock
        // multiplayer environment scene goes back in at the fixed slot.
        let mut scenes = vec![
            "MultiplayerGameplay".to_string(),
            "NiceEnvironment".to_string(),
        ];
        on_add_environment_scenes(app.world_mut(), &mut scenes);
        assert_eq!(
            scenes,
            vec![
                "MultiplayerGameplay".to_string(),
                "MultiplayerEnvironment".to_string(),
                "NiceEnvironment".to_string(),
            ]
        );
    }

    #[test]
    fn scene_list_untouched_without_multiplayer_or_solo() {
        let mut app = test_app(false);
        let mut scenes = vec![
            "MultiplayerGameplay".to_string(),
            "NiceEnvironment".to_string(),
        ];
        on_add_environment_scenes(app.world_mut(), &mut scenes);
        assert_eq!(scenes.len(), 2);

        let mut app = test_app(true);
        let mut scenes = vec!["GameCore".to_string(), "NiceEnvironment".to_string()];
        on_add_environment_scenes(app.world_mut(), &mut scenes);
        assert_eq!(scenes.len(), 2);
    }
}
