use bevy::prelude::*;

use crate::behaviours::{
    BrandingInitData, ColorFade, ColorManagerRef, CoreHud, EnvironmentColorManager, HudRef,
    Injectable, LightIdBinding, LightPairRotationEffect, LightSwitchEffect, PositionHud,
    RingsManager,
};
use crate::config::ModConfig;
use crate::container::{CompositionScope, InstallerSet, ScopeKind};
use crate::scene::{
    collect_descendants_with, find_descendant_by_name, find_descendant_with,
    is_generic_environment_scene, set_active, SceneRegistry, SceneStack,
    MULTIPLAYER_ENVIRONMENT_SCENE,
};
use crate::session::SessionEnded;

/// Vertical offset applied to the multiplayer position indicator so it does
/// not overlap the promoted HUD.
const POSITION_HUD_OFFSET: f32 = 0.01;

/// Decoration objects of the local player scope that the captured
/// environment replaces.
const LOCAL_SCOPE_DECORATIONS: [&str; 5] = [
    "Lasers",
    "Construction",
    "BigSmokePS",
    "DustPS",
    "DirectionalLights",
];

/// The named extension points the host's scene-composition layer invokes,
/// in their per-transition order: behaviour discovery, installer
/// enumeration, activation selection, scope behaviour resolution, scope
/// installer resolution, then the install hooks. Each callback may mutate
/// the in-flight collection it is handed.
pub trait ScenePipelineHooks {
    /// The host asks which behaviours live under a scene's roots.
    fn scene_behaviours_discovered(
        &mut self,
        _world: &mut World,
        _scene: &str,
        _behaviours: &mut Vec<Entity>,
    ) {
    }

    /// The host enumerates a scene's installer bindings.
    fn scene_installers_enumerated(
        &mut self,
        _world: &mut World,
        _scene: &str,
        _installers: &mut InstallerSet,
    ) {
    }

    /// The host decides which scene roots to activate this transition.
    fn scenes_to_present(&mut self, _world: &mut World, _scenes: &mut Vec<String>) {}

    /// The host resolves the behaviours to construct for a scope.
    fn scope_behaviours_resolved(
        &mut self,
        _world: &mut World,
        _scope: Entity,
        _behaviours: &mut Vec<Entity>,
    ) {
    }

    /// The host resolves the installers to run for a scope.
    fn scope_installers_resolved(
        &mut self,
        _world: &mut World,
        _scope: Entity,
        _installers: &mut InstallerSet,
    ) {
    }

    /// Veto point before an object is queued for deferred injection.
    fn allow_queue_for_inject(&mut self, _world: &mut World, _instance: Entity) -> bool {
        true
    }

    /// Runs before a scope's installers execute.
    fn before_scope_install(&mut self, _world: &mut World, _scope: Entity) {}

    /// Runs after a scope's scene bindings are installed.
    fn after_scope_bindings_installed(&mut self, _world: &mut World, _scope: Entity) {}

    /// Veto point before the environment scene setup installer runs.
    fn allow_environment_scene_setup(&mut self, _world: &mut World, _scope: Entity) -> bool {
        true
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum OverridePhase {
    #[default]
    Inactive,
    /// Default environment captured and suppressed, held by the coordinator.
    Captured,
    /// Captured environment re-applied into the local player's scope.
    Installed,
}

/// Coordinates the capture of the host's default environment wiring and its
/// reinstallation into the local player's personal composition scope.
#[derive(Resource, Default)]
pub struct EnvironmentOverride {
    phase: OverridePhase,
    held_behaviours: Vec<Entity>,
    held_installers: InstallerSet,
    pending_roots: Vec<Entity>,
}

fn solo_active(world: &World) -> bool {
    world.resource::<ModConfig>().solo_environment
        && world
            .resource::<SceneStack>()
            .is_in_stack(MULTIPLAYER_ENVIRONMENT_SCENE)
}

fn scope_kind(world: &World, scope: Entity) -> Option<ScopeKind> {
    world.get::<CompositionScope>(scope).map(|s| s.kind)
}

impl EnvironmentOverride {
    pub fn phase(&self) -> OverridePhase {
        self.phase
    }

    pub fn pending_roots(&self) -> &[Entity] {
        &self.pending_roots
    }

    /// Discard everything held. Used on session end and when solo mode is
    /// found disabled at capture time.
    pub fn reset(&mut self) {
        self.phase = OverridePhase::Inactive;
        self.held_behaviours.clear();
        self.held_installers.clear();
        self.pending_roots.clear();
    }

    fn activate_held_environment(&mut self, world: &mut World, scope: Entity) {
        info!("Activating captured environment");
        let pending = self.pending_roots.clone();
        for &root in &pending {
            trace!("Enabling environment root {root:?}");
            set_active(world, root, true);
        }

        for name in LOCAL_SCOPE_DECORATIONS {
            if let Some(decoration) = find_descendant_by_name(world, scope, name) {
                set_active(world, decoration, false);
            }
        }

        let Some(mut scope_comp) = world.entity_mut(scope).take::<CompositionScope>() else {
            warn!("local player scope has no composition scope component");
            return;
        };

        // The ring objects were constructed before their container existed;
        // inject their behaviours now and switch them on.
        let managers: Vec<Entity> = pending
            .iter()
            .flat_map(|&root| collect_descendants_with::<RingsManager>(world, root))
            .collect();
        for manager in managers {
            let rings = world
                .get::<RingsManager>(manager)
                .map(|m| m.rings.clone())
                .unwrap_or_default();
            for ring in rings {
                trace!("Fixing injection for ring {ring:?}");
                for injectable in collect_descendants_with::<Injectable>(world, ring) {
                    scope_comp.container.inject(world, injectable);
                }
                set_active(world, ring, true);
            }
        }

        // The host's automatic awake call site is unreachable in this
        // composition order, so the color manager is woken manually.
        match scope_comp.container.resolve::<ColorManagerRef>().map(|r| r.0) {
            Some(manager) => {
                scope_comp.container.inject(world, manager);
                if let Some(mut cm) = world.get_mut::<EnvironmentColorManager>(manager) {
                    cm.awakened = true;
                } else {
                    warn!("color manager binding does not point at a color manager");
                }
            }
            None => warn!("no environment color manager bound, skipping"),
        }

        let switches: Vec<Entity> = pending
            .iter()
            .flat_map(|&root| collect_descendants_with::<LightSwitchEffect>(world, root))
            .collect();
        if switches.is_empty() {
            warn!("Could not find any light switch effects, continuing");
        }
        for entity in switches {
            if let Some(mut switch) = world.get_mut::<LightSwitchEffect>(entity) {
                // The host moved this setup into a lifecycle call that
                // cannot be invoked out of band; recompute it here.
                switch.using_boost_colors = false;
                let resting = if switch.light_on_start {
                    switch.on_color
                } else {
                    switch.on_color.with_alpha(switch.off_intensity)
                };
                let resting_boost = if switch.light_on_start {
                    switch.on_color_boost
                } else {
                    switch.on_color_boost.with_alpha(switch.off_intensity)
                };
                switch.resting_color = resting;
                switch.resting_color_boost = resting_boost;
                switch.fade = Some(ColorFade {
                    from: resting,
                    to: resting,
                });
            }
        }

        // Keep the reactivated roots out of the host's later deactivation
        // sweep.
        scope_comp.active_only_objects.extend(pending.iter().copied());
        world.entity_mut(scope).insert(scope_comp);
    }
}

impl ScenePipelineHooks for EnvironmentOverride {
    fn scene_behaviours_discovered(
        &mut self,
        world: &mut World,
        scene: &str,
        behaviours: &mut Vec<Entity>,
    ) {
        if !solo_active(world) {
            if self.phase != OverridePhase::Inactive {
                debug!("Solo environment off, discarding held capture");
            }
            self.held_behaviours.clear();
            self.phase = OverridePhase::Inactive;
            return;
        }
        if !is_generic_environment_scene(scene) {
            return;
        }

        // The multiplayer scene already provides light/ID management;
        // constructing a second provider would conflict at bind time.
        let conflicting: Vec<Entity> = behaviours
            .iter()
            .copied()
            .filter(|&e| world.get::<LightIdBinding>(e).is_some())
            .collect();
        if !conflicting.is_empty() {
            info!(
                "Removing {} light-id behaviours from scene '{}'",
                conflicting.len(),
                scene
            );
            behaviours.retain(|e| !conflicting.contains(e));
        }

        info!("Preventing environment construction for '{}'", scene);
        self.held_behaviours = behaviours.clone();
        behaviours.clear();
        self.phase = OverridePhase::Captured;
    }

    fn scene_installers_enumerated(
        &mut self,
        world: &mut World,
        scene: &str,
        installers: &mut InstallerSet,
    ) {
        let multiplayer = world
            .resource::<SceneStack>()
            .is_in_stack(MULTIPLAYER_ENVIRONMENT_SCENE);
        let solo = world.resource::<ModConfig>().solo_environment;
        if multiplayer && solo && is_generic_environment_scene(scene) {
            info!("Preventing environment installation for '{}'", scene);
            self.held_installers = installers.take();
        } else if !multiplayer {
            self.held_installers.clear();
        }
    }

    fn scenes_to_present(&mut self, world: &mut World, scenes: &mut Vec<String>) {
        trace!("Scenes to present: {}", scenes.join(", "));
        let Some(generic) = scenes
            .iter()
            .find(|s| is_generic_environment_scene(s))
            .cloned()
        else {
            return;
        };

        if scenes.iter().any(|s| s == MULTIPLAYER_ENVIRONMENT_SCENE) {
            info!("Preventing environment activation ({})", generic);
            self.pending_roots = world
                .resource::<SceneRegistry>()
                .root_objects(&generic)
                .to_vec();
            scenes.retain(|s| s != &generic);
        } else {
            // Solo run: the HUD can come up disabled when it should be on.
            trace!("Ensuring HUD is enabled");
            let roots = world
                .resource::<SceneRegistry>()
                .root_objects(&generic)
                .to_vec();
            for root in roots {
                for hud in collect_descendants_with::<CoreHud>(world, root) {
                    set_active(world, hud, true);
                }
            }
        }
    }

    fn scope_behaviours_resolved(
        &mut self,
        world: &mut World,
        scope: Entity,
        behaviours: &mut Vec<Entity>,
    ) {
        if scope_kind(world, scope) != Some(ScopeKind::LocalActivePlayer)
            || !world.resource::<ModConfig>().solo_environment
        {
            return;
        }
        info!("Injecting captured environment behaviours");
        behaviours.extend(self.held_behaviours.iter().copied());
        self.phase = OverridePhase::Installed;
    }

    fn scope_installers_resolved(
        &mut self,
        world: &mut World,
        scope: Entity,
        installers: &mut InstallerSet,
    ) {
        if scope_kind(world, scope) != Some(ScopeKind::LocalActivePlayer)
            || !world.resource::<ModConfig>().solo_environment
        {
            return;
        }
        info!("Installing captured environment installers");
        installers.extend(&self.held_installers);
    }

    fn allow_queue_for_inject(&mut self, world: &mut World, instance: Entity) -> bool {
        if !solo_active(world) || world.get::<LightPairRotationEffect>(instance).is_none() {
            return true;
        }
        // Incompatible with the deferred-injection scheme: disable the
        // whole effect rather than wiring half of it.
        trace!("Preventing light pair rotation injection for {instance:?}");
        if let Some(parent) = world.get::<Parent>(instance).map(|p| p.get()) {
            set_active(world, parent, false);
        }
        false
    }

    fn before_scope_install(&mut self, world: &mut World, scope: Entity) {
        if scope_kind(world, scope) != Some(ScopeKind::LocalActivePlayer)
            || !world.resource::<ModConfig>().solo_environment
        {
            return;
        }
        let Some(&hud) = self
            .held_behaviours
            .iter()
            .find(|&&e| world.get::<CoreHud>(e).is_some())
        else {
            warn!("no captured HUD found, skipping HUD deduplication");
            return;
        };

        let Some(mut scope_comp) = world.entity_mut(scope).take::<CompositionScope>() else {
            return;
        };
        scope_comp.container.unbind::<HudRef>();
        if let Err(e) = scope_comp.container.bind(HudRef(hud)) {
            warn!("{}", e);
        }
        world.entity_mut(scope).insert(scope_comp);

        if let Some(native_hud) = find_descendant_with::<CoreHud>(world, scope) {
            set_active(world, native_hud, false);
        }
        if let Some(position_hud) = find_descendant_with::<PositionHud>(world, scope) {
            if let Some(mut transform) = world.get_mut::<Transform>(position_hud) {
                transform.translation.y += POSITION_HUD_OFFSET;
            }
        }
    }

    fn after_scope_bindings_installed(&mut self, world: &mut World, scope: Entity) {
        let Some(kind) = scope_kind(world, scope) else {
            return;
        };
        match kind {
            ScopeKind::ConnectedPlayer => {
                // Stateless per-event check, not part of the capture state
                // machine.
                let config = world.resource::<ModConfig>().clone();
                if config.disable_multiplayer_platforms {
                    if let Some(e) = find_descendant_by_name(world, scope, "Construction") {
                        set_active(world, e, false);
                    }
                }
                if config.disable_multiplayer_lights {
                    if let Some(e) = find_descendant_by_name(world, scope, "Lasers") {
                        set_active(world, e, false);
                    }
                }
            }
            ScopeKind::LocalActivePlayer => {
                if world.resource::<ModConfig>().solo_environment {
                    self.activate_held_environment(world, scope);
                }
            }
            ScopeKind::Other => {}
        }
    }

    fn allow_environment_scene_setup(&mut self, world: &mut World, scope: Entity) -> bool {
        let Some(scope_comp) = world.get::<CompositionScope>(scope) else {
            return true;
        };
        // The reinjection above may already have registered this data.
        !scope_comp.container.has_binding::<BrandingInitData>()
    }
}

/// Host-facing entry points: each dispatches one extension point to the
/// coordinator resource.
pub fn on_scene_behaviours_discovered(
    world: &mut World,
    scene: &str,
    behaviours: &mut Vec<Entity>,
) {
    world.resource_scope(|world, mut coordinator: Mut<EnvironmentOverride>| {
        coordinator.scene_behaviours_discovered(world, scene, behaviours)
    });
}

pub fn on_scene_installers_enumerated(
    world: &mut World,
    scene: &str,
    installers: &mut InstallerSet,
) {
    world.resource_scope(|world, mut coordinator: Mut<EnvironmentOverride>| {
        coordinator.scene_installers_enumerated(world, scene, installers)
    });
}

pub fn on_scenes_to_present(world: &mut World, scenes: &mut Vec<String>) {
    world.resource_scope(|world, mut coordinator: Mut<EnvironmentOverride>| {
        coordinator.scenes_to_present(world, scenes)
    });
}

pub fn on_scope_behaviours_resolved(world: &mut World, scope: Entity, behaviours: &mut Vec<Entity>) {
    world.resource_scope(|world, mut coordinator: Mut<EnvironmentOverride>| {
        coordinator.scope_behaviours_resolved(world, scope, behaviours)
    });
}

pub fn on_scope_installers_resolved(
    world: &mut World,
    scope: Entity,
    installers: &mut InstallerSet,
) {
    world.resource_scope(|world, mut coordinator: Mut<EnvironmentOverride>| {
        coordinator.scope_installers_resolved(world, scope, installers)
    });
}

pub fn on_allow_queue_for_inject(world: &mut World, instance: Entity) -> bool {
    world.resource_scope(|world, mut coordinator: Mut<EnvironmentOverride>| {
        coordinator.allow_queue_for_inject(world, instance)
    })
}

pub fn on_before_scope_install(world: &mut World, scope: Entity) {
    world.resource_scope(|world, mut coordinator: Mut<EnvironmentOverride>| {
        coordinator.before_scope_install(world, scope)
    });
}

pub fn on_after_scope_bindings_installed(world: &mut World, scope: Entity) {
    world.resource_scope(|world, mut coordinator: Mut<EnvironmentOverride>| {
        coordinator.after_scope_bindings_installed(world, scope)
    });
}

pub fn on_allow_environment_scene_setup(world: &mut World, scope: Entity) -> bool {
    world.resource_scope(|world, mut coordinator: Mut<EnvironmentOverride>| {
        coordinator.allow_environment_scene_setup(world, scope)
    })
}

fn discard_on_session_end(
    mut ended: EventReader<SessionEnded>,
    mut coordinator: ResMut<EnvironmentOverride>,
) {
    if ended.is_empty() {
        return;
    }
    ended.clear();
    debug!("Session ended, discarding captured environment state");
    coordinator.reset();
}

pub struct EnvironmentOverridePlugin;

impl Plugin for EnvironmentOverridePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneStack>()
            .init_resource::<SceneRegistry>()
            .init_resource::<EnvironmentOverride>()
            .add_event::<SessionEnded>()
            .add_systems(Update, discard_on_session_end);
    }
}
