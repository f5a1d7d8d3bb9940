use bevy::prelude::*;
use std::collections::HashMap;

/// Scene name of the host's multiplayer-specific environment.
pub const MULTIPLAYER_ENVIRONMENT_SCENE: &str = "MultiplayerEnvironment";

/// A generic environment scene is any environment scene that is not the
/// multiplayer-specific one.
pub fn is_generic_environment_scene(name: &str) -> bool {
    name.contains("Environment") && !name.contains("Multiplayer")
}

/// The host's scene stack: which scenes are currently presented.
#[derive(Resource, Default)]
pub struct SceneStack {
    presented: Vec<String>,
}

impl SceneStack {
    pub fn push(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.presented.contains(&name) {
            self.presented.push(name);
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.presented.retain(|s| s != name);
    }

    pub fn is_in_stack(&self, name: &str) -> bool {
        self.presented.iter().any(|s| s == name)
    }
}

/// Loaded scenes and their root objects, mirroring the host's scene lookup.
#[derive(Resource, Default)]
pub struct SceneRegistry {
    loaded: HashMap<String, Vec<Entity>>,
}

impl SceneRegistry {
    pub fn register(&mut self, name: impl Into<String>, roots: Vec<Entity>) {
        self.loaded.insert(name.into(), roots);
    }

    pub fn root_objects(&self, name: &str) -> &[Entity] {
        self.loaded.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Per-object activity flag. Objects without the component count as active.
#[derive(Component, Clone, Copy)]
pub struct ActiveSelf(pub bool);

pub fn set_active(world: &mut World, entity: Entity, active: bool) {
    if let Some(mut flag) = world.get_mut::<ActiveSelf>(entity) {
        flag.0 = active;
    } else {
        world.entity_mut(entity).insert(ActiveSelf(active));
    }
}

pub fn is_active(world: &World, entity: Entity) -> bool {
    world.get::<ActiveSelf>(entity).map(|f| f.0).unwrap_or(true)
}

/// Depth-first collection of an object hierarchy, root included.
pub fn descendants(world: &World, root: Entity) -> Vec<Entity> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(entity) = stack.pop() {
        out.push(entity);
        if let Some(children) = world.get::<Children>(entity) {
            stack.extend(children.iter().copied());
        }
    }
    out
}

pub fn find_descendant_with<T: Component>(world: &World, root: Entity) -> Option<Entity> {
    descendants(world, root)
        .into_iter()
        .find(|&e| world.get::<T>(e).is_some())
}

pub fn collect_descendants_with<T: Component>(world: &World, root: Entity) -> Vec<Entity> {
    descendants(world, root)
        .into_iter()
        .filter(|&e| world.get::<T>(e).is_some())
        .collect()
}

pub fn find_descendant_by_name(world: &World, root: Entity, name: &str) -> Option<Entity> {
    descendants(world, root)
        .into_iter()
        .find(|&e| world.get::<Name>(e).is_some_and(|n| n.as_str() == name))
}
