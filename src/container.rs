use bevy::prelude::*;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

/// Identifier newtypes for the five installer collections a composition
/// scope is wired from. The host treats them as opaque handles.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InstallerId(pub String);

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InstallerTypeId(pub String);

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AssetInstallerId(pub String);

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PrefabInstallerId(pub String);

/// The five installer-binding collections that describe how a scope's
/// dependency graph gets built. Captured and restored only as a unit; a
/// scope must end up with all five or none of them.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct InstallerSet {
    pub normal: Vec<InstallerId>,
    pub types: Vec<InstallerTypeId>,
    pub assets: Vec<AssetInstallerId>,
    pub attached: Vec<Entity>,
    pub prefabs: Vec<PrefabInstallerId>,
}

impl InstallerSet {
    pub fn is_empty(&self) -> bool {
        self.normal.is_empty()
            && self.types.is_empty()
            && self.assets.is_empty()
            && self.attached.is_empty()
            && self.prefabs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.normal.len()
            + self.types.len()
            + self.assets.len()
            + self.attached.len()
            + self.prefabs.len()
    }

    pub fn clear(&mut self) {
        self.normal.clear();
        self.types.clear();
        self.assets.clear();
        self.attached.clear();
        self.prefabs.clear();
    }

    /// Move all five collections out, leaving this set empty. Snapshot and
    /// suppression in one step, so the capture can never be partial.
    pub fn take(&mut self) -> InstallerSet {
        std::mem::take(self)
    }

    pub fn extend(&mut self, other: &InstallerSet) {
        self.normal.extend(other.normal.iter().cloned());
        self.types.extend(other.types.iter().cloned());
        self.assets.extend(other.assets.iter().cloned());
        self.attached.extend(other.attached.iter().copied());
        self.prefabs.extend(other.prefabs.iter().cloned());
    }
}

/// Counts how many times an object has gone through capability injection.
#[derive(Component, Default)]
pub struct Injected(pub u32);

/// Type-keyed dependency container for one composition scope, modeling the
/// host's bind/unbind/resolve/has-binding surface.
#[derive(Default)]
pub struct BindingContainer {
    bindings: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl BindingContainer {
    /// Register a value for its type. Registering a second value of the
    /// same type is an error, as it is in the host container.
    pub fn bind<T: Send + Sync + 'static>(&mut self, value: T) -> Result<(), String> {
        let key = TypeId::of::<T>();
        if self.bindings.contains_key(&key) {
            return Err(format!("duplicate binding for {}", type_name::<T>()));
        }
        self.bindings.insert(key, Box::new(value));
        Ok(())
    }

    pub fn has_binding<T: Send + Sync + 'static>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<T>())
    }

    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.bindings
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref::<T>())
    }

    /// Remove a binding. Returns whether one was present.
    pub fn unbind<T: Send + Sync + 'static>(&mut self) -> bool {
        self.bindings.remove(&TypeId::of::<T>()).is_some()
    }

    /// Run capability injection for one object.
    pub fn inject(&self, world: &mut World, entity: Entity) {
        if let Some(mut count) = world.get_mut::<Injected>(entity) {
            count.0 += 1;
        } else {
            world.entity_mut(entity).insert(Injected(1));
        }
    }
}

/// What kind of composition scope an object graph belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScopeKind {
    /// The local player's personal gameplay scope.
    LocalActivePlayer,
    /// A remote player's platform scope.
    ConnectedPlayer,
    Other,
}

/// Root component of a composition scope: its kind, its container, and the
/// objects the host must keep active for the scope's lifetime.
#[derive(Component)]
pub struct CompositionScope {
    pub kind: ScopeKind,
    pub container: BindingContainer,
    pub active_only_objects: Vec<Entity>,
}

impl CompositionScope {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            container: BindingContainer::default(),
            active_only_objects: Vec::new(),
        }
    }
}
