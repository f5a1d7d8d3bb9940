//! Per-player environment overrides for a host game's multiplayer mode.
//!
//! The host normally forces one shared environment on every player. This
//! crate intercepts the host's scene-composition pipeline, captures the
//! default environment's objects and installer bindings, suppresses them,
//! and reinstalls the capture into the local player's personal composition
//! scope — so each participant renders their own environment while the
//! host's bookkeeping, lighting, and HUD stay consistent.
//!
//! The host drives everything: it invokes the extension points in
//! [`environment::ScenePipelineHooks`] during scene transitions and ticks
//! the per-frame lighting systems through its schedule. Session roster and
//! connection notifications arrive as Bevy events (see [`session`]).

pub mod behaviours;
pub mod config;
pub mod container;
pub mod environment;
pub mod lighting;
pub mod menu;
pub mod scene;
pub mod session;

use bevy::prelude::*;

use config::ModConfigPlugin;
use environment::EnvironmentOverridePlugin;
use lighting::PlaceLightingPlugin;
use menu::MenuTransitionPlugin;
use session::SessionPlugin;

/// Everything in one plugin: config, session capabilities, the environment
/// override coordinator, place lighting, and menu transition substitution.
pub struct SoloEnvironmentPlugin;

impl Plugin for SoloEnvironmentPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            ModConfigPlugin,
            SessionPlugin,
            EnvironmentOverridePlugin,
            PlaceLightingPlugin,
            MenuTransitionPlugin,
        ));
    }
}
