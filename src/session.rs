use bevy::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::config::ModConfig;

pub const STATE_MODDED: &str = "modded";
pub const STATE_CUSTOM_SONGS: &str = "customsongs";
pub const STATE_FREE_MOD: &str = "freemod";

/// One entry in the session roster, local or remote.
#[derive(Clone, Debug, Default)]
pub struct PlayerInfo {
    pub user_id: String,
    /// Stable seat index for the connection's session lifetime.
    pub sort_index: i32,
    pub is_connection_owner: bool,
    pub states: HashSet<String>,
}

impl PlayerInfo {
    pub fn has_state(&self, state: &str) -> bool {
        self.states.contains(state)
    }
}

/// The host's connection roster as this crate sees it.
#[derive(Resource, Default)]
pub struct SessionRoster {
    pub local: Option<PlayerInfo>,
    pub connected: Vec<PlayerInfo>,
}

impl SessionRoster {
    pub fn connected_with_slot(&self, sort_index: i32) -> Option<&PlayerInfo> {
        self.connected.iter().find(|p| p.sort_index == sort_index)
    }

    pub fn upsert_connected(&mut self, player: PlayerInfo) {
        if let Some(existing) = self
            .connected
            .iter_mut()
            .find(|p| p.user_id == player.user_id)
        {
            *existing = player;
        } else {
            self.connected.push(player);
        }
    }

    pub fn remove_connected(&mut self, user_id: &str) {
        self.connected.retain(|p| p.user_id != user_id);
    }

    pub fn set_local_state(&mut self, state: &str, enabled: bool) {
        let Some(local) = self.local.as_mut() else {
            warn!("no local player in roster, cannot publish state '{}'", state);
            return;
        };
        if enabled {
            local.states.insert(state.to_string());
        } else {
            local.states.remove(state);
        }
    }
}

/// Data a peer publishes about itself beyond the host roster.
#[derive(Clone, Debug, Default)]
pub struct PlayerData {
    pub color: Color,
}

/// Published per-peer data, keyed by user id.
#[derive(Resource, Default)]
pub struct PlayerRegistry {
    players: HashMap<String, PlayerData>,
}

impl PlayerRegistry {
    pub fn insert(&mut self, user_id: impl Into<String>, data: PlayerData) {
        self.players.insert(user_id.into(), data);
    }

    pub fn get(&self, user_id: &str) -> Option<&PlayerData> {
        self.players.get(user_id)
    }
}

/// Process-wide capability flags. Initialized on session start and left
/// stale until the next start; readers must not assume reset-on-disconnect.
#[derive(Resource, Default, Clone, Copy)]
pub struct SessionFlags {
    pub custom_songs_enabled: bool,
    pub free_mod_enabled: bool,
    pub local_is_host: bool,
}

/// Which notification streams the capability unit is still listening to.
#[derive(Resource)]
pub struct SessionSubscriptions {
    pub state_changed: bool,
}

impl Default for SessionSubscriptions {
    fn default() -> Self {
        Self { state_changed: true }
    }
}

#[derive(Event)]
pub struct SessionStarted;

#[derive(Event)]
pub struct SessionEnded;

/// The local peer finished connecting.
#[derive(Event)]
pub struct SessionConnected;

#[derive(Event, Clone)]
pub struct PeerConnected(pub PlayerInfo);

#[derive(Event, Clone)]
pub struct PeerDisconnected(pub PlayerInfo);

#[derive(Event, Clone)]
pub struct PeerStateChanged(pub PlayerInfo);

/// A peer published its extended data (color).
#[derive(Event, Clone)]
pub struct PlayerDataReceived {
    pub user_id: String,
    pub sort_index: i32,
    pub data: PlayerData,
}

fn track_roster(
    mut connected: EventReader<PeerConnected>,
    mut disconnected: EventReader<PeerDisconnected>,
    mut data: EventReader<PlayerDataReceived>,
    mut roster: ResMut<SessionRoster>,
    mut registry: ResMut<PlayerRegistry>,
) {
    for ev in connected.read() {
        roster.upsert_connected(ev.0.clone());
    }
    for ev in disconnected.read() {
        roster.remove_connected(&ev.0.user_id);
    }
    for ev in data.read() {
        registry.insert(ev.user_id.clone(), ev.data.clone());
    }
}

fn handle_session_started(
    mut started: EventReader<SessionStarted>,
    config: Res<ModConfig>,
    mut flags: ResMut<SessionFlags>,
    mut roster: ResMut<SessionRoster>,
    mut subscriptions: ResMut<SessionSubscriptions>,
) {
    if started.is_empty() {
        return;
    }
    started.clear();
    info!("Setting up session capabilities");

    flags.custom_songs_enabled = config.custom_songs;
    flags.free_mod_enabled = config.free_mod;

    roster.set_local_state(STATE_MODDED, true);
    roster.set_local_state(STATE_CUSTOM_SONGS, config.custom_songs);
    roster.set_local_state(STATE_FREE_MOD, config.free_mod);

    subscriptions.state_changed = true;
}

fn handle_connected(
    mut connected: EventReader<SessionConnected>,
    roster: Res<SessionRoster>,
    mut flags: ResMut<SessionFlags>,
) {
    if connected.is_empty() {
        return;
    }
    connected.clear();
    flags.local_is_host = roster
        .local
        .as_ref()
        .map(|l| l.is_connection_owner)
        .unwrap_or(false);
}

fn handle_peer_state_changed(
    mut changed: EventReader<PeerStateChanged>,
    subscriptions: Res<SessionSubscriptions>,
    mut flags: ResMut<SessionFlags>,
) {
    if !subscriptions.state_changed {
        changed.clear();
        return;
    }
    for ev in changed.read() {
        // The session owner's declared capability is authoritative.
        if ev.0.is_connection_owner {
            flags.custom_songs_enabled = ev.0.has_state(STATE_CUSTOM_SONGS);
        }
    }
}

fn handle_session_ended(
    mut ended: EventReader<SessionEnded>,
    mut subscriptions: ResMut<SessionSubscriptions>,
) {
    if ended.is_empty() {
        return;
    }
    ended.clear();
    // TODO: the connected handler stays subscribed past teardown; decide
    // whether it should be dropped here too.
    subscriptions.state_changed = false;
}

pub struct SessionPlugin;

impl Plugin for SessionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SessionFlags>()
            .init_resource::<SessionRoster>()
            .init_resource::<PlayerRegistry>()
            .init_resource::<SessionSubscriptions>()
            .add_event::<SessionStarted>()
            .add_event::<SessionEnded>()
            .add_event::<SessionConnected>()
            .add_event::<PeerConnected>()
            .add_event::<PeerDisconnected>()
            .add_event::<PeerStateChanged>()
            .add_event::<PlayerDataReceived>()
            .add_systems(
                Update,
                (
                    track_roster,
                    handle_session_started,
                    handle_connected,
                    handle_peer_state_changed,
                    handle_session_ended,
                )
                    .chain(),
            );
    }
}
