use bevy::prelude::*;

use crate::behaviours::TubeLight;
use crate::config::{rgba, ModConfig};
use crate::scene::ActiveSelf;
use crate::session::{
    PeerConnected, PeerDisconnected, PlayerDataReceived, PlayerRegistry, SessionRoster,
};

/// Interpolation rate toward the target color, per second.
pub const SMOOTH_TIME: f32 = 2.0;
/// Per-channel difference (alpha included) below which the rendered color
/// snaps directly to the target.
pub const COLOR_SNAP_TOLERANCE: f32 = 0.002;

/// Synchronizes the light fixtures of one player place with that seat's
/// color. One instance per place; owns every [`TubeLight`] underneath it.
#[derive(Component, Clone)]
pub struct PlaceLighting {
    pub sort_index: i32,
    pub target_color: Color,
    fixtures: Vec<Entity>,
}

impl PlaceLighting {
    pub fn new(sort_index: i32) -> Self {
        Self {
            sort_index,
            target_color: Color::BLACK,
            fixtures: Vec::new(),
        }
    }

    pub fn fixtures(&self) -> &[Entity] {
        &self.fixtures
    }
}

pub fn colors_close(a: Color, b: Color) -> bool {
    let a = a.to_srgba();
    let b = b.to_srgba();
    (a.red - b.red).abs() <= COLOR_SNAP_TOLERANCE
        && (a.green - b.green).abs() <= COLOR_SNAP_TOLERANCE
        && (a.blue - b.blue).abs() <= COLOR_SNAP_TOLERANCE
        && (a.alpha - b.alpha).abs() <= COLOR_SNAP_TOLERANCE
}

/// One interpolation step from `current` toward `target`: snaps when every
/// channel is within tolerance, otherwise lerps at [`SMOOTH_TIME`] per
/// second.
pub fn step_color(current: Color, target: Color, dt: f32) -> Color {
    if colors_close(current, target) {
        return target;
    }
    let c = current.to_srgba();
    let t = target.to_srgba();
    let f = (dt * SMOOTH_TIME).clamp(0.0, 1.0);
    Color::srgba(
        c.red + (t.red - c.red) * f,
        c.green + (t.green - c.green) * f,
        c.blue + (t.blue - c.blue) * f,
        c.alpha + (t.alpha - c.alpha) * f,
    )
}

fn write_fixtures(fixtures: &[Entity], color: Color, tubes: &mut Query<&mut TubeLight>) {
    for &fixture in fixtures {
        if let Ok(mut tube) = tubes.get_mut(fixture) {
            tube.color = color;
            tube.refreshes += 1;
        }
    }
}

fn set_target(
    place: &mut PlaceLighting,
    color: Color,
    immediate: bool,
    tubes: &mut Query<&mut TubeLight>,
) {
    place.target_color = color;
    if immediate {
        write_fixtures(&place.fixtures, color, tubes);
    }
}

fn collect_fixtures(
    root: Entity,
    children: &Query<&Children>,
    tubes: &Query<&mut TubeLight>,
) -> Vec<Entity> {
    let mut fixtures = Vec::new();
    let mut stack = vec![root];
    while let Some(entity) = stack.pop() {
        if tubes.contains(entity) {
            fixtures.push(entity);
        }
        if let Ok(kids) = children.get(entity) {
            stack.extend(kids.iter().copied());
        }
    }
    fixtures
}

fn enabled(active: Option<&ActiveSelf>) -> bool {
    active.map(|a| a.0).unwrap_or(true)
}

/// Resolve a freshly added place's initial color: local config first, then
/// a matching connected peer's published color (or the default), else
/// black. Applied without a fade.
fn init_place_lighting(
    mut places: Query<(Entity, &mut PlaceLighting), Added<PlaceLighting>>,
    children: Query<&Children>,
    mut tubes: Query<&mut TubeLight>,
    roster: Res<SessionRoster>,
    registry: Res<PlayerRegistry>,
    config: Res<ModConfig>,
) {
    for (entity, mut place) in places.iter_mut() {
        place.fixtures = collect_fixtures(entity, &children, &tubes);

        let Some(local) = roster.local.as_ref() else {
            continue;
        };
        if local.sort_index == place.sort_index {
            let color = rgba(config.player_color);
            set_target(&mut place, color, true, &mut tubes);
            continue;
        }
        if let Some(peer) = roster.connected_with_slot(place.sort_index) {
            let color = registry
                .get(&peer.user_id)
                .map(|d| d.color)
                .unwrap_or(rgba(config.default_player_color));
            set_target(&mut place, color, true, &mut tubes);
            continue;
        }
        set_target(&mut place, Color::BLACK, true, &mut tubes);
    }
}

/// Connect and disconnect updates apply immediately, without a fade.
fn apply_roster_events(
    mut connected: EventReader<PeerConnected>,
    mut disconnected: EventReader<PeerDisconnected>,
    mut places: Query<(&mut PlaceLighting, Option<&ActiveSelf>)>,
    registry: Res<PlayerRegistry>,
    config: Res<ModConfig>,
    mut tubes: Query<&mut TubeLight>,
) {
    for ev in connected.read() {
        for (mut place, active) in places.iter_mut() {
            if !enabled(active) || place.sort_index != ev.0.sort_index {
                continue;
            }
            let color = registry
                .get(&ev.0.user_id)
                .map(|d| d.color)
                .unwrap_or(rgba(config.default_player_color));
            set_target(&mut place, color, true, &mut tubes);
        }
    }
    for ev in disconnected.read() {
        for (mut place, active) in places.iter_mut() {
            if !enabled(active) || place.sort_index != ev.0.sort_index {
                continue;
            }
            set_target(&mut place, Color::BLACK, true, &mut tubes);
        }
    }
}

/// Published color updates fade in over the next frames.
fn apply_color_events(
    mut data: EventReader<PlayerDataReceived>,
    mut places: Query<(&mut PlaceLighting, Option<&ActiveSelf>)>,
    mut tubes: Query<&mut TubeLight>,
) {
    for ev in data.read() {
        for (mut place, active) in places.iter_mut() {
            if !enabled(active) || place.sort_index != ev.sort_index {
                continue;
            }
            set_target(&mut place, ev.data.color, false, &mut tubes);
        }
    }
}

fn update_place_lighting(
    time: Res<Time>,
    places: Query<(&PlaceLighting, Option<&ActiveSelf>)>,
    mut tubes: Query<&mut TubeLight>,
) {
    let dt = time.delta_secs();
    for (place, active) in places.iter() {
        if !enabled(active) {
            continue;
        }
        let current = place
            .fixtures
            .first()
            .and_then(|&f| tubes.get(f).ok())
            .map(|t| t.color)
            .unwrap_or(Color::BLACK);
        if current == place.target_color {
            continue;
        }
        let next = step_color(current, place.target_color, dt);
        write_fixtures(&place.fixtures, next, &mut tubes);
    }
}

pub struct PlaceLightingPlugin;

impl Plugin for PlaceLightingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SessionRoster>()
            .init_resource::<PlayerRegistry>()
            .add_event::<PeerConnected>()
            .add_event::<PeerDisconnected>()
            .add_event::<PlayerDataReceived>()
            .add_systems(
                Update,
                (
                    init_place_lighting,
                    apply_roster_events,
                    apply_color_events,
                    update_place_lighting,
                )
                    .chain(),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{PlayerData, PlayerInfo};

    const RED: Color = Color::srgba(1.0, 0.0, 0.0, 1.0);
    const BLUE: Color = Color::srgba(0.0, 0.0, 1.0, 1.0);
    const GREEN: Color = Color::srgba(0.0, 1.0, 0.0, 1.0);

    fn test_app(config: ModConfig) -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(config)
            .add_plugins(PlaceLightingPlugin);
        app
    }

    fn spawn_place(app: &mut App, sort_index: i32) -> (Entity, Entity) {
        let world = app.world_mut();
        let fixture = world.spawn(TubeLight::default()).id();
        let place = world.spawn(PlaceLighting::new(sort_index)).id();
        world.entity_mut(place).add_child(fixture);
        (place, fixture)
    }

    fn peer(user_id: &str, sort_index: i32) -> PlayerInfo {
        PlayerInfo {
            user_id: user_id.into(),
            sort_index,
            ..Default::default()
        }
    }

    fn fixture_color(app: &App, fixture: Entity) -> Color {
        app.world().get::<TubeLight>(fixture).unwrap().color
    }

    #[test]
    fn local_place_uses_configured_color_with_no_fade() {
        let mut app = test_app(ModConfig {
            player_color: [1.0, 0.0, 0.0, 1.0],
            ..default()
        });
        app.world_mut().resource_mut::<SessionRoster>().local = Some(peer("local", 3));
        let (place, fixture) = spawn_place(&mut app, 3);
        app.update();

        // Applied on the first frame, no interpolation steps.
        assert_eq!(fixture_color(&app, fixture), RED);
        let place = app.world().get::<PlaceLighting>(place).unwrap();
        assert_eq!(place.target_color, RED);
        assert_eq!(place.fixtures().len(), 1);
    }

    #[test]
    fn peer_place_uses_published_color() {
        let mut app = test_app(ModConfig::default());
        app.world_mut().resource_mut::<SessionRoster>().local = Some(peer("local", 0));
        app.world_mut()
            .resource_mut::<SessionRoster>()
            .upsert_connected(peer("friend", 2));
        app.world_mut()
            .resource_mut::<PlayerRegistry>()
            .insert("friend", PlayerData { color: BLUE });
        let (_, fixture) = spawn_place(&mut app, 2);
        app.update();
        assert_eq!(fixture_color(&app, fixture), BLUE);
    }

    #[test]
    fn peer_without_published_data_gets_default_color() {
        let mut app = test_app(ModConfig {
            default_player_color: [0.5, 0.5, 0.5, 1.0],
            ..default()
        });
        app.world_mut().resource_mut::<SessionRoster>().local = Some(peer("local", 0));
        app.world_mut()
            .resource_mut::<SessionRoster>()
            .upsert_connected(peer("friend", 2));
        let (_, fixture) = spawn_place(&mut app, 2);
        app.update();
        assert_eq!(
            fixture_color(&app, fixture),
            Color::srgba(0.5, 0.5, 0.5, 1.0)
        );
    }

    #[test]
    fn unclaimed_slot_is_black() {
        let mut app = test_app(ModConfig::default());
        app.world_mut().resource_mut::<SessionRoster>().local = Some(peer("local", 0));
        let (place, fixture) = spawn_place(&mut app, 4);
        app.update();
        assert_eq!(fixture_color(&app, fixture), Color::BLACK);
        let place = app.world().get::<PlaceLighting>(place).unwrap();
        assert_eq!(place.target_color, Color::BLACK);
    }

    #[test]
    fn disconnect_snaps_slot_to_black() {
        let mut app = test_app(ModConfig::default());
        app.world_mut().resource_mut::<SessionRoster>().local = Some(peer("local", 0));
        app.world_mut()
            .resource_mut::<SessionRoster>()
            .upsert_connected(peer("friend", 3));
        app.world_mut()
            .resource_mut::<PlayerRegistry>()
            .insert("friend", PlayerData { color: BLUE });
        let (_, fixture) = spawn_place(&mut app, 3);
        app.update();
        assert_eq!(fixture_color(&app, fixture), BLUE);

        app.world_mut()
            .send_event(PeerDisconnected(peer("friend", 3)));
        app.update();
        assert_eq!(fixture_color(&app, fixture), Color::BLACK);
    }

    #[test]
    fn published_color_update_fades_instead_of_snapping() {
        let mut app = test_app(ModConfig::default());
        app.world_mut().resource_mut::<SessionRoster>().local = Some(peer("local", 0));
        app.world_mut()
            .resource_mut::<SessionRoster>()
            .upsert_connected(peer("friend", 1));
        app.world_mut()
            .resource_mut::<PlayerRegistry>()
            .insert("friend", PlayerData { color: BLUE });
        let (place, fixture) = spawn_place(&mut app, 1);
        app.update();

        app.world_mut().send_event(PlayerDataReceived {
            user_id: "friend".into(),
            sort_index: 1,
            data: PlayerData { color: GREEN },
        });
        app.update();

        let place = app.world().get::<PlaceLighting>(place).unwrap();
        assert_eq!(place.target_color, GREEN);
        // The fixture is still on its way there.
        assert_ne!(fixture_color(&app, fixture), GREEN);
    }

    #[test]
    fn events_are_ignored_while_place_is_disabled() {
        let mut app = test_app(ModConfig::default());
        app.world_mut().resource_mut::<SessionRoster>().local = Some(peer("local", 0));
        app.world_mut()
            .resource_mut::<SessionRoster>()
            .upsert_connected(peer("friend", 1));
        let (place, fixture) = spawn_place(&mut app, 1);
        app.update();
        app.world_mut().entity_mut(place).insert(ActiveSelf(false));

        app.world_mut()
            .send_event(PeerDisconnected(peer("friend", 1)));
        app.update();
        assert_ne!(fixture_color(&app, fixture), Color::BLACK);
    }

    #[test]
    fn step_snaps_within_tolerance() {
        let near = Color::srgba(0.999, 0.001, 0.0015, 1.0);
        assert_eq!(step_color(near, RED, 0.016), RED);
        // Alpha counts toward the tolerance too.
        let alpha_off = Color::srgba(1.0, 0.0, 0.0, 0.99);
        assert_ne!(step_color(alpha_off, RED, 0.0), RED);
    }

    #[test]
    fn step_moves_halfway_at_quarter_second() {
        let next = step_color(Color::BLACK, Color::srgba(1.0, 1.0, 1.0, 1.0), 0.25);
        let c = next.to_srgba();
        assert!((c.red - 0.5).abs() < 1e-6);
        assert!((c.green - 0.5).abs() < 1e-6);
        assert!((c.blue - 0.5).abs() < 1e-6);
    }

    #[test]
    fn step_factor_is_clamped() {
        let next = step_color(Color::BLACK, RED, 10.0);
        assert_eq!(next, RED);
    }
}
