use bevy::prelude::*;
use snap_core::{
    CaptureConfig, CaptureMode, Platform, PlatformProfile, RectSnap, RectSnapPlugin, SnapFailed,
    SnapHelper, SnapRequest, SnapSettings, SnapSurface, SnapTaken, UiHideMode,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Demo options from the command line.
#[derive(Resource, Clone, Debug)]
struct DemoConfig {
    mode: CaptureMode,
    hide: UiHideMode,
    out_dir: PathBuf,
    simulate: Option<Platform>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Recommended,
            hide: UiHideMode::DontHide,
            out_dir: PathBuf::from("screenshots/snaps"),
            simulate: None,
        }
    }
}

impl DemoConfig {
    /// Parse command-line arguments.
    ///
    /// Supported args:
    /// - `--mode <recommended|texture|full>` - Capture strategy
    /// - `--hide <none|surface|target>` - UI hidden during full-screen captures
    /// - `--out <dir>` - Directory snapshots are written to
    /// - `--simulate <android|ios|web|...>` - Run as an editor simulating a platform
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut config = Self::default();
        let mut i = 1;

        while i < args.len() {
            let value = args.get(i + 1).map(String::as_str);
            match (args[i].as_str(), value) {
                ("--mode", Some(v)) => {
                    match parse_mode(v) {
                        Some(mode) => config.mode = mode,
                        None => eprintln!("Warning: unknown --mode '{}'", v),
                    }
                    i += 2;
                }
                ("--hide", Some(v)) => {
                    match parse_hide(v) {
                        Some(hide) => config.hide = hide,
                        None => eprintln!("Warning: unknown --hide '{}'", v),
                    }
                    i += 2;
                }
                ("--out", Some(v)) => {
                    config.out_dir = PathBuf::from(v);
                    i += 2;
                }
                ("--simulate", Some(v)) => {
                    match parse_platform(v) {
                        Some(platform) => config.simulate = Some(platform),
                        None => eprintln!("Warning: unknown --simulate platform '{}'", v),
                    }
                    i += 2;
                }
                ("--mode" | "--hide" | "--out" | "--simulate", None) => {
                    eprintln!("Warning: {} requires an argument", args[i]);
                    i += 1;
                }
                _ => {
                    i += 1;
                }
            }
        }

        config
    }

    fn profile(&self) -> PlatformProfile {
        match self.simulate {
            Some(platform) => PlatformProfile::editor_simulating(platform),
            None => PlatformProfile::current(),
        }
    }
}

fn parse_mode(value: &str) -> Option<CaptureMode> {
    match value {
        "recommended" => Some(CaptureMode::Recommended),
        "texture" => Some(CaptureMode::ForceTextureTarget),
        "full" => Some(CaptureMode::ForceFullScreen),
        _ => None,
    }
}

fn parse_hide(value: &str) -> Option<UiHideMode> {
    match value {
        "none" => Some(UiHideMode::DontHide),
        "surface" => Some(UiHideMode::HideWholeSurface),
        "target" => Some(UiHideMode::HideTargetOnly),
        _ => None,
    }
}

fn parse_platform(value: &str) -> Option<Platform> {
    match value {
        "android" => Some(Platform::Android),
        "ios" => Some(Platform::Ios),
        "web" => Some(Platform::Web),
        "windows" => Some(Platform::Windows),
        "macos" => Some(Platform::MacOs),
        "linux" => Some(Platform::Linux),
        _ => None,
    }
}

fn main() {
    let demo = DemoConfig::from_args();
    let settings = SnapSettings::default().with_profile(demo.profile());

    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(RectSnapPlugin)
        .insert_resource(settings)
        .insert_resource(demo)
        .insert_resource(ClearColor(Color::srgb(0.05, 0.05, 0.08)))
        .add_systems(Startup, setup)
        .add_systems(Update, (spin_cube, snap_on_key, log_snap_messages))
        .run();
}

#[derive(Component)]
struct Spinning;

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    demo: Res<DemoConfig>,
) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 2.5, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        PointLight {
            intensity: 2_000_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0),
    ));
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(1.5, 1.5, 1.5))),
        MeshMaterial3d(materials.add(Color::srgb(0.8, 0.4, 0.2))),
        Spinning,
    ));

    let root = commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            SnapSurface,
        ))
        .id();

    let panel = commands
        .spawn((
            Node {
                width: Val::Percent(40.0),
                height: Val::Percent(50.0),
                border: UiRect::all(Val::Px(2.0)),
                ..default()
            },
            BackgroundColor(Color::srgba(0.2, 0.6, 0.9, 0.25)),
            BorderColor::all(Color::WHITE),
            ChildOf(root),
        ))
        .id();

    let out_dir = demo.out_dir.clone();
    let counter = Arc::new(AtomicUsize::new(0));
    let config = CaptureConfig::new(panel)
        .with_mode(demo.mode)
        .with_ui_hide_mode(demo.hide);

    commands.entity(panel).insert((
        RectSnap::new(config),
        SnapHelper::new().with_callback(move |image| {
            let index = counter.fetch_add(1, Ordering::Relaxed);
            let path = out_dir.join(format!("snap_{:03}.png", index));
            if let Err(e) = std::fs::create_dir_all(&out_dir) {
                error!("Failed to create {}: {}", out_dir.display(), e);
                return;
            }
            match image.save(&path) {
                Ok(()) => info!(
                    "Saved {}x{} snapshot to {}",
                    image.width(),
                    image.height(),
                    path.display()
                ),
                Err(e) => error!("Failed to save {}: {}", path.display(), e),
            }
        }),
    ));

    commands.spawn((
        Text::new("Space: snap panel   R: snap via message"),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            top: Val::Px(12.0),
            ..default()
        },
        ChildOf(root),
    ));
}

fn spin_cube(time: Res<Time>, mut cubes: Query<&mut Transform, With<Spinning>>) {
    for mut transform in &mut cubes {
        transform.rotate_y(time.delta_secs() * 0.8);
    }
}

fn snap_on_key(
    keys: Res<ButtonInput<KeyCode>>,
    mut helpers: Query<(Entity, &mut SnapHelper)>,
    mut requests: MessageWriter<SnapRequest>,
) {
    for (entity, mut helper) in &mut helpers {
        if keys.just_pressed(KeyCode::Space) {
            helper.snap();
        }
        if keys.just_pressed(KeyCode::KeyR) {
            requests.write(SnapRequest { entity });
        }
    }
}

fn log_snap_messages(
    mut taken: MessageReader<SnapTaken>,
    mut failed: MessageReader<SnapFailed>,
    snaps: Query<&RectSnap>,
) {
    for snap in taken.read() {
        info!(
            "Snapshot of {} taken: {}x{}",
            snap.entity,
            snap.image.width(),
            snap.image.height()
        );
    }
    for snap in failed.read() {
        let busy = snaps.get(snap.entity).is_ok_and(|s| s.is_busy());
        warn!("Snapshot of {} failed (busy: {}): {}", snap.entity, busy, snap.error);
    }
}
