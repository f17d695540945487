//! Bevy plugin wiring rect snapshots into the frame loop.
//!
//! # Usage
//!
//! ```ignore
//! app.add_plugins(RectSnapPlugin);
//!
//! commands.spawn((
//!     RectSnap::new(CaptureConfig::new(panel)),
//!     SnapHelper::new().with_callback(|image| { /* ... */ }),
//! ));
//!
//! // Or from any system:
//! requests.write(SnapRequest { entity });
//! ```
//!
//! All snapshots advance in `Last`, once per frame, on real time. Results of
//! `SnapRequest`s come back as `SnapTaken` / `SnapFailed` messages.

use crate::bevy_host::{BevyCaptureHost, ReadbackInbox};
use crate::config::{CaptureConfig, SnapSettings};
use crate::coordinator::{CaptureCoordinator, SnapCallback};
use crate::error::{CaptureError, CaptureResult};
use crate::helper::SnapHelper;
use async_channel::{Receiver, Sender};
use bevy::camera::RenderTarget;
use bevy::log::warn;
use bevy::prelude::*;
use image::RgbaImage;

/// Coordinator type driven by the Bevy host.
pub type BevyCoordinator = CaptureCoordinator<Handle<Image>, RenderTarget>;

/// A capturable target: config plus its single-flight coordinator.
#[derive(Component, Default)]
pub struct RectSnap {
    pub config: CaptureConfig,
    coordinator: BevyCoordinator,
    pending: Option<SnapCallback>,
}

impl RectSnap {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            ..default()
        }
    }

    /// Whether a snapshot is pending or in flight.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some() || self.coordinator.is_in_flight()
    }

    /// Queue a snapshot to start this frame.
    ///
    /// Rejected with [`CaptureError::Busy`] while another one is pending or in
    /// flight; `on_done` is dropped without being called in that case.
    pub fn request(
        &mut self,
        on_done: impl FnOnce(CaptureResult<RgbaImage>) + Send + Sync + 'static,
    ) -> CaptureResult<()> {
        if self.is_busy() {
            warn!("Snapshot already in progress, request dropped");
            return Err(CaptureError::Busy);
        }
        self.pending = Some(Box::new(on_done));
        Ok(())
    }
}

/// Ask the `RectSnap` on `entity` for a snapshot.
#[derive(Message, Clone, Copy, Debug)]
pub struct SnapRequest {
    pub entity: Entity,
}

/// A snapshot requested through [`SnapRequest`] finished.
#[derive(Message, Clone, Debug)]
pub struct SnapTaken {
    pub entity: Entity,
    pub image: RgbaImage,
}

/// A snapshot could not be taken.
#[derive(Message, Clone, Debug)]
pub struct SnapFailed {
    pub entity: Entity,
    pub error: String,
}

/// Results of message-driven snapshots, sent from completion callbacks.
#[derive(Resource)]
struct SnapOutbox {
    sender: Sender<(Entity, CaptureResult<RgbaImage>)>,
    receiver: Receiver<(Entity, CaptureResult<RgbaImage>)>,
}

impl Default for SnapOutbox {
    fn default() -> Self {
        let (sender, receiver) = async_channel::unbounded();
        Self { sender, receiver }
    }
}

/// Plugin that drives every [`RectSnap`] in the world.
pub struct RectSnapPlugin;

impl Plugin for RectSnapPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SnapSettings>()
            .init_resource::<ReadbackInbox>()
            .init_resource::<SnapOutbox>()
            .add_message::<SnapRequest>()
            .add_message::<SnapTaken>()
            .add_message::<SnapFailed>()
            .add_systems(
                Last,
                (
                    queue_snap_requests,
                    trigger_snap_helpers,
                    drive_rect_snaps,
                    publish_snap_results,
                )
                    .chain(),
            );
    }
}

fn queue_snap_requests(
    mut requests: MessageReader<SnapRequest>,
    mut snaps: Query<&mut RectSnap>,
    outbox: Res<SnapOutbox>,
    mut failed: MessageWriter<SnapFailed>,
) {
    for request in requests.read() {
        let Ok(mut snap) = snaps.get_mut(request.entity) else {
            failed.write(SnapFailed {
                entity: request.entity,
                error: format!("{} has no RectSnap", request.entity),
            });
            continue;
        };

        let sender = outbox.sender.clone();
        let entity = request.entity;
        let queued = snap.request(move |result| {
            let _ = sender.try_send((entity, result));
        });
        if let Err(e) = queued {
            failed.write(SnapFailed {
                entity,
                error: e.to_string(),
            });
        }
    }
}

fn trigger_snap_helpers(mut helpers: Query<(&mut SnapHelper, &mut RectSnap)>) {
    for (mut helper, mut snap) in &mut helpers {
        if helper.take_request() {
            let _ = snap.request(helper.fan_out());
        }
    }
}

/// Advance in-flight snapshots, then start newly requested ones.
///
/// New sessions get their first tick next frame, after this frame rendered.
pub fn drive_rect_snaps(
    mut snaps: Query<(Entity, &mut RectSnap)>,
    mut host: BevyCaptureHost,
    settings: Res<SnapSettings>,
    time: Res<Time<Real>>,
    mut failed: MessageWriter<SnapFailed>,
) {
    let now = time.elapsed();

    for (entity, mut snap) in &mut snaps {
        let snap = &mut *snap;
        snap.coordinator.tick(&mut host, now);

        let Some(on_done) = snap.pending.take() else {
            continue;
        };
        if let Err(e) = snap
            .coordinator
            .capture(&host, &snap.config, &settings, on_done)
        {
            failed.write(SnapFailed {
                entity,
                error: e.to_string(),
            });
        }
    }
}

fn publish_snap_results(
    outbox: Res<SnapOutbox>,
    mut taken: MessageWriter<SnapTaken>,
    mut failed: MessageWriter<SnapFailed>,
) {
    while let Ok((entity, result)) = outbox.receiver.try_recv() {
        match result {
            Ok(image) => {
                taken.write(SnapTaken { entity, image });
            }
            Err(e) => {
                failed.write(SnapFailed {
                    entity,
                    error: e.to_string(),
                });
            }
        }
    }
}
