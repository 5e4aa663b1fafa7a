use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::info;

use spatial_anchor::compose::ModelConfig;
use spatial_anchor::config::AnchorConfig;
use spatial_anchor::geometry::{EulerAngles, Pose};
use spatial_anchor::marker::{MarkerDetection, MarkerScanner};
use spatial_anchor::render::{MeshHandle, RenderCommand, Renderer, SharedModelConfig};
use spatial_anchor::session::{FrameOutcome, TrackingImage, Visibility};
use spatial_anchor::sim::{ScriptedDetector, SimCameraFeed, SimDevice};
use spatial_anchor::system::AnchorSystem;

/// Number of device frames replayed in the simulated session.
const SESSION_FRAMES: usize = 120;

/// Renderer that logs every tenth command.
#[derive(Default)]
struct LogRenderer {
    frames: u64,
}

impl Renderer for LogRenderer {
    fn render(&mut self, command: RenderCommand) {
        if self.frames % 10 == 0 {
            let p = command.transform.position;
            info!(
                "frame {:>4} {:?}: model at [{:.3}, {:.3}, {:.3}]",
                self.frames, command.clock, p.x, p.y, p.z
            );
        }
        self.frames += 1;
    }

    fn reinitialize(&mut self) {
        info!("render context reinitialized after {} frames", self.frames);
    }
}

/// Marker drifting along a slow circle in front of the viewer.
fn scripted_pose(i: usize) -> Pose {
    let t = i as f64 / SESSION_FRAMES as f64 * std::f64::consts::TAU;
    Pose::new(
        Vector3::new(0.2 * t.cos(), 0.0, -1.0 + 0.2 * t.sin()),
        UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.1 * t.sin()),
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spatial_anchor=info".parse()?),
        )
        .init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => AnchorConfig::load(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AnchorConfig::load_default().context("loading default config")?,
    };
    info!("config: {:?}", config);

    let device = SimDevice::new();
    let model = SharedModelConfig::new(ModelConfig {
        position: Vector3::new(0.5, 0.0, 0.0),
        rotation: EulerAngles::from_degrees(0.0, 45.0, 0.0),
        scale: Vector3::new(100.0, 100.0, 100.0),
    });
    let scanner = MarkerScanner::new(
        Box::new(SimCameraFeed::new()),
        Box::new(ScriptedDetector::always(Some(MarkerDetection::square(
            190.0, 130.0, 100.0, "anchor",
        )))),
        config.marker.clone(),
    );

    let mut system = AnchorSystem::new(device.clone(), LogRenderer::default(), model.clone(), &config)
        .with_scanner(scanner);
    system.set_mesh(Some(MeshHandle(1)));

    // Device session replay.
    let image = TrackingImage::new(2, 2, vec![255u8; 16]);
    let started = system.start_session(Some(&image))?;
    system.poll();
    if let Some(Err(e)) = started.poll().settled() {
        anyhow::bail!("session failed: {}", e.user_message());
    }

    let mut published = 0;
    for i in 0..SESSION_FRAMES {
        if i == SESSION_FRAMES / 2 {
            model.update(|m| m.rotation = EulerAngles::from_degrees(0.0, 90.0, 0.0));
        }
        // Every 15th frame the image is out of view.
        let frame = if i % 15 == 14 {
            device.frame(Vec::new())
        } else {
            device.frame_with_pose(scripted_pose(i))
        };
        let Some(frame) = frame else {
            break;
        };
        if let FrameOutcome::Published(_) = system.on_device_frame(&frame) {
            published += 1;
        }
    }
    info!("{} of {} frames published a pose", published, SESSION_FRAMES);

    system.on_visibility_change(Visibility::Hidden);
    info!("session state after hide: {}", system.session_state());

    // Marker fallback on the animation clock.
    let t0 = Instant::now();
    for second in 0..3u64 {
        system.on_animation_tick(t0 + Duration::from_secs(second));
        let state = system.store().snapshot();
        info!(
            "fallback tick {}: tracking={} position=[{:.3}, {:.3}, {:.3}]",
            second, state.is_tracking, state.position.x, state.position.y, state.position.z
        );
    }

    system.shutdown();
    Ok(())
}
