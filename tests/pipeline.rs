//! End-to-end: device session or marker fallback, through compose, into the renderer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use nalgebra::{UnitQuaternion, Vector3};
use parking_lot::Mutex;

use spatial_anchor::compose::{compose, ComposeScales, ModelConfig};
use spatial_anchor::config::AnchorConfig;
use spatial_anchor::geometry::{EulerAngles, PerspectiveCamera, Pose};
use spatial_anchor::marker::{
    MarkerConfig, MarkerDetection, MarkerScanner, QrDetectionResult, QrPoseEstimator,
};
use spatial_anchor::render::{FrameClock, MeshHandle, RenderCommand, Renderer, SharedModelConfig};
use spatial_anchor::session::{SessionState, TrackingImage, Visibility};
use spatial_anchor::sim::{ScriptedDetector, SimCameraFeed, SimDevice};
use spatial_anchor::system::AnchorSystem;
use spatial_anchor::tracking::{TrackingState, TrackingStore};

/// Renderer whose log outlives the system that owns it.
#[derive(Clone, Default)]
struct SharedRenderer {
    commands: Arc<Mutex<Vec<RenderCommand>>>,
    reinits: Arc<Mutex<usize>>,
}

impl Renderer for SharedRenderer {
    fn render(&mut self, command: RenderCommand) {
        self.commands.lock().push(command);
    }

    fn reinitialize(&mut self) {
        *self.reinits.lock() += 1;
    }
}

fn image() -> TrackingImage {
    TrackingImage::new(2, 2, vec![255u8; 16])
}

fn camera() -> PerspectiveCamera {
    PerspectiveCamera::new(Pose::identity(), 70.0, 480.0 / 360.0, 0.01, 100.0)
}

#[test]
fn test_position_scale_arithmetic() {
    let tracking = TrackingState::tracked(&Pose::identity());
    let config = ModelConfig {
        position: Vector3::new(1.0, 0.0, 0.0),
        rotation: EulerAngles::zero(),
        scale: Vector3::new(0.01, 0.01, 0.01),
    };
    let t = compose(&tracking, &config, &ComposeScales::default());
    assert_relative_eq!(t.position.x, 0.1, epsilon = 1e-12);
}

#[test]
fn test_untracked_rest_pose_for_any_config() {
    let tracking = TrackingState::untracked();
    for (i, scale) in [1.0, 250.0, 1000.0].into_iter().enumerate() {
        let config = ModelConfig {
            position: Vector3::new(i as f64, -3.0, 7.0),
            rotation: EulerAngles::new(0.2 * i as f64, 0.5, -0.1),
            scale: Vector3::new(scale, scale, scale),
        };
        let t = compose(&tracking, &config, &ComposeScales::default());
        assert_eq!(t.position, Vector3::zeros());
        assert_relative_eq!(
            t.orientation.angle_to(&config.rotation.to_quaternion()),
            0.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(t.scale.x, scale * 0.001, epsilon = 1e-12);
    }
}

#[test]
fn test_marker_reference_square() {
    let estimator = QrPoseEstimator::new(MarkerConfig::default());
    let detection = QrDetectionResult::new(
        MarkerDetection::new(
            [
                nalgebra::Vector2::new(10.0, 10.0),
                nalgebra::Vector2::new(110.0, 10.0),
                nalgebra::Vector2::new(110.0, 110.0),
                nalgebra::Vector2::new(10.0, 110.0),
            ],
            "anchor",
        ),
        Instant::now(),
    );
    let cam = camera();

    let first = estimator.estimate_raw(&detection, &cam, 480.0, 360.0).unwrap();
    let second = estimator.estimate_raw(&detection, &cam, 480.0, 360.0).unwrap();

    assert!(first.distance_m.is_finite() && first.distance_m > 0.0);
    assert_eq!(first, second);
    // in front of the camera, which looks down -Z
    let direction = first.pose.position.normalize();
    assert!(direction.dot(&cam.forward()) > 0.5);
}

#[test]
fn test_smoothed_position_never_teleports() {
    let config = MarkerConfig::default();
    let smoothing = config.smoothing;
    let mut estimator = QrPoseEstimator::new(config);
    let cam = camera();
    let store = TrackingStore::new();

    // Alternate a near and far marker to provoke large raw jumps.
    let mut previous: Option<Vector3<f64>> = None;
    for i in 0..12 {
        let size = if i % 2 == 0 { 40.0 } else { 160.0 };
        let detection = QrDetectionResult::new(
            MarkerDetection::square(240.0 - size / 2.0, 180.0 - size / 2.0, size, "anchor"),
            Instant::now(),
        );
        let raw = estimator.estimate_raw(&detection, &cam, 480.0, 360.0).unwrap();
        let published = estimator
            .process(&detection, &cam, 480.0, 360.0, &store)
            .unwrap();

        if let Some(prev) = previous {
            let step = (published.position - prev).norm();
            let bound = smoothing * (raw.pose.position - prev).norm();
            assert!(step <= bound + 1e-9, "step {} exceeds bound {}", step, bound);
        }
        previous = Some(published.position);
    }
    assert!(store.snapshot().is_tracking);
}

#[test]
fn test_session_drives_renderer_then_reinitializes() {
    let device = SimDevice::new();
    let renderer = SharedRenderer::default();
    let model = SharedModelConfig::new(ModelConfig {
        position: Vector3::new(1.0, 0.0, 0.0),
        rotation: EulerAngles::zero(),
        scale: Vector3::new(1000.0, 1000.0, 1000.0),
    });
    let mut system = AnchorSystem::new(
        device.clone(),
        renderer.clone(),
        model.clone(),
        &AnchorConfig::default(),
    );
    system.set_mesh(Some(MeshHandle(3)));

    let started = system.start_session(Some(&image())).unwrap();
    assert_eq!(started.poll().settled(), Some(Ok(())));

    let pose = Pose::new(Vector3::new(0.0, 0.0, -1.0), UnitQuaternion::identity());
    for _ in 0..3 {
        let frame = device.frame_with_pose(pose).unwrap();
        system.on_device_frame(&frame);
    }

    {
        let commands = renderer.commands.lock();
        assert_eq!(commands.len(), 3);
        for command in commands.iter() {
            assert!(matches!(command.clock, FrameClock::Device { .. }));
            assert_eq!(command.mesh, MeshHandle(3));
            assert_relative_eq!(
                command.transform.position,
                Vector3::new(0.1, 0.0, -1.0),
                epsilon = 1e-12
            );
            assert_relative_eq!(command.transform.scale, Vector3::new(1.0, 1.0, 1.0));
        }
    }

    system.on_visibility_change(Visibility::Hidden);
    assert_eq!(system.session_state(), SessionState::Idle);
    assert!(!system.store().snapshot().is_tracking);
    assert_eq!(*renderer.reinits.lock(), 1);

    // Back on the animation clock, at rest.
    let transform = system.on_animation_tick(Instant::now()).unwrap();
    assert_eq!(transform.position, Vector3::zeros());
    assert!(matches!(
        renderer.commands.lock().last().unwrap().clock,
        FrameClock::Animation { .. }
    ));
}

#[test]
fn test_marker_fallback_feeds_renderer_when_idle() {
    let renderer = SharedRenderer::default();
    let detector =
        ScriptedDetector::always(Some(MarkerDetection::square(190.0, 130.0, 100.0, "anchor")));
    let scanner = MarkerScanner::new(
        Box::new(SimCameraFeed::new()),
        Box::new(detector),
        MarkerConfig::default(),
    );
    let mut system = AnchorSystem::new(
        SimDevice::new(),
        renderer.clone(),
        ModelConfig::default(),
        &AnchorConfig::default(),
    )
    .with_scanner(scanner);
    system.set_mesh(Some(MeshHandle(1)));

    let t0 = Instant::now();
    let first = system.on_animation_tick(t0).unwrap();
    assert!(system.store().snapshot().is_tracking);
    assert!(first.position.z < 0.0);

    // Throttled: the next scan waits for the interval, rendering does not.
    let before = system.store().snapshot();
    system.on_animation_tick(t0 + Duration::from_millis(16));
    assert_eq!(system.store().snapshot(), before);
    assert_eq!(renderer.commands.lock().len(), 2);
}

#[test]
fn test_camera_denied_fallback_stays_quiet() {
    let renderer = SharedRenderer::default();
    let feed = SimCameraFeed::new().with_permission(false);
    let opens = feed.open_calls();
    let scanner = MarkerScanner::new(
        Box::new(feed),
        Box::new(ScriptedDetector::always(None)),
        MarkerConfig::default(),
    );
    let mut system = AnchorSystem::new(
        SimDevice::new(),
        renderer,
        ModelConfig::default(),
        &AnchorConfig::default(),
    )
    .with_scanner(scanner);

    let t0 = Instant::now();
    for s in 0..5 {
        system.on_animation_tick(t0 + Duration::from_secs(s));
    }
    assert_eq!(opens.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(!system.store().snapshot().is_tracking);
}
