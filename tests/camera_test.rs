use std::f32::consts::FRAC_PI_2;

use anima_ngin::{
    camera::{Camera, CameraSystem, DEFAULT_CAMERA_NAME},
    cgmath::{Matrix4, SquareMatrix, Vector3, Vector4},
    error::RegistryError,
};

fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
    (a - b).x.abs() < 1e-5 && (a - b).y.abs() < 1e-5 && (a - b).z.abs() < 1e-5
}

#[test]
fn view_is_the_inverse_of_the_camera_placement() {
    let mut camera = Camera::new();
    assert_eq!(camera.view(), Matrix4::identity());

    camera.set_position(Vector3::new(0.0, 0.0, 5.0));
    let origin = camera.view() * Vector4::new(0.0, 0.0, 0.0, 1.0);
    assert!(close(origin.truncate(), Vector3::new(0.0, 0.0, -5.0)));

    camera.reset();
    assert_eq!(camera.position(), Vector3::new(0.0, 0.0, 0.0));
    assert_eq!(camera.view(), Matrix4::identity());
}

#[test]
fn movement_follows_the_facing() {
    let mut camera = Camera::new();
    assert!(close(camera.forward(), Vector3::new(0.0, 0.0, -1.0)));
    assert!(close(camera.right(), Vector3::new(1.0, 0.0, 0.0)));

    camera.move_forward(2.0);
    camera.move_up(1.0);
    assert!(close(camera.position(), Vector3::new(0.0, 1.0, -2.0)));

    camera.yaw(FRAC_PI_2);
    assert!(close(camera.forward(), Vector3::new(-1.0, 0.0, 0.0)));
    camera.move_backward(3.0);
    assert!(close(camera.position(), Vector3::new(3.0, 1.0, -2.0)));
}

#[test]
fn pitch_stops_short_of_straight_up() {
    let mut camera = Camera::new();
    camera.pitch(10.0);
    assert!((camera.euler_rotation().x - 1.553_343).abs() < 1e-6);
    camera.pitch(-20.0);
    assert!((camera.euler_rotation().x + 1.553_343).abs() < 1e-6);
}

#[test]
fn cameras_are_reference_counted_by_name() {
    let mut cameras = CameraSystem::new(2).unwrap();
    cameras
        .acquire("overhead")
        .unwrap()
        .set_position(Vector3::new(0.0, 10.0, 0.0));
    cameras.acquire("overhead").unwrap();
    assert_eq!(cameras.count(), 1);
    assert_eq!(
        cameras.get("overhead").unwrap().position(),
        Vector3::new(0.0, 10.0, 0.0)
    );

    assert_eq!(cameras.release("overhead").unwrap(), 1);
    assert_eq!(cameras.release("overhead").unwrap(), 0);
    assert!(cameras.get("overhead").is_none());
    assert!(matches!(cameras.release("overhead"), Err(RegistryError::NotFound(_))));
}

#[test]
fn default_camera_is_always_there() {
    let mut cameras = CameraSystem::new(1).unwrap();
    cameras.acquire(DEFAULT_CAMERA_NAME).unwrap().move_right(1.0);
    assert_eq!(cameras.count(), 0);
    assert_eq!(cameras.release(DEFAULT_CAMERA_NAME).unwrap(), 0);
    assert_eq!(
        cameras.default_camera().position(),
        Vector3::new(1.0, 0.0, 0.0)
    );
}

#[test]
fn camera_system_limits() {
    assert!(CameraSystem::new(0).is_err());

    let mut cameras = CameraSystem::new(1).unwrap();
    assert!(matches!(cameras.acquire(""), Err(RegistryError::EmptyName)));
    cameras.acquire("first").unwrap();
    assert!(matches!(cameras.acquire("second"), Err(RegistryError::Load { .. })));
    // an existing camera can still be acquired when full
    assert!(cameras.acquire("first").is_ok());
}
