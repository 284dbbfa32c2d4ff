use anima_ngin::{
    cgmath::{Deg, Matrix4, Quaternion, Rotation3, SquareMatrix, Vector3, Vector4},
    data_structures::transform::{Transform, Transforms},
    error::TransformError,
};

fn approx_eq(a: Matrix4<f32>, b: Matrix4<f32>) -> bool {
    let a: &[f32; 16] = a.as_ref();
    let b: &[f32; 16] = b.as_ref();
    a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-4)
}

#[test]
fn identity_transform_has_identity_local() {
    let transform = Transform::new();
    assert!(approx_eq(transform.local(), Matrix4::identity()));
}

#[test]
fn local_is_translation_rotation_scale() {
    let rotation = Quaternion::from_angle_z(Deg(90.0));
    let transform = Transform::from_position_rotation_scale(
        Vector3::new(1.0, 2.0, 3.0),
        rotation,
        Vector3::new(2.0, 2.0, 2.0),
    );
    let expected = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0))
        * Matrix4::from(rotation)
        * Matrix4::from_scale(2.0);
    assert!(approx_eq(transform.local(), expected));

    // x axis scaled, rotated onto y, then moved
    let point = transform.local() * Vector4::new(1.0, 0.0, 0.0, 1.0);
    assert!((point.x - 1.0).abs() < 1e-4);
    assert!((point.y - 4.0).abs() < 1e-4);
    assert!((point.z - 3.0).abs() < 1e-4);
}

#[test]
fn local_is_rebuilt_after_mutation() {
    let mut transform = Transform::from_position(Vector3::new(1.0, 0.0, 0.0));
    let before = transform.local();
    transform.translate(Vector3::new(0.0, 5.0, 0.0));
    assert!(transform.is_dirty());
    let after = transform.local();
    assert!(!approx_eq(before, after));
    assert!(approx_eq(
        after,
        Matrix4::from_translation(Vector3::new(1.0, 5.0, 0.0))
    ));
}

#[test]
fn world_applies_parent_after_child() {
    let mut transforms = Transforms::new();
    let parent = transforms.insert(Transform::from_position(Vector3::new(10.0, 0.0, 0.0)));
    let child = transforms.insert(Transform::from_position(Vector3::new(0.0, 1.0, 0.0)));
    transforms.set_parent(child, Some(parent)).unwrap();

    let world = transforms.world(child);
    assert!(approx_eq(
        world,
        Matrix4::from_translation(Vector3::new(10.0, 1.0, 0.0))
    ));
}

#[test]
fn world_reflects_later_parent_changes() {
    let mut transforms = Transforms::new();
    let root = transforms.insert(Transform::new());
    let middle = transforms.insert(Transform::from_position(Vector3::new(0.0, 0.0, 1.0)));
    let leaf = transforms.insert(Transform::from_position(Vector3::new(1.0, 0.0, 0.0)));
    transforms.set_parent(middle, Some(root)).unwrap();
    transforms.set_parent(leaf, Some(middle)).unwrap();

    transforms
        .get_mut(root)
        .unwrap()
        .set_rotation(Quaternion::from_angle_y(Deg(90.0)));

    let expected = transforms.local(root).unwrap()
        * transforms.local(middle).unwrap()
        * transforms.local(leaf).unwrap();
    assert!(approx_eq(transforms.world(leaf), expected));
}

#[test]
fn set_parent_rejects_self_and_cycles() {
    let mut transforms = Transforms::new();
    let a = transforms.insert(Transform::new());
    let b = transforms.insert(Transform::new());
    let c = transforms.insert(Transform::new());

    assert_eq!(transforms.set_parent(a, Some(a)), Err(TransformError::SelfParent));

    transforms.set_parent(b, Some(a)).unwrap();
    transforms.set_parent(c, Some(b)).unwrap();
    assert_eq!(transforms.set_parent(a, Some(c)), Err(TransformError::Cycle));
    assert_eq!(transforms.get(a).unwrap().parent(), None);
}

#[test]
fn removed_parent_turns_children_into_roots() {
    let mut transforms = Transforms::new();
    let parent = transforms.insert(Transform::from_position(Vector3::new(5.0, 0.0, 0.0)));
    let child = transforms.insert(Transform::new());
    transforms.set_parent(child, Some(parent)).unwrap();

    assert!(transforms.remove(parent).is_some());
    assert!(!transforms.contains(parent));
    assert_eq!(transforms.get(child).unwrap().parent(), None);
    assert!(approx_eq(transforms.world(child), Matrix4::identity()));
    assert_eq!(
        transforms.set_parent(child, Some(parent)),
        Err(TransformError::UnknownTransform(parent))
    );
}

#[test]
fn stale_handles_do_not_alias_reused_slots() {
    let mut transforms = Transforms::new();
    let first = transforms.insert(Transform::new());
    transforms.remove(first);
    let second = transforms.insert(Transform::from_position(Vector3::new(1.0, 1.0, 1.0)));

    assert_ne!(first, second);
    assert!(transforms.get(first).is_none());
    assert!(transforms.get(second).is_some());
    assert_eq!(transforms.len(), 1);
}
