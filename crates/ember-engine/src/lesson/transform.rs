use glam::{Mat4, Vec3};

/// Vertical field of view of every lesson camera.
pub const FOV_Y_DEGREES: f32 = 45.0;
pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 1000.0;

/// Distance the model is pushed away from the camera.
pub const MODEL_DEPTH: f32 = -3.5;

/// Model-view-projection of the spinning model at `elapsed` seconds.
///
/// The model turns about (1, 1, 1) at one radian per second and sits at
/// `MODEL_DEPTH` in front of a camera at the origin. Depth maps to [0, 1].
pub fn model_view_projection(elapsed: f32, aspect: f32) -> Mat4 {
    let model = Mat4::from_translation(Vec3::new(0.0, 0.0, MODEL_DEPTH))
        * Mat4::from_axis_angle(Vec3::ONE.normalize(), elapsed);
    let projection = Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR);
    projection * model
}
