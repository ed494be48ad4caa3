use glam::{Mat4, Vec4};

use crate::state_error::StateError;

/// 投影
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lens {
    pub projection: Mat4,
}

impl Lens {
    pub fn perspective(fov_y_radians: f32, aspect: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            projection: Mat4::perspective_rh(fov_y_radians, aspect, z_near, z_far),
        }
    }

    /// 投影矩阵必须有限且可逆
    pub fn validate(&self) -> Result<(), StateError> {
        if !self.projection.is_finite() {
            return Err(StateError::InvalidScene("lens projection is not finite"));
        }
        if self.projection.determinant().abs() <= f32::EPSILON * f32::EPSILON {
            return Err(StateError::InvalidScene("lens projection is singular"));
        }
        Ok(())
    }
}

/// 一次 scene 的描述：相机与投影
#[derive(Clone, Debug, PartialEq)]
pub struct SceneSetup {
    pub lens: Option<Lens>,
    pub camera_transform: Mat4,
    pub clear_color: Vec4,
}

impl SceneSetup {
    pub fn new(lens: Lens) -> Self {
        Self {
            lens: Some(lens),
            camera_transform: Mat4::IDENTITY,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
        }
    }

    pub fn lens(&self) -> Result<&Lens, StateError> {
        let lens = self.lens.as_ref().ok_or(StateError::InvalidScene("scene has no lens"))?;
        lens.validate()?;
        Ok(lens)
    }
}
