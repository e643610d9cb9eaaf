use std::fmt;
use std::str::FromStr;

use arbor_common::Transform;
use glam::{Mat4, Vec3};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("{0:?} is not a camera plane")]
    UnknownPlane(String),
    #[error("plane {plane} does not apply to a {projection} camera")]
    PlaneNotApplicable {
        plane: Plane,
        projection: &'static str,
    },
    #[error("{0:?} is not a camera projection")]
    UnknownProjection(String),
}

/// A named projection parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Fov,
    Aspect,
    Near,
    Far,
    Zoom,
    Left,
    Right,
    Top,
    Bottom,
}

impl Plane {
    pub fn name(self) -> &'static str {
        match self {
            Plane::Fov => "fov",
            Plane::Aspect => "aspect",
            Plane::Near => "near",
            Plane::Far => "far",
            Plane::Zoom => "zoom",
            Plane::Left => "left",
            Plane::Right => "right",
            Plane::Top => "top",
            Plane::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Plane {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fov" => Ok(Plane::Fov),
            "aspect" => Ok(Plane::Aspect),
            "near" => Ok(Plane::Near),
            "far" => Ok(Plane::Far),
            "zoom" => Ok(Plane::Zoom),
            "left" => Ok(Plane::Left),
            "right" => Ok(Plane::Right),
            "top" => Ok(Plane::Top),
            "bottom" => Ok(Plane::Bottom),
            _ => Err(CameraError::UnknownPlane(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// `fov` in degrees.
    Perspective {
        fov: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn name(&self) -> &'static str {
        match self {
            Projection::Perspective { .. } => "perspective",
            Projection::Orthographic { .. } => "orthographic",
        }
    }
}

/// A viewpoint: position transform, look-at target and lazily rebuilt
/// projection.
#[derive(Debug, Clone)]
pub struct Camera {
    pub transform: Transform,
    projection: Projection,
    zoom: f32,
    target: Vec3,
    up: Vec3,
    matrix: Mat4,
    dirty: bool,
    rebuilds: u32,
}

impl Camera {
    pub fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::with_projection(Projection::Perspective {
            fov,
            aspect,
            near,
            far,
        })
    }

    pub fn orthographic(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Self {
        Self::with_projection(Projection::Orthographic {
            left,
            right,
            top,
            bottom,
            near,
            far,
        })
    }

    /// 65 degree perspective from 0.01 to 1000.
    pub fn default_perspective(aspect: f32) -> Self {
        Self::perspective(65.0, aspect, 0.01, 1000.0)
    }

    /// A 4x4 box from 0.01 to 100.
    pub fn default_orthographic() -> Self {
        Self::orthographic(-2.0, 2.0, 2.0, -2.0, 0.01, 100.0)
    }

    fn with_projection(projection: Projection) -> Self {
        Self {
            transform: Transform::default(),
            projection,
            zoom: 1.0,
            target: Vec3::ZERO,
            up: Vec3::Y,
            matrix: Mat4::IDENTITY,
            dirty: true,
            rebuilds: 0,
        }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn plane(&self, plane: Plane) -> Result<f32, CameraError> {
        if plane == Plane::Zoom {
            return Ok(self.zoom);
        }
        let value = match (self.projection, plane) {
            (Projection::Perspective { fov, .. }, Plane::Fov) => fov,
            (Projection::Perspective { aspect, .. }, Plane::Aspect) => aspect,
            (Projection::Perspective { near, .. }, Plane::Near) => near,
            (Projection::Perspective { far, .. }, Plane::Far) => far,
            (Projection::Orthographic { left, .. }, Plane::Left) => left,
            (Projection::Orthographic { right, .. }, Plane::Right) => right,
            (Projection::Orthographic { top, .. }, Plane::Top) => top,
            (Projection::Orthographic { bottom, .. }, Plane::Bottom) => bottom,
            (Projection::Orthographic { near, .. }, Plane::Near) => near,
            (Projection::Orthographic { far, .. }, Plane::Far) => far,
            (p, plane) => {
                return Err(CameraError::PlaneNotApplicable {
                    plane,
                    projection: p.name(),
                });
            }
        };
        Ok(value)
    }

    /// Change one plane and mark the projection for rebuild. Zoom is kept as
    /// its absolute value.
    pub fn set_plane(&mut self, plane: Plane, value: f32) -> Result<(), CameraError> {
        let projection = self.projection.name();
        let slot = match (&mut self.projection, plane) {
            (_, Plane::Zoom) => &mut self.zoom,
            (Projection::Perspective { fov, .. }, Plane::Fov) => fov,
            (Projection::Perspective { aspect, .. }, Plane::Aspect) => aspect,
            (Projection::Perspective { near, .. }, Plane::Near) => near,
            (Projection::Perspective { far, .. }, Plane::Far) => far,
            (Projection::Orthographic { left, .. }, Plane::Left) => left,
            (Projection::Orthographic { right, .. }, Plane::Right) => right,
            (Projection::Orthographic { top, .. }, Plane::Top) => top,
            (Projection::Orthographic { bottom, .. }, Plane::Bottom) => bottom,
            (Projection::Orthographic { near, .. }, Plane::Near) => near,
            (Projection::Orthographic { far, .. }, Plane::Far) => far,
            (_, plane) => return Err(CameraError::PlaneNotApplicable { plane, projection }),
        };
        *slot = if plane == Plane::Zoom { value.abs() } else { value };
        self.dirty = true;
        Ok(())
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// The projection matrix, rebuilt only after a plane changed.
    pub fn projection_matrix(&mut self) -> Mat4 {
        if self.dirty {
            self.matrix = self.build_projection();
            self.dirty = false;
            self.rebuilds += 1;
        }
        self.matrix
    }

    fn build_projection(&self) -> Mat4 {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        match self.projection {
            Projection::Perspective {
                fov,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh_gl((fov / zoom).to_radians(), aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            } => Mat4::orthographic_rh_gl(
                left / zoom,
                right / zoom,
                bottom / zoom,
                top / zoom,
                near,
                far,
            ),
        }
    }

    /// How many times the projection matrix was rebuilt.
    pub fn projection_rebuilds(&self) -> u32 {
        self.rebuilds
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn set_up(&mut self, up: Vec3) {
        self.up = up;
    }

    /// Unit vector from the camera's world position toward its target.
    pub fn direction(&self) -> Vec3 {
        (self.target - self.transform.world_translation()).normalize_or(self.transform.direction)
    }

    /// Rotate the position transform to face the target.
    pub fn orient(&mut self) {
        self.transform.direction = self.direction();
        self.transform.orient();
    }

    pub fn view_matrix(&self) -> Mat4 {
        let eye = self.transform.world_translation();
        let target = if eye.distance_squared(self.target) < f32::EPSILON {
            eye + self.transform.direction
        } else {
            self.target
        };
        Mat4::look_at_rh(eye, target, self.up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planes_parse_case_insensitively() {
        assert_eq!("FOV".parse::<Plane>(), Ok(Plane::Fov));
        assert_eq!("Bottom".parse::<Plane>(), Ok(Plane::Bottom));
        assert_eq!(
            "depth".parse::<Plane>(),
            Err(CameraError::UnknownPlane("depth".into()))
        );
    }

    #[test]
    fn projection_rebuilt_only_when_dirty() {
        let mut c = Camera::default_perspective(1.5);
        let a = c.projection_matrix();
        let b = c.projection_matrix();
        assert_eq!(a, b);
        assert_eq!(c.projection_rebuilds(), 1);
        c.set_plane(Plane::Near, 0.1).unwrap();
        let d = c.projection_matrix();
        assert_eq!(c.projection_rebuilds(), 2);
        assert_eq!(d, Mat4::perspective_rh_gl(65f32.to_radians(), 1.5, 0.1, 1000.0));
    }

    #[test]
    fn zoom_is_absolute_and_divides_planes() {
        let mut c = Camera::default_orthographic();
        c.set_plane(Plane::Zoom, -2.0).unwrap();
        assert_eq!(c.zoom(), 2.0);
        assert_eq!(
            c.projection_matrix(),
            Mat4::orthographic_rh_gl(-1.0, 1.0, -1.0, 1.0, 0.01, 100.0)
        );
    }

    #[test]
    fn perspective_zoom_narrows_fov() {
        let mut c = Camera::perspective(60.0, 1.0, 1.0, 10.0);
        c.set_plane(Plane::Zoom, 2.0).unwrap();
        assert_eq!(
            c.projection_matrix(),
            Mat4::perspective_rh_gl(30f32.to_radians(), 1.0, 1.0, 10.0)
        );
    }

    #[test]
    fn plane_must_match_projection() {
        let mut c = Camera::default_perspective(1.0);
        assert_eq!(
            c.set_plane(Plane::Left, 1.0),
            Err(CameraError::PlaneNotApplicable {
                plane: Plane::Left,
                projection: "perspective"
            })
        );
        assert!(c.plane(Plane::Top).is_err());
        assert_eq!(c.plane(Plane::Fov), Ok(65.0));
    }

    #[test]
    fn view_looks_from_world_position_at_target() {
        let mut c = Camera::default_perspective(1.0);
        c.transform.translate = Vec3::new(0.0, 0.0, 5.0);
        c.transform.update_matrix_world(&Mat4::IDENTITY);
        assert_eq!(
            c.view_matrix(),
            Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y)
        );
        assert_eq!(c.direction(), Vec3::NEG_Z);
    }

    #[test]
    fn orient_faces_target() {
        let mut c = Camera::default_perspective(1.0);
        c.transform.translate = Vec3::new(5.0, 0.0, 0.0);
        c.transform.update_matrix_world(&Mat4::IDENTITY);
        c.orient();
        let facing = c.transform.rotation * Vec3::NEG_Z;
        assert!(facing.abs_diff_eq(Vec3::NEG_X, 1e-5));
    }
}
