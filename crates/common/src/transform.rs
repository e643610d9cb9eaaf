use glam::{Mat3, Mat4, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Default facing of an unrotated node.
pub const FORWARD: Vec3 = Vec3::NEG_Z;

/// Per-node spatial state.
///
/// `local` is rebuilt by [`Transform::update_matrix`]; `world` is only
/// meaningful right after [`Transform::update_matrix_world`] ran during a
/// traversal visit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translate: Vec3,
    pub scale: Vec3,
    pub rotation: Quat,
    pub direction: Vec3,
    #[serde(skip, default = "identity")]
    local: Mat4,
    #[serde(skip, default = "identity")]
    world: Mat4,
}

fn identity() -> Mat4 {
    Mat4::IDENTITY
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translate: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Quat::IDENTITY,
            direction: FORWARD,
            local: Mat4::IDENTITY,
            world: Mat4::IDENTITY,
        }
    }
}

impl Transform {
    pub fn from_translation(translate: Vec3) -> Self {
        Self {
            translate,
            ..Self::default()
        }
    }

    pub fn from_scale(scale: Vec3) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::default()
        }
    }

    /// Rebuild the local matrix from translate, rotation and scale.
    pub fn update_matrix(&mut self) -> Mat4 {
        self.local = compose(self.translate, self.rotation, self.scale);
        self.local
    }

    /// Rebuild the local matrix and compose it against the parent's world matrix.
    pub fn update_matrix_world(&mut self, parent: &Mat4) -> Mat4 {
        self.update_matrix();
        self.world = *parent * self.local;
        self.world
    }

    /// Compose the cached local matrix against `parent` without rebuilding it.
    pub fn compose_world(&mut self, parent: &Mat4) -> Mat4 {
        self.world = *parent * self.local;
        self.world
    }

    pub fn local(&self) -> &Mat4 {
        &self.local
    }

    pub fn world(&self) -> &Mat4 {
        &self.world
    }

    pub fn world_translation(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    /// Point the rotation from the default forward axis to `direction`.
    pub fn orient(&mut self) {
        let dir = self.direction.normalize_or_zero();
        if dir != Vec3::ZERO {
            self.rotation = Quat::from_rotation_arc(FORWARD, dir);
        }
    }

    /// Replace translate, rotation and scale with the decomposition of `m`.
    pub fn set_from_matrix(&mut self, m: &Mat4) {
        let (translate, rotation, scale) = decompose(m);
        self.translate = translate;
        self.rotation = rotation;
        self.scale = scale;
    }
}

/// Compose translation, rotation and scale into one affine matrix.
///
/// Translation lands in the last column, the quaternion expands into the
/// upper 3x3 and each basis column is multiplied by its scale component.
pub fn compose(translate: Vec3, rotation: Quat, scale: Vec3) -> Mat4 {
    let (x, y, z, w) = (rotation.x, rotation.y, rotation.z, rotation.w);
    let (x2, y2, z2) = (x + x, y + y, z + z);
    let (xx, xy, xz) = (x * x2, x * y2, x * z2);
    let (yy, yz, zz) = (y * y2, y * z2, z * z2);
    let (wx, wy, wz) = (w * x2, w * y2, w * z2);

    Mat4::from_cols(
        Vec4::new(1.0 - (yy + zz), xy + wz, xz - wy, 0.0) * scale.x,
        Vec4::new(xy - wz, 1.0 - (xx + zz), yz + wx, 0.0) * scale.y,
        Vec4::new(xz + wy, yz - wx, 1.0 - (xx + yy), 0.0) * scale.z,
        translate.extend(1.0),
    )
}

/// Split an affine matrix into translation, rotation and scale.
///
/// A negative determinant is attributed to the x axis.
pub fn decompose(m: &Mat4) -> (Vec3, Quat, Vec3) {
    let mut sx = m.x_axis.truncate().length();
    let sy = m.y_axis.truncate().length();
    let sz = m.z_axis.truncate().length();
    if m.determinant() < 0.0 {
        sx = -sx;
    }

    let translate = m.w_axis.truncate();
    let inv = |s: f32| if s == 0.0 { 0.0 } else { 1.0 / s };
    let basis = Mat3::from_cols(
        m.x_axis.truncate() * inv(sx),
        m.y_axis.truncate() * inv(sy),
        m.z_axis.truncate() * inv(sz),
    );

    (translate, rotation_from_matrix(&basis), Vec3::new(sx, sy, sz))
}

/// Quaternion from a pure rotation matrix using trace-based extraction.
pub fn rotation_from_matrix(m: &Mat3) -> Quat {
    // mRC: row R, column C
    let (m11, m12, m13) = (m.x_axis.x, m.y_axis.x, m.z_axis.x);
    let (m21, m22, m23) = (m.x_axis.y, m.y_axis.y, m.z_axis.y);
    let (m31, m32, m33) = (m.x_axis.z, m.y_axis.z, m.z_axis.z);
    let trace = m11 + m22 + m33;

    let q = if trace > 0.0 {
        let s = 0.5 / (trace + 1.0).sqrt();
        Quat::from_xyzw((m32 - m23) * s, (m13 - m31) * s, (m21 - m12) * s, 0.25 / s)
    } else if m11 > m22 && m11 > m33 {
        let s = 2.0 * (1.0 + m11 - m22 - m33).sqrt();
        Quat::from_xyzw(0.25 * s, (m12 + m21) / s, (m13 + m31) / s, (m32 - m23) / s)
    } else if m22 > m33 {
        let s = 2.0 * (1.0 + m22 - m11 - m33).sqrt();
        Quat::from_xyzw((m12 + m21) / s, 0.25 * s, (m23 + m32) / s, (m13 - m31) / s)
    } else {
        let s = 2.0 * (1.0 + m33 - m11 - m22).sqrt();
        Quat::from_xyzw((m13 + m31) / s, (m23 + m32) / s, 0.25 * s, (m21 - m12) / s)
    };
    q.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn close(a: &Mat4, b: &Mat4) -> bool {
        a.abs_diff_eq(*b, 1e-5)
    }

    #[test]
    fn compose_matches_glam() {
        let t = Vec3::new(1.0, -2.0, 3.0);
        let r = Quat::from_euler(glam::EulerRot::XYZ, 0.3, -1.1, 0.7);
        let s = Vec3::new(2.0, 0.5, 1.5);
        let ours = compose(t, r, s);
        let theirs = Mat4::from_scale_rotation_translation(s, r, t);
        assert!(close(&ours, &theirs));
    }

    #[test]
    fn decompose_recovers_parts() {
        let t = Vec3::new(4.0, 5.0, 6.0);
        let r = Quat::from_rotation_y(FRAC_PI_2);
        let s = Vec3::new(1.0, 2.0, 3.0);
        let (dt, dr, ds) = decompose(&compose(t, r, s));
        assert!(dt.abs_diff_eq(t, 1e-5));
        assert!(ds.abs_diff_eq(s, 1e-5));
        assert!(dr.dot(r).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn decompose_mirrored_flips_x_scale() {
        let m = compose(Vec3::ZERO, Quat::IDENTITY, Vec3::new(-2.0, 1.0, 1.0));
        let (_, _, s) = decompose(&m);
        assert!((s.x + 2.0).abs() < 1e-5);
        assert!((s.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn rotation_extraction_covers_every_branch() {
        let cases = [
            Quat::IDENTITY,
            Quat::from_rotation_x(3.0),
            Quat::from_rotation_y(3.0),
            Quat::from_rotation_z(3.0),
        ];
        for q in cases {
            let got = rotation_from_matrix(&Mat3::from_quat(q));
            assert!(got.dot(q).abs() > 1.0 - 1e-5, "{q:?} -> {got:?}");
        }
    }

    #[test]
    fn world_composes_against_parent() {
        let mut parent = Transform::from_translation(Vec3::new(0.0, 2.0, 0.0));
        let mut child = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let pw = parent.update_matrix_world(&Mat4::IDENTITY);
        child.update_matrix_world(&pw);
        assert!(child.world_translation().abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
    }

    #[test]
    fn orient_points_forward_axis_at_direction() {
        let mut t = Transform {
            direction: Vec3::X,
            ..Transform::default()
        };
        t.orient();
        assert!((t.rotation * FORWARD).abs_diff_eq(Vec3::X, 1e-5));
    }
}
