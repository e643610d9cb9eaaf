//! Procedural geometry.

use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::geometry::{Attribute, Geometry, VertexBuffer};

/// Parameters of a UV sphere. Angles are in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereParams {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub phi_start: f32,
    pub phi_length: f32,
    pub theta_start: f32,
    pub theta_length: f32,
}

impl Default for SphereParams {
    fn default() -> Self {
        Self {
            radius: 1.0,
            width_segments: 16,
            height_segments: 12,
            phi_start: 0.0,
            phi_length: 2.0 * PI,
            theta_start: 0.0,
            theta_length: PI,
        }
    }
}

impl SphereParams {
    pub fn with_radius(radius: f32) -> Self {
        Self {
            radius,
            ..Self::default()
        }
    }
}

/// Indexed UV sphere with positions, normals and texture coordinates in
/// separate buffers. Degenerate triangles at closed poles are skipped.
pub fn sphere(p: &SphereParams) -> Geometry {
    let width = p.width_segments.max(3);
    let height = p.height_segments.max(2);
    let theta_end = p.theta_start + p.theta_length;

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut grid: Vec<Vec<u32>> = Vec::with_capacity(height as usize + 1);
    let mut next = 0u32;

    for y in 0..=height {
        let v = y as f32 / height as f32;
        let theta = p.theta_start + v * p.theta_length;
        let mut row = Vec::with_capacity(width as usize + 1);
        for x in 0..=width {
            let u = x as f32 / width as f32;
            let phi = p.phi_start + u * p.phi_length;
            let pos = Vec3::new(
                -p.radius * phi.cos() * theta.sin(),
                p.radius * theta.cos(),
                p.radius * phi.sin() * theta.sin(),
            );
            let uv = Vec2::new(u, 1.0 - v);
            positions.extend_from_slice(&pos.to_array());
            normals.extend_from_slice(&pos.normalize_or_zero().to_array());
            uvs.extend_from_slice(&uv.to_array());
            row.push(next);
            next += 1;
        }
        grid.push(row);
    }

    let mut indices = Vec::new();
    for y in 0..height as usize {
        for x in 0..width as usize {
            let v1 = grid[y][x + 1];
            let v2 = grid[y][x];
            let v3 = grid[y + 1][x];
            let v4 = grid[y + 1][x + 1];
            if y != 0 || p.theta_start > 0.0 {
                indices.extend_from_slice(&[v1, v2, v4]);
            }
            if y != height as usize - 1 || theta_end < PI {
                indices.extend_from_slice(&[v2, v3, v4]);
            }
        }
    }

    let count = indices.len() as u32;
    let mut g = Geometry::new();
    g.add_buffer(VertexBuffer::with_data(
        vec![Attribute::new("VertexPosition", 3)],
        positions,
    ))
    .add_buffer(VertexBuffer::with_data(
        vec![Attribute::new("VertexNormal", 3)],
        normals,
    ))
    .add_buffer(VertexBuffer::with_data(
        vec![Attribute::new("VertexTexcoord", 2)],
        uvs,
    ))
    .add_group(0, count, 0);
    g.set_indices(indices);
    g
}

/// Three colored line segments along +X (red), +Y (green) and +Z (blue).
/// Drawn as lines without indices.
pub fn axis(size: f32) -> Geometry {
    #[rustfmt::skip]
    let data = vec![
        0.0, 0.0, 0.0,   1.0, 0.0, 0.0,
        size, 0.0, 0.0,  1.0, 0.0, 0.0,
        0.0, 0.0, 0.0,   0.0, 1.0, 0.0,
        0.0, size, 0.0,  0.0, 1.0, 0.0,
        0.0, 0.0, 0.0,   0.0, 0.0, 1.0,
        0.0, 0.0, size,  0.0, 0.0, 1.0,
    ];
    let mut g = Geometry::new();
    g.add_buffer(VertexBuffer::with_data(
        vec![
            Attribute::new("VertexPosition", 3),
            Attribute::new("VertexColor", 3),
        ],
        data,
    ))
    .add_group(0, 6, 0);
    g
}
