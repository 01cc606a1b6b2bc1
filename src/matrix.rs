//! Column-major 4x4 matrix helpers.
//!
//! Matrices are stored as `[column][row]`, the layout WGSL expects for
//! `mat4x4<f32>` uniforms. Every `translate`/`rotate_z`/`scale` post-multiplies,
//! so `scale(rotate_z(translate(I, t), a), s)` yields `T * R * S`.

pub type Mat4 = [[f32; 4]; 4];

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

pub fn identity() -> Mat4 {
    IDENTITY
}

/// Returns `a * b`.
pub fn multiply(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0f32; 4]; 4];
    for (col, out_col) in out.iter_mut().enumerate() {
        for (row, cell) in out_col.iter_mut().enumerate() {
            *cell = (0..4).map(|k| a[k][row] * b[col][k]).sum();
        }
    }
    out
}

pub fn translate(m: &Mat4, v: [f32; 3]) -> Mat4 {
    let mut t = IDENTITY;
    t[3][0] = v[0];
    t[3][1] = v[1];
    t[3][2] = v[2];
    multiply(m, &t)
}

/// Rotation about Z by `angle` radians, counter-clockwise with +Y up.
pub fn rotate_z(m: &Mat4, angle: f32) -> Mat4 {
    let (s, c) = angle.sin_cos();
    let mut r = IDENTITY;
    r[0][0] = c;
    r[0][1] = s;
    r[1][0] = -s;
    r[1][1] = c;
    multiply(m, &r)
}

pub fn scale(m: &Mat4, v: [f32; 3]) -> Mat4 {
    let mut s = IDENTITY;
    s[0][0] = v[0];
    s[1][1] = v[1];
    s[2][2] = v[2];
    multiply(m, &s)
}

/// Orthographic projection mapping the box onto clip space.
///
/// `z = 0` lands on clip-space depth 0 for the usual `near = -1, far = 1`.
pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let mut m = [[0.0f32; 4]; 4];
    m[0][0] = 2.0 / (right - left);
    m[1][1] = 2.0 / (top - bottom);
    m[2][2] = 2.0 / (near - far);
    m[3][0] = (right + left) / (left - right);
    m[3][1] = (top + bottom) / (bottom - top);
    m[3][2] = (far + near) / (near - far);
    m[3][3] = 1.0;
    m
}

/// Transforms a point (w = 1) and performs the perspective divide.
pub fn transform_point(m: &Mat4, p: [f32; 3]) -> [f32; 3] {
    let mut out = [0.0f32; 4];
    for (row, cell) in out.iter_mut().enumerate() {
        *cell = m[0][row] * p[0] + m[1][row] * p[1] + m[2][row] * p[2] + m[3][row];
    }
    let w = if out[3] == 0.0 { 1.0 } else { out[3] };
    [out[0] / w, out[1] / w, out[2] / w]
}
