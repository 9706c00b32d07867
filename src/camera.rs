use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::grid::{GridLayout, GRID_SIZE};

pub const FIELD_OF_VIEW_DEG: f32 = 10.0;
pub const Z_NEAR: f32 = 1.0;
pub const Z_FAR: f32 = 6.0;
/// Distance the grid is pushed away from the eye.
pub const ZOOM: f32 = 6.0;

// The projection below produces GL clip depth (-w..w); wgpu clips on 0..w.
#[rustfmt::skip]
const GL_TO_WGPU_DEPTH: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
]);

/// Perspective projection in column-major order. The x and y focal terms are
/// halved, so the grid occupies the middle of the canvas.
#[rustfmt::skip]
pub fn projection(fov_deg: f32, aspect: f32, z_near: f32, z_far: f32) -> Mat4 {
    let ang = (fov_deg * 0.5).to_radians().tan();
    let depth = z_far - z_near;
    Mat4::from_cols_array(&[
        0.5 / ang, 0.0, 0.0, 0.0,
        0.0, 0.5 * aspect / ang, 0.0, 0.0,
        0.0, 0.0, -(z_far + z_near) / depth, -1.0,
        0.0, 0.0, (-2.0 * z_far * z_near) / depth, 0.0,
    ])
}

/// Vertical scale that maps the grid's row band onto the full clip height.
pub fn view_scale(rows: u32) -> f32 {
    let full_row_step = 2.0 / rows as f32;
    let row_step = GRID_SIZE / rows as f32;
    1.0 / (row_step * rows as f32 / full_row_step)
}

#[rustfmt::skip]
pub fn view(rows: u32) -> Mat4 {
    let scale = view_scale(rows);
    Mat4::from_cols_array(&[
        1.0, 0.0, 0.0, 0.0,
        0.0, scale, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, -ZOOM, 1.0,
    ])
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    pub projection: Mat4,
    pub view: Mat4,
    pub model: Mat4,
}

impl Camera {
    pub fn new(aspect: f32, layout: &GridLayout) -> Self {
        Camera {
            projection: projection(FIELD_OF_VIEW_DEG, aspect, Z_NEAR, Z_FAR),
            view: view(layout.rows()),
            model: Mat4::IDENTITY,
        }
    }

    pub fn for_surface(width: u32, height: u32, layout: &GridLayout) -> Self {
        Self::new(width.max(1) as f32 / height.max(1) as f32, layout)
    }

    pub fn to_uniform(&self) -> TransformsUniform {
        TransformsUniform {
            projection: (GL_TO_WGPU_DEPTH * self.projection).to_cols_array_2d(),
            view: self.view.to_cols_array_2d(),
            model: self.model.to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct TransformsUniform {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
}

// Compile-time size check against the WGSL `Transforms` struct.
const _: [(); 192] = [(); std::mem::size_of::<TransformsUniform>()];

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn close(a: f32, b: f32) -> bool { (a - b).abs() < 1e-5 }

    #[test]
    fn projection_terms() {
        let p = projection(10.0, 2.0, 1.0, 6.0);
        let ang = 5.0f32.to_radians().tan();
        assert!(close(p.x_axis.x, 0.5 / ang));
        assert!(close(p.y_axis.y, 1.0 / ang));
        assert!(close(p.z_axis.z, -7.0 / 5.0));
        assert_eq!(p.z_axis.w, -1.0);
        assert!(close(p.w_axis.z, -12.0 / 5.0));
        assert_eq!(p.w_axis.w, 0.0);
    }

    #[test]
    fn projection_ignores_grid_dimensions() {
        let short = Camera::new(1.5, &GridLayout::new(1).unwrap());
        let long = Camera::new(1.5, &GridLayout::new(365).unwrap());
        assert_eq!(short.projection, long.projection);
    }

    #[test]
    fn view_scale_depends_only_on_constants() {
        let short = Camera::new(1.0, &GridLayout::new(2).unwrap());
        let long = Camera::new(3.0, &GridLayout::new(400).unwrap());
        assert_eq!(short.view, long.view);
        assert!(close(short.view.y_axis.y, 2.0 / 9.0));
        assert_eq!(short.view.w_axis.z, -ZOOM);
        assert_eq!(short.model, Mat4::IDENTITY);
    }

    #[test]
    fn grid_lands_inside_wgpu_clip_volume() {
        let layout = GridLayout::new(30).unwrap();
        let camera = Camera::for_surface(800, 400, &layout);
        let u = camera.to_uniform();
        let mvp = Mat4::from_cols_array_2d(&u.projection)
            * Mat4::from_cols_array_2d(&u.view)
            * Mat4::from_cols_array_2d(&u.model);
        for corner in [(-0.9, -0.9), (0.9, 0.9), (-0.9, 0.9)] {
            let clip = mvp * Vec4::new(corner.0, corner.1, 0.0, 1.0);
            assert!(clip.w > 0.0);
            assert!(clip.x.abs() <= clip.w && clip.y.abs() <= clip.w);
            assert!(clip.z >= 0.0 && clip.z <= clip.w + 1e-4);
        }
    }
}
