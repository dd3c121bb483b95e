//! Multithreaded CPU renderer
//!
//! Produces the same images as the GPU path without needing an adapter,
//! which makes it the reference for tests and the fallback for the CLI.

use crate::camera::Camera;
use crate::error::{RenderError, Result};
use crate::lighting::RenderSettings;
use crate::raymarch::Marcher;
use crate::scene::Scene;
use glam::{Mat4, Vec3, Vec4};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use volmarch_core::colormap::ColormapSet;

const MIN_DETERMINANT: f32 = 1e-20;

/// A rendered frame of linear RGBA pixels, row 0 at the top
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Vec4>,
}

impl Frame {
    pub fn pixel(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Convert to an 8-bit image
    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let c = self.pixel(x, y).clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
            Rgba([
                c.x.round() as u8,
                c.y.round() as u8,
                c.z.round() as u8,
                c.w.round() as u8,
            ])
        })
    }
}

/// Inverse of a model matrix, or `None` if it cannot be inverted
pub fn invert_model(model: &Mat4) -> Option<Mat4> {
    if model.determinant().abs() < MIN_DETERMINANT {
        return None;
    }
    let inv = model.inverse();
    inv.is_finite().then_some(inv)
}

/// Blend `(depth, color)` contributions front to back over `background`.
///
/// Colors carry straight alpha. Fully opaque contributions hide everything
/// behind them, so with opacity 1 the nearest volume wins.
pub fn composite(hits: &mut [(f32, Vec4)], background: Vec4) -> Vec4 {
    hits.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut rgb = Vec3::ZERO;
    let mut alpha = 0.0;
    for &(_, color) in hits.iter() {
        let weight = (1.0 - alpha) * color.w;
        rgb += color.truncate() * weight;
        alpha += weight;
        if alpha >= 1.0 {
            return rgb.extend(1.0);
        }
    }
    let remaining = 1.0 - alpha;
    (rgb + background.truncate() * remaining).extend(alpha + background.w * remaining)
}

/// Render every volume instance in `scene` as seen from `camera`.
///
/// Colormaps and transforms are resolved before any ray is traced, so a
/// missing colormap or a singular transform fails the whole frame.
/// Overlapping instances are blended by depth using their opacity.
pub fn render_frame(
    scene: &Scene,
    camera: &Camera,
    settings: &RenderSettings,
    colormaps: &ColormapSet,
    width: u32,
    height: u32,
) -> Result<Frame> {
    if width == 0 || height == 0 {
        return Err(RenderError::EmptyViewport(width, height));
    }

    let models = scene.instance_models();
    let marchers = scene
        .instances()
        .iter()
        .zip(&models)
        .enumerate()
        .map(|(i, (instance, model))| {
            let inv_model = invert_model(model).ok_or(RenderError::SingularTransform(i))?;
            let colormap = colormaps.get(instance.params.colormap())?;
            Ok(Marcher::new(&instance.volume, inv_model, &instance.params, colormap))
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        "Rendering {}x{} frame with {} volume(s)",
        width,
        height,
        marchers.len()
    );

    let mut pixels = vec![settings.background; (width * height) as usize];
    pixels
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let mut hits = Vec::with_capacity(marchers.len());
            for (x, pixel) in row.iter_mut().enumerate() {
                let ray = camera.ray_for_pixel(x as u32, y as u32, width, height);
                hits.clear();
                hits.extend(
                    marchers
                        .iter()
                        .filter_map(|marcher| marcher.evaluate(&ray, settings)),
                );
                if !hits.is_empty() {
                    *pixel = composite(&mut hits, settings.background);
                }
            }
        });

    Ok(Frame {
        width,
        height,
        pixels,
    })
}
