//! Volmarch Render - volume raymarching on the CPU and with WGPU
//!
//! This crate turns volumes placed in a [`Scene`] into images, either
//! with the multithreaded CPU marcher or with a WGPU fragment shader that
//! implements the same procedure.
//!
//! ## Features
//!
//! - Maximum intensity projection and shaded iso-surfaces
//! - Orbital camera with perspective or orthographic projection
//! - Scene graph of transforms, several volumes per frame
//! - Headless GPU rendering to image files
//!
//! ## Example
//!
//! ```rust,ignore
//! use volmarch_render::{Camera, RenderSettings, Scene, cpu};
//!
//! let mut scene = Scene::new();
//! scene.add_volume(Scene::ROOT, volume, params)?;
//! let frame = cpu::render_frame(&scene, &camera, &RenderSettings::default(), &colormaps, 512, 512)?;
//! frame.to_image().save("out.png")?;
//! ```

pub mod camera;
pub mod cpu;
pub mod error;
pub mod gpu;
pub mod lighting;
pub mod raymarch;
pub mod scene;

// Re-export wgpu for users who need devices, texture formats, etc.
pub use wgpu;

pub use camera::{Camera, Projection};
pub use cpu::{Frame, composite, render_frame};
pub use error::{RenderError, Result};
pub use gpu::{GpuRaymarcher, VolumeUniforms, init_headless, init_headless_blocking};
pub use lighting::{Light, Lighting, LightingUniforms, RenderSettings};
pub use raymarch::{Marcher, Ray, RayOutcome};
pub use scene::{NodeId, Scene, Transform, VolumeInstance, ring_positions};
