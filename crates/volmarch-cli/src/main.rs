//! Volmarch CLI - render, inspect and convert volume scans

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{CameraConfig, SceneConfig};
use glam::UVec3;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use volmarch_core::colormap::{
    Colormap, ColormapId, ColormapSet, DEFAULT_RANDOM_HUE_ENTRIES, DEFAULT_RANDOM_HUE_SEED,
};
use volmarch_core::field::primitives::Blobs;
use volmarch_core::io::{self, Endian, ScalarType, raw::RawLayout};
use volmarch_core::params::{RenderMode, RenderParams};
use volmarch_core::presets::OrganPreset;
use volmarch_core::volume::Volume;
use volmarch_render::{RenderSettings, Scene};

#[derive(Parser)]
#[command(name = "volmarch")]
#[command(about = "Volume ray marching for scan data", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Parameter flags shared by `render`
#[derive(clap::Args, Debug, Clone, Default)]
struct ParamArgs {
    /// Render mode: mip or iso
    #[arg(long)]
    mode: Option<RenderMode>,

    /// Lower contrast limit (0-1)
    #[arg(long)]
    clim_low: Option<f32>,

    /// Upper contrast limit (0-1)
    #[arg(long)]
    clim_high: Option<f32>,

    /// Iso-surface threshold (0-1)
    #[arg(long)]
    threshold: Option<f32>,

    /// Builtin colormap: gray, viridis, plasma, inferno, turbo, random_hue
    #[arg(long)]
    colormap: Option<ColormapId>,

    /// Colormap strip image (e.g. cm_viridis.png); overrides --colormap
    #[arg(long)]
    colormap_file: Option<PathBuf>,

    /// Volume opacity over the background (0-1)
    #[arg(long)]
    opacity: Option<f32>,
}

impl ParamArgs {
    /// Apply the flags that were given on top of `params`
    fn apply(&self, params: RenderParams, custom: Option<&ColormapId>) -> RenderParams {
        let (low, high) = params.clim();
        let mut params = params.with_clim(self.clim_low.unwrap_or(low), self.clim_high.unwrap_or(high));
        if let Some(mode) = self.mode {
            params = params.with_mode(mode);
        }
        if let Some(threshold) = self.threshold {
            params = params.with_iso_threshold(threshold);
        }
        if let Some(opacity) = self.opacity {
            params = params.with_opacity(opacity);
        }
        if let Some(id) = custom.or(self.colormap.as_ref()) {
            params = params.with_colormap(id.clone());
        }
        params
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render a volume or a scene file to an image (headless)
    Render {
        /// NRRD volume to render (uses a procedural demo volume if neither this nor --scene is given)
        #[arg(long, conflicts_with = "scene")]
        volume: Option<PathBuf>,

        /// JSON scene file with several volumes
        #[arg(long)]
        scene: Option<PathBuf>,

        /// Output image file (.png)
        #[arg(short, long, default_value = "render.png")]
        output: PathBuf,

        /// Image width
        #[arg(long, default_value = "800")]
        width: u32,

        /// Image height
        #[arg(long, default_value = "800")]
        height: u32,

        #[command(flatten)]
        params: ParamArgs,

        /// Organ preset for threshold, colormap and rotation
        #[arg(long)]
        preset: Option<OrganPreset>,

        /// Orbit around the vertical axis, degrees
        #[arg(long, default_value = "30", allow_negative_numbers = true)]
        azimuth: f32,

        /// Orbit towards the top, degrees
        #[arg(long, default_value = "20", allow_negative_numbers = true)]
        elevation: f32,

        /// Move the camera closer (world units)
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        zoom: f32,

        /// Orthographic instead of perspective projection
        #[arg(long)]
        orthographic: bool,

        /// Sample spacing in voxels (0.05-1.0)
        #[arg(long)]
        step_size: Option<f32>,

        /// Rescale raw volume values onto 0-1 after loading
        #[arg(long)]
        normalize: bool,

        /// Render with WGPU instead of the CPU marcher
        #[arg(long)]
        gpu: bool,
    },

    /// Print dimensions and value statistics of a NRRD volume
    Info {
        /// NRRD file
        input: PathBuf,
    },

    /// Convert a .nrrd or headerless .raw volume to float NRRD
    Convert {
        /// Input volume
        input: PathBuf,

        /// Output NRRD file
        #[arg(short, long)]
        output: PathBuf,

        /// Raw dimensions, e.g. 256x256x128; a fourth value is a frame
        /// count and the frames are max-projected
        #[arg(long)]
        dims: Option<String>,

        /// Raw sample type (uint8, int16, float, ...)
        #[arg(long, default_value = "uint8")]
        dtype: String,

        /// Raw samples are big-endian
        #[arg(long)]
        big_endian: bool,

        /// Resample by this factor per axis
        #[arg(long)]
        scale: Option<f32>,

        /// Rescale values onto 0-1
        #[arg(long)]
        normalize: bool,
    },

    /// Bake a colormap to a PNG strip
    Colormap {
        /// Builtin colormap name
        #[arg(default_value = "viridis")]
        name: ColormapId,

        /// Generate a random-hue label colormap instead
        #[arg(long)]
        random_hue: bool,

        /// Entries in the random-hue table
        #[arg(long, default_value_t = DEFAULT_RANDOM_HUE_ENTRIES)]
        entries: usize,

        /// Seed for the random-hue table
        #[arg(long, default_value_t = DEFAULT_RANDOM_HUE_SEED)]
        seed: u64,

        /// Output image file
        #[arg(short, long, default_value = "colormap.png")]
        output: PathBuf,

        /// Strip width
        #[arg(long, default_value = "256")]
        width: u32,

        /// Strip height
        #[arg(long, default_value = "16")]
        height: u32,
    },

    /// Write the procedural demo volume as NRRD
    Demo {
        /// Output file
        #[arg(short, long, default_value = "demo.nrrd")]
        output: PathBuf,

        /// Voxels per axis
        #[arg(long, default_value = "64")]
        size: u32,
    },

    /// Watch a scene file and re-render on every change
    Watch {
        /// Scene file to watch
        scene: PathBuf,

        /// Output image file (.png)
        #[arg(short, long, default_value = "render.png")]
        output: PathBuf,

        /// Image width
        #[arg(long, default_value = "800")]
        width: u32,

        /// Image height
        #[arg(long, default_value = "800")]
        height: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Render {
            volume,
            scene,
            output,
            width,
            height,
            params,
            preset,
            azimuth,
            elevation,
            zoom,
            orthographic,
            step_size,
            normalize,
            gpu,
        } => {
            let camera = CameraConfig {
                azimuth,
                elevation,
                zoom,
                orthographic,
                ..Default::default()
            };
            let source = match (volume, scene) {
                (Some(path), _) => Source::Volume(path),
                (None, Some(path)) => Source::Scene(path),
                (None, None) => Source::Demo,
            };
            let request = RenderRequest {
                output,
                width,
                height,
                params,
                preset,
                camera,
                step_size,
                normalize,
                gpu,
            };
            run_render(&source, &request)?;
        }
        Commands::Info { input } => {
            run_info(&input)?;
        }
        Commands::Convert {
            input,
            output,
            dims,
            dtype,
            big_endian,
            scale,
            normalize,
        } => {
            let endian = if big_endian { Endian::Big } else { Endian::Little };
            run_convert(&input, &output, dims.as_deref(), &dtype, endian, scale, normalize)?;
        }
        Commands::Colormap {
            name,
            random_hue,
            entries,
            seed,
            output,
            width,
            height,
        } => {
            let colormap = if random_hue {
                Colormap::random_hue(entries, seed)
            } else {
                ColormapSet::builtin().get(&name)?.clone()
            };
            colormap.save_image(&output, width, height)?;
            println!(
                "Saved {} ({} entries) to: {}",
                colormap.name,
                colormap.colors.len(),
                output.display()
            );
        }
        Commands::Demo { output, size } => {
            generate_demo(&output, size)?;
        }
        Commands::Watch {
            scene,
            output,
            width,
            height,
        } => {
            run_watch(&scene, &output, width, height)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

enum Source {
    Volume(PathBuf),
    Scene(PathBuf),
    Demo,
}

struct RenderRequest {
    output: PathBuf,
    width: u32,
    height: u32,
    params: ParamArgs,
    preset: Option<OrganPreset>,
    camera: CameraConfig,
    step_size: Option<f32>,
    normalize: bool,
    gpu: bool,
}

fn run_render(source: &Source, request: &RenderRequest) -> Result<()> {
    println!(
        "Rendering to {} ({}x{})...",
        request.output.display(),
        request.width,
        request.height
    );

    let mut colormaps = ColormapSet::builtin();
    let custom = match &request.params.colormap_file {
        Some(path) => {
            let colormap = Colormap::from_image(path)
                .with_context(|| format!("Failed to load colormap {}", path.display()))?;
            let id = ColormapId::Custom(colormap.name.clone());
            colormaps.register(id.clone(), colormap);
            Some(id)
        }
        None => None,
    };

    let (mut scene, camera_config, mut settings) = match source {
        Source::Scene(path) => {
            let config = SceneConfig::load(path)?;
            let base = path.parent().unwrap_or(Path::new("."));
            let scene = config.build_scene(base)?;
            (scene, config.camera.clone(), config.lighting.settings())
        }
        Source::Volume(path) => {
            println!("Loading volume: {}", path.display());
            let volume = io::nrrd::read(path)
                .with_context(|| format!("Failed to load volume {}", path.display()))?;
            let (min, max) = volume.value_range();
            if !request.normalize && (min < 0.0 || max > 1.0) {
                tracing::warn!(
                    "Volume values span {} .. {}; parameters expect 0-1, consider --normalize",
                    min,
                    max
                );
            }
            let volume = if request.normalize { volume.normalized() } else { volume };
            (
                single_volume_scene(volume, request.preset)?,
                request.camera.clone(),
                RenderSettings::default(),
            )
        }
        Source::Demo => (
            single_volume_scene(demo_volume(64)?, request.preset)?,
            request.camera.clone(),
            RenderSettings::default(),
        ),
    };

    for i in 0..scene.instances().len() {
        if let Some(instance) = scene.instance_mut(i) {
            instance.params = request.params.apply(instance.params.clone(), custom.as_ref());
        }
    }
    if let Some(step) = request.step_size {
        settings = settings.with_step_size(step);
    }

    let camera = camera_config.build(scene.bounds());
    let img = if request.gpu {
        render_gpu(&scene, &camera, &settings, &colormaps, request.width, request.height)?
    } else {
        volmarch_render::render_frame(
            &scene,
            &camera,
            &settings,
            &colormaps,
            request.width,
            request.height,
        )?
        .to_image()
    };

    img.save(&request.output)
        .with_context(|| format!("Failed to write {}", request.output.display()))?;
    println!("Saved to: {}", request.output.display());

    Ok(())
}

/// Scene with one volume at the origin, posed and parameterized by `preset`
fn single_volume_scene(volume: Volume, preset: Option<OrganPreset>) -> Result<Scene> {
    let mut scene = Scene::new();
    let mut local = volmarch_render::Transform::IDENTITY;
    let mut params = RenderParams::default();
    if let Some(preset) = preset {
        local = local.with_rotation(preset.rotation());
        params = preset.params();
    }
    let name = preset.map_or("volume", OrganPreset::name);
    let node = scene.add_node(name, Scene::ROOT, local)?;
    scene.add_volume(node, Arc::new(volume), params)?;
    Ok(scene)
}

fn render_gpu(
    scene: &Scene,
    camera: &volmarch_render::Camera,
    settings: &RenderSettings,
    colormaps: &ColormapSet,
    width: u32,
    height: u32,
) -> Result<image::RgbaImage> {
    use volmarch_render::{GpuRaymarcher, init_headless_blocking};

    let [instance] = scene.instances() else {
        anyhow::bail!(
            "GPU rendering supports one volume, scene has {}",
            scene.instances().len()
        );
    };
    let model = scene.instance_models()[0];
    let colormap = colormaps.get(instance.params.colormap())?;

    let (device, queue) = init_headless_blocking()?;
    let raymarcher = GpuRaymarcher::new(device, queue, &instance.volume, colormap)?;
    let img = raymarcher.render_to_image(width, height, camera, model, &instance.params, settings)?;
    Ok(img)
}

fn run_info(input: &Path) -> Result<()> {
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let (header, _) = io::nrrd::parse_header(&bytes)?;
    let volume = io::nrrd::parse(&bytes)?;
    let (min, max) = volume.value_range();
    let bounds = volume.bounds();

    println!("File:       {}", input.display());
    println!("Format:     {}", header.version);
    println!(
        "Dimensions: {} x {} x {} ({} voxels)",
        header.dims.x,
        header.dims.y,
        header.dims.z,
        volume.len()
    );
    if header.frames > 1 {
        println!("Frames:     {} (max-projected)", header.frames);
    }
    println!(
        "Type:       {:?} ({:?} endian, {:?} encoding)",
        header.scalar_type, header.endian, header.encoding
    );
    println!("Range:      {} .. {}", min, max);
    println!("Mean:       {}", volume.mean());
    println!("Bounds:     {} .. {}", bounds.min, bounds.max);

    Ok(())
}

fn run_convert(
    input: &Path,
    output: &Path,
    dims: Option<&str>,
    dtype: &str,
    endian: Endian,
    scale: Option<f32>,
    normalize: bool,
) -> Result<()> {
    let is_nrrd = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("nrrd"));

    let mut volume = if is_nrrd {
        io::nrrd::read(input)
    } else {
        let dims = dims.context("--dims is required for raw input")?;
        let (dims, frames) = parse_dims(dims)?;
        let layout = RawLayout {
            dims,
            frames,
            scalar_type: ScalarType::parse(dtype)?,
            endian,
        };
        io::raw::read(input, layout)
    }
    .with_context(|| format!("Failed to load {}", input.display()))?;

    if let Some(scale) = scale {
        volume = volume.resample(scale)?;
    }
    if normalize {
        volume = volume.normalized();
    }

    io::nrrd::write(output, &volume)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    let d = volume.dims();
    println!(
        "Converted {} -> {} ({}x{}x{})",
        input.display(),
        output.display(),
        d.x,
        d.y,
        d.z
    );

    Ok(())
}

/// Parse `XxYxZ` or `XxYxZxT` (or comma separated) dimensions
fn parse_dims(text: &str) -> Result<(UVec3, u32)> {
    let parts = text
        .split(['x', 'X', ','])
        .map(|p| p.trim().parse::<u32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid dimensions '{}'", text))?;
    match parts.as_slice() {
        &[x, y, z] => Ok((UVec3::new(x, y, z), 1)),
        &[x, y, z, t] if t > 0 => Ok((UVec3::new(x, y, z), t)),
        _ => anyhow::bail!("Expected three dimensions and an optional frame count, got '{}'", text),
    }
}

fn demo_volume(size: u32) -> Result<Volume> {
    Ok(Volume::from_field(&Blobs::organ(), UVec3::splat(size.max(2)))?)
}

fn generate_demo(output: &Path, size: u32) -> Result<()> {
    println!("Generating demo volume...");

    let volume = demo_volume(size)?;
    let (min, max) = volume.value_range();
    println!(
        "Generated {}^3 volume, values {:.3} .. {:.3}",
        size.max(2),
        min,
        max
    );

    io::nrrd::write(output, &volume)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Exported to: {}", output.display());

    Ok(())
}

fn run_watch(scene: &Path, output: &Path, width: u32, height: u32) -> Result<()> {
    use notify::{RecursiveMode, Watcher};
    use std::sync::mpsc::channel;
    use std::time::Duration;

    if !scene.exists() {
        anyhow::bail!("Scene file not found: {}", scene.display());
    }

    let (tx, rx) = channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res {
            if event.kind.is_modify() {
                let _ = tx.send(());
            }
        }
    })?;

    watcher.watch(scene, RecursiveMode::NonRecursive)?;

    println!("Watching {}", scene.display());
    println!("Press Ctrl+C to stop\n");

    // Initial render
    render_and_report(scene, output, width, height);

    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(()) => {
                // Editors often write in several steps; collapse the burst
                while rx.try_recv().is_ok() {}
                render_and_report(scene, output, width, height);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                // Continue watching
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                break;
            }
        }
    }

    Ok(())
}

fn render_and_report(scene: &Path, output: &Path, width: u32, height: u32) {
    println!("\n--- Rendering: {} ---", scene.display());

    let request = RenderRequest {
        output: output.to_path_buf(),
        width,
        height,
        params: ParamArgs::default(),
        preset: None,
        camera: CameraConfig::default(),
        step_size: None,
        normalize: false,
        gpu: false,
    };
    match run_render(&Source::Scene(scene.to_path_buf()), &request) {
        Ok(()) => {
            println!("OK - Scene rendered successfully");
        }
        Err(e) => {
            eprintln!("ERROR:\n{:#}", e);
        }
    }
}
