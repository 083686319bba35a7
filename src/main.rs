use clap::{Parser, Subcommand};
use rich_image::geometry::{Rect, Size};
use rich_image::imaging::codec;
use rich_image::imaging::{
    FilterRequest, FlipAxis, GpuVariant, Imaging, InterpolationQuality, MergingMode,
    RenderContextPool, RenderDestination, RenderOption, ResizingMode, RichImage, SoftwareBackend,
    merge_layout,
};
use rich_image::{config, output};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("RICH_IMAGE_ON_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("RICH_IMAGE_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

fn parse_size(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let w: f64 = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let h: f64 = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    Ok(Size::new(w, h))
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(Rect::new(*x, *y, *w, *h)),
        _ => Err(format!("expected X,Y,WIDTH,HEIGHT, got {s:?}")),
    }
}

fn parse_param(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=NUMBER, got {s:?}"))?;
    let value: f64 = value.trim().parse().map_err(|e| format!("{key}: {e}"))?;
    Ok((key.trim().to_string(), value))
}

#[derive(Parser)]
#[command(name = "rich-image")]
#[command(about = "Composite, crop, resize and filter images on the CPU or an accelerator")]
#[command(long_about = "\
Composite, crop, resize and filter images on the CPU or an accelerator

Every pixel operation takes a render option: a destination and an optional
interpolation quality, written DESTINATION[@QUALITY].

  cpu                  the CPU renderer, always
  auto                 an accelerator when one can be built, else the CPU;
                       accelerator failures are retried once on the CPU
  gpu, gpu:primary     the primary accelerator, falling back to compatibility
  gpu:compatibility    the compatibility accelerator only

Geometry is given in points; --scale sets how many pixels make a point.

Merging modes are KIND[:RESIZING], e.g. vertical:scale-aspect-fit,
horizontal-rtl:center or overlay:top-left.

Run 'rich-image gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Render option, overrides [render] in the config (e.g. auto, gpu:compatibility@high)
    #[arg(long, global = true)]
    render: Option<RenderOption>,

    /// Interpolation quality, overrides the render option's quality
    #[arg(long, global = true)]
    quality: Option<InterpolationQuality>,

    /// Pixels per point of loaded images
    #[arg(long, default_value_t = 1.0, global = true)]
    scale: f64,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge images one after another into the first
    Merge {
        base: PathBuf,
        #[arg(required = true)]
        others: Vec<PathBuf>,
        #[arg(long, default_value = "overlay:center")]
        mode: MergingMode,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Crop to a rect, or fit to a size with a resizing mode
    Crop {
        input: PathBuf,
        /// X,Y,WIDTH,HEIGHT in points
        #[arg(long, value_parser = parse_rect, conflicts_with = "fit", required_unless_present = "fit")]
        rect: Option<Rect>,
        /// WIDTHxHEIGHT in points
        #[arg(long, value_parser = parse_size)]
        fit: Option<Size>,
        #[arg(long, default_value = "center")]
        mode: ResizingMode,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Resize to a size; aspect modes keep the aspect ratio
    Resize {
        input: PathBuf,
        /// WIDTHxHEIGHT in points
        #[arg(long, value_parser = parse_size)]
        size: Size,
        #[arg(long, default_value = "scale-to-fill")]
        mode: ResizingMode,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Rotate clockwise; the canvas grows to fit
    Rotate {
        input: PathBuf,
        #[arg(long, allow_negative_numbers = true)]
        degrees: f64,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Mirror horizontally or vertically
    Flip {
        input: PathBuf,
        #[arg(long, default_value = "horizontal")]
        axis: FlipAxis,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Round the corners; without --radius the short side becomes a semicircle
    Round {
        input: PathBuf,
        /// Corner radius in points
        #[arg(long)]
        radius: Option<f64>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Square thumbnail, or --fit to bound the longer side
    Thumbnail {
        input: PathBuf,
        /// Side length in points
        #[arg(long)]
        side: f64,
        /// Scale to fit instead of cropping to a square
        #[arg(long)]
        fit: bool,
        /// Transparent border in points
        #[arg(long, default_value_t = 0.0)]
        border: f64,
        /// Corner radius in points
        #[arg(long, default_value_t = 0.0)]
        radius: f64,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Add a transparent border
    Border {
        input: PathBuf,
        /// Border width in points
        #[arg(long)]
        width: f64,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Run a named filter (gaussian-blur, color-clamp, color-controls, exposure)
    Filter {
        input: PathBuf,
        name: String,
        /// Numeric parameter, repeatable (e.g. --param radius=4)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Re-encode as JPEG no larger than a byte budget
    Compress {
        input: PathBuf,
        #[arg(long)]
        max_bytes: usize,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print where two images of the given sizes land when merged
    Layout {
        /// WIDTHxHEIGHT in points
        #[arg(long, value_parser = parse_size)]
        base: Size,
        /// WIDTHxHEIGHT in points
        #[arg(long, value_parser = parse_size)]
        incoming: Size,
        #[arg(long)]
        mode: MergingMode,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Build render contexts and report what each destination resolves to
    Backends {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config)?;
    init_thread_pool(&config.processing);
    let mut option = cli.render.unwrap_or_else(|| config.render_option());
    if let Some(quality) = cli.quality {
        option.quality = quality;
    }
    debug!(destination = %option.destination, quality = ?option.quality, "render option");

    let backend = Arc::new(SoftwareBackend::with_accelerators(&config.backend.accelerators));
    let pool = Arc::new(RenderContextPool::new(backend.clone()));
    if !config.contexts.warm.is_empty() {
        pool.warm(&config.contexts.warm);
    }
    let imaging = Imaging::with_pool(pool.clone());
    let load = |path: &Path| codec::load_scaled(path, cli.scale);

    match cli.command {
        Command::Merge {
            base,
            others,
            mode,
            output: out,
        } => {
            let base = load(&base)?;
            let others = others
                .iter()
                .map(|p| load(p))
                .collect::<Result<Vec<_>, _>>()?;
            write(&out, &imaging.merge(&base, &others, mode, option)?)?;
        }
        Command::Crop {
            input,
            rect,
            fit,
            mode,
            output: out,
        } => {
            let image = load(&input)?;
            let cropped = match (rect, fit) {
                (Some(rect), _) => imaging.crop(&image, rect, option)?,
                (None, Some(size)) => imaging.crop_fitting(&image, size, mode, option)?,
                (None, None) => return Err("either --rect or --fit is required".into()),
            };
            write(&out, &cropped)?;
        }
        Command::Resize {
            input,
            size,
            mode,
            output: out,
        } => {
            let image = load(&input)?;
            let resized = if mode == ResizingMode::ScaleToFill {
                imaging.resize_fill(&image, size, option)?
            } else {
                imaging.resize_fit(&image, size, mode, option)?
            };
            write(&out, &resized)?;
        }
        Command::Rotate {
            input,
            degrees,
            output: out,
        } => {
            let image = load(&input)?;
            write(&out, &imaging.rotate(&image, degrees.to_radians(), option)?)?;
        }
        Command::Flip {
            input,
            axis,
            output: out,
        } => {
            let image = load(&input)?;
            write(&out, &imaging.flip(&image, axis, option)?)?;
        }
        Command::Round {
            input,
            radius,
            output: out,
        } => {
            let image = load(&input)?;
            let rounded = match radius {
                Some(r) => imaging.round(&image, r, option)?,
                None => imaging.cornered(&image, option)?,
            };
            write(&out, &rounded)?;
        }
        Command::Thumbnail {
            input,
            side,
            fit,
            border,
            radius,
            output: out,
        } => {
            let image = load(&input)?;
            let thumb = if fit {
                imaging.thumbnail_fitting(&image, side, option)?
            } else {
                imaging.thumbnail(&image, side, border, radius, option)?
            };
            write(&out, &thumb)?;
        }
        Command::Border {
            input,
            width,
            output: out,
        } => {
            let image = load(&input)?;
            write(&out, &imaging.bordered(&image, width)?)?;
        }
        Command::Filter {
            input,
            name,
            params,
            output: out,
        } => {
            let image = load(&input)?;
            let request = params
                .into_iter()
                .fold(FilterRequest::new(name), |req, (k, v)| req.with(k, v));
            write(&out, &imaging.filter(&image, &request, option)?)?;
        }
        Command::Compress {
            input,
            max_bytes,
            output: out,
        } => {
            let image = load(&input)?;
            let first = image.first().ok_or(codec::CodecError::Empty)?;
            let bytes = codec::compress_jpeg(first, max_bytes)?;
            std::fs::write(&out, &bytes)?;
            println!("Wrote {} ({} bytes)", out.display(), bytes.len());
        }
        Command::Layout {
            base,
            incoming,
            mode,
            json,
        } => {
            let layout = merge_layout(base, incoming, mode)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&layout)?);
            } else {
                output::print_layout(mode, &layout);
            }
        }
        Command::Backends { json } => {
            let destinations = [
                RenderDestination::Auto,
                RenderDestination::Gpu(GpuVariant::Primary),
                RenderDestination::Gpu(GpuVariant::Compatibility),
                RenderDestination::Cpu,
            ];
            let report = pool.warm(&destinations);
            if json {
                let entries: Vec<serde_json::Value> = report
                    .iter()
                    .map(|(dest, status)| {
                        serde_json::json!({ "destination": dest, "status": status })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                output::print_backends(pool.backend().name(), &backend.accelerators(), &report);
            }
        }
        // Printed before the config was loaded.
        Command::GenConfig => {}
    }

    Ok(())
}

fn write(path: &Path, image: &RichImage) -> Result<(), codec::CodecError> {
    codec::save(image, path)?;
    info!(path = %path.display(), frames = image.frames.len(), "image written");
    output::print_written(path, image);
    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
