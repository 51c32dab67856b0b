use clap::{ArgGroup, Parser};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use tma_dearray::cores::{read_cores, write_cores};
use tma_dearray::params::ParamsFile;
use tma_dearray::plot_grid::{build_index_grid, render_overlay, render_virtual_grid};
use tma_dearray::segmentation::{regions_to_cores, segment_image};
use tma_dearray::{Core, Session};

#[derive(Parser, Debug)]
#[command(
    name = "tma_grid",
    about = "Assign row/column indices to tissue microarray cores",
    version,
    group(
        ArgGroup::new("input")
            .required(true)
            .args(["cores", "mask"])
    )
)]
struct Cli {
    /// JSON array of detected cores ({x, y, ...})
    #[arg(short = 'c', long = "cores")]
    cores: Option<PathBuf>,

    /// Binary or probability mask image to segment into cores
    #[arg(short = 'm', long = "mask")]
    mask: Option<PathBuf>,

    /// JSON file overriding hyperparameters and segmentation settings
    #[arg(short = 'p', long = "params")]
    params: Option<PathBuf>,

    /// Where to write the indexed cores
    #[arg(short = 'o', long = "out", default_value = "indexed_cores.json")]
    out: PathBuf,

    /// Slide image behind the overlay and virtual grid (defaults to the mask)
    #[arg(short = 'i', long = "image")]
    image: Option<PathBuf>,

    /// Optional PNG overlay of the indexed grid
    #[arg(long = "plot")]
    plot: Option<PathBuf>,

    /// Optional PNG of the de-arrayed virtual grid; needs --image or --mask
    #[arg(long = "virtual-grid")]
    virtual_grid: Option<PathBuf>,

    /// Use originAngle, gridWidth, imageWidth and gamma from the params as given
    #[arg(long = "skip-orientation")]
    skip_orientation: bool,
}

fn load_params(path: Option<&Path>) -> Result<ParamsFile, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(ParamsFile::default());
    };
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let params = load_params(cli.params.as_deref())?;

    let mut background = None;
    let cores: Vec<Core> = match (&cli.cores, &cli.mask) {
        (Some(path), _) => read_cores(path)?,
        (None, Some(path)) => {
            let img = image::open(path)?;
            let regions = segment_image(&img, &params.segmentation)?;
            background = Some(img.to_rgb8());
            regions_to_cores(&regions, 1.0, 1.0, 1.0)
        }
        (None, None) => return Err("either --cores or --mask is required".into()),
    };
    log::info!("loaded {} cores", cores.len());
    if let Some(path) = &cli.image {
        background = Some(image::open(path)?.to_rgb8());
    }

    let mut session = Session::new(cores, params.hyperparameters);
    if cli.skip_orientation {
        session.assemble()?;
    } else {
        session.run()?;
    }

    let indexed = session.indexed_cores();
    write_cores(&cli.out, indexed)?;
    log::info!("wrote {} indexed cores to {}", indexed.len(), cli.out.display());

    if log::log_enabled!(log::Level::Debug) {
        for line in build_index_grid(indexed) {
            log::debug!("{}", line.into_iter().collect::<String>());
        }
    }

    if let Some(plot_path) = &cli.plot {
        let (w, h) = match &background {
            Some(bg) => bg.dimensions(),
            None => canvas_size(indexed),
        };
        let overlay = render_overlay(w, h, background.as_ref(), indexed)?;
        overlay.save(plot_path)?;
        log::info!("wrote overlay {}", plot_path.display());
    }

    if let Some(grid_path) = &cli.virtual_grid {
        let Some(source) = &background else {
            return Err("--virtual-grid needs --image or --mask".into());
        };
        render_virtual_grid(source, indexed, &params.virtual_grid).save(grid_path)?;
        log::info!("wrote virtual grid {}", grid_path.display());
    }

    Ok(())
}

/// Smallest canvas that holds every core with a margin of its radius.
fn canvas_size(cores: &[Core]) -> (u32, u32) {
    let max_x = cores.iter().map(|c| c.x + c.radius).fold(0.0, f64::max);
    let max_y = cores.iter().map(|c| c.y + c.radius).fold(0.0, f64::max);
    ((max_x.ceil() as u32).max(1) + 10, (max_y.ceil() as u32).max(1) + 10)
}
