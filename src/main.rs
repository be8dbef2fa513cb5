//! # Inkdither CLI
//!
//! Preview harness for the halftoning engine: dithers a grayscale image (or
//! a synthetic gradient) and writes the resulting dots as a PNG.
//!
//! ## Usage
//!
//! ```bash
//! # List algorithms
//! inkdither algorithms
//!
//! # Dither a gradient with the default single-bit channel
//! inkdither render --algorithm EvenTone --width 720 --height 200 --png out.png
//!
//! # Dither a photo with a job description
//! inkdither render --job job.json --input photo.png --png out.png
//!
//! # Show job construction details
//! RUST_LOG=debug inkdither render --png out.png
//! ```

use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

use inkdither::{Algorithm, ChannelSpec, Dither, DitherConfig, DitherError, ScanlineBuffers};

/// Inkdither - inkjet halftoning preview utility
#[derive(Parser, Debug)]
#[command(name = "inkdither")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the available algorithms
    Algorithms,

    /// Dither an image and save the dots as PNG
    Render {
        /// Job description (JSON); defaults to one single-bit channel
        #[arg(long, value_name = "FILE")]
        job: Option<PathBuf>,

        /// Grayscale input image; omit for a horizontal gradient
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Output PNG
        #[arg(long, value_name = "FILE")]
        png: PathBuf,

        /// Override the job's algorithm
        #[arg(long)]
        algorithm: Option<String>,

        /// Output width in dots (defaults to the job's or the image's width)
        #[arg(long)]
        width: Option<usize>,

        /// Gradient height in rows
        #[arg(long, default_value = "256")]
        height: usize,

        /// Channel to preview
        #[arg(long, default_value = "0")]
        channel: usize,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), DitherError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Algorithms => {
            println!("Available algorithms:");
            for algorithm in Algorithm::ALL {
                println!("  {}", algorithm);
            }
        }
        Commands::Render {
            job,
            input,
            png,
            algorithm,
            width,
            height,
            channel,
        } => {
            let mut config = match &job {
                // dst_width may come from the command line, Dither::new validates
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => DitherConfig {
                    channels: vec![ChannelSpec::single_bit()],
                    ..Default::default()
                },
            };
            if let Some(name) = algorithm {
                config.algorithm = name;
            }

            let (src_width, rows) = match &input {
                Some(path) => load_image(path)?,
                None => {
                    let w = width.or((config.dst_width > 0).then_some(config.dst_width));
                    gradient(w.unwrap_or(576), height)
                }
            };
            config.src_width = src_width;
            config.dst_width = width
                .or((config.dst_width > 0).then_some(config.dst_width))
                .unwrap_or(src_width);

            let mut dither = Dither::new(&config)?;
            if channel >= dither.channels().len() {
                return Err(DitherError::Config(format!(
                    "job has {} channels, cannot preview channel {}",
                    dither.channels().len(),
                    channel
                )));
            }

            let channels = dither.channels().len();
            let mut out = dither.allocate_output();
            let mut preview = Preview::new(config.dst_width, rows.len());
            let mut samples = vec![0u16; src_width * channels];
            for (y, row) in rows.iter().enumerate() {
                for (x, &ink) in row.iter().enumerate() {
                    samples[x * channels..(x + 1) * channels].fill(ink);
                }
                dither.process_scanline(y, &samples, false, 0, &mut out)?;
                preview.add_row(y, &out, channel);
            }

            info!(
                "{} rows with {} at {} dots",
                rows.len(),
                dither.algorithm(),
                config.dst_width
            );
            preview.save(&png)?;
            println!("Saved to {}", png.display());
        }
    }

    Ok(())
}

/// Load an image as ink rows: dark pixels become high ink values.
fn load_image(path: &Path) -> Result<(usize, Vec<Vec<u16>>), DitherError> {
    let img = image::open(path)
        .map_err(|e| DitherError::Image(format!("Failed to open {}: {}", path.display(), e)))?
        .to_luma16();
    let (w, h) = img.dimensions();
    let rows = (0..h)
        .map(|y| (0..w).map(|x| u16::MAX - img.get_pixel(x, y).0[0]).collect())
        .collect();
    Ok((w as usize, rows))
}

/// Horizontal ramp from no ink to full ink.
fn gradient(width: usize, height: usize) -> (usize, Vec<Vec<u16>>) {
    let width = width.max(1);
    let row: Vec<u16> = (0..width)
        .map(|x| (x as u64 * 65535 / (width.max(2) - 1) as u64) as u16)
        .collect();
    (width, vec![row; height])
}

/// Grayscale rendering of one channel's dots.
struct Preview {
    width: usize,
    pixels: Vec<u8>,
}

impl Preview {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            pixels: vec![255; width * height],
        }
    }

    /// Darkest subchannel wins; bigger patterns print darker.
    fn add_row(&mut self, y: usize, out: &ScanlineBuffers, channel: usize) {
        let Some(row) = out.channel(channel) else {
            return;
        };
        for sub in row.subchannels() {
            let max_pattern = ((1u64 << sub.planes()) - 1).max(1);
            for x in 0..self.width {
                let pattern = sub.pattern_at(x);
                if pattern == 0 {
                    continue;
                }
                let shade = 255 - (pattern as u64 * 255 / max_pattern) as u8;
                let px = &mut self.pixels[y * self.width + x];
                *px = (*px).min(shade);
            }
        }
    }

    fn save(&self, path: &Path) -> Result<(), DitherError> {
        use image::GrayImage;

        let height = self.pixels.len() / self.width.max(1);
        let img = GrayImage::from_raw(self.width as u32, height as u32, self.pixels.clone())
            .ok_or_else(|| DitherError::Image("preview buffer size mismatch".to_string()))?;
        img.save(path)
            .map_err(|e| DitherError::Image(format!("Failed to save PNG: {}", e)))?;
        Ok(())
    }
}
