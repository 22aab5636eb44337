// src/bin/fit_plane.rs - Offline floor-line calibration from recorded locations
use anyhow::{Context, Result};
use clap::Parser;
use man_tracker::plane::Plane;
use man_tracker::record::read_locations;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about = "Least-squares fit of y = k*x + b over recorded absolute locations")]
struct Args {
    /// CSV written by `man_tracker --record`, or a plain file with `x,y` columns.
    input: PathBuf,

    /// Treat the input as bare `x,y` rows.
    #[arg(long)]
    points: bool,
}

#[derive(Debug, serde::Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

fn read_points(path: &Path) -> Result<Vec<(f64, f64)>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("Failed to open {}", path.display()))?;
    reader
        .deserialize::<Point>()
        .map(|row| {
            row.map(|p| (p.x, p.y))
                .with_context(|| format!("Malformed row in {}", path.display()))
        })
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let (plane, samples) = if args.points {
        let points = read_points(&args.input)?;
        (Plane::fit_points(&points)?, points.len())
    } else {
        let locations = read_locations(&args.input)?;
        (Plane::fit(&locations)?, locations.len())
    };

    tracing::info!(samples, "fitted plane");
    println!("k = {:.6}", plane.k);
    println!("b = {:.6}", plane.b);
    Ok(())
}
