use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use compute::{AggregationConfig, Aggregator, Resolver};
use formats::{IngestReport, area_set_from_geojson, mesh_grid_from_geojson, read_trees_csv};
use geo::{Centroid, GeodesicArea, Point};
use runtime::{
    AreaTracker, DirTreeSource, RefreshOutcome, Refresher, SurveyContext, ViewportPipeline,
    metrics,
};
use serde::Serialize;
use survey::{AreaSet, MeshGrid};
use tools::config::{DEFAULT_AREA_BUFFER_M, load_aggregation_config, parse_center, read_centers};
use tools::sidebar::{SidebarPrinter, render_sidebar};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Mesh-based forest stand statistics")]
struct Cli {
    /// JSON file with aggregation settings
    #[arg(long, global = true, env = "CANOPY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Statistics for the mesh under one point
    Stats {
        /// Mesh grid GeoJSON
        #[arg(long)]
        mesh: PathBuf,
        /// Survey area GeoJSON
        #[arg(long)]
        areas: PathBuf,
        /// Tree CSV
        #[arg(long)]
        trees: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Print the report as JSON instead of the sidebar text
        #[arg(long)]
        json: bool,
    },

    /// List rows the tree CSV loader rejected or coerced
    Audit {
        #[arg(long)]
        trees: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// List survey areas with centroid and geodesic area
    Areas {
        #[arg(long)]
        areas: PathBuf,
    },

    /// Feed viewport centers through the refresh pipeline
    Replay {
        /// Directory holding `<area>/trees.csv` or a shared `trees.csv`
        #[arg(long, env = "CANOPY_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,
        #[arg(long)]
        mesh: PathBuf,
        #[arg(long)]
        areas: PathBuf,
        /// Distance (m) outside an area that still selects it
        #[arg(long, env = "CANOPY_AREA_BUFFER_M", default_value_t = DEFAULT_AREA_BUFFER_M)]
        buffer_m: f64,
        /// Headerless `lon,lat` CSV of centers
        #[arg(long)]
        centers: Option<PathBuf>,
        /// Run every request concurrently; only the newest result is kept
        #[arg(long)]
        background: bool,
        #[arg(long)]
        json: bool,
        /// Centers as `lon,lat`
        #[arg(allow_hyphen_values = true)]
        points: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let aggregation = load_aggregation_config(cli.config.as_deref())?;

    match cli.command {
        Command::Stats {
            mesh,
            areas,
            trees,
            lon,
            lat,
            json,
        } => cmd_stats(&mesh, &areas, &trees, Point::new(lon, lat), json, aggregation),
        Command::Audit { trees, json } => cmd_audit(&trees, json),
        Command::Areas { areas } => cmd_areas(&areas),
        Command::Replay {
            data_dir,
            mesh,
            areas,
            buffer_m,
            centers,
            background,
            json,
            points,
        } => {
            let mut all = Vec::new();
            if let Some(path) = &centers {
                let payload = fs::read_to_string(path)
                    .with_context(|| format!("read centers {}", path.display()))?;
                all.extend(read_centers(&payload)?);
            }
            for raw in &points {
                all.push(parse_center(raw)?);
            }
            if all.is_empty() {
                bail!("replay needs --centers or at least one lon,lat point");
            }

            let context = SurveyContext::new(
                Arc::new(load_grid(&mesh)?),
                Arc::new(load_areas(&areas)?),
                aggregation,
            );
            let tracker = AreaTracker::new(context.areas().clone(), buffer_m);
            let source = DirTreeSource::new(data_dir);
            if background {
                replay_background(context, tracker, source, &all, json).await
            } else {
                replay(context, tracker, source, &all, json)
            }
        }
    }
}

fn load_grid(path: &Path) -> anyhow::Result<MeshGrid> {
    let payload =
        fs::read_to_string(path).with_context(|| format!("read mesh {}", path.display()))?;
    mesh_grid_from_geojson(&payload).with_context(|| format!("parse mesh {}", path.display()))
}

fn load_areas(path: &Path) -> anyhow::Result<AreaSet> {
    let payload =
        fs::read_to_string(path).with_context(|| format!("read areas {}", path.display()))?;
    area_set_from_geojson(&payload).with_context(|| format!("parse areas {}", path.display()))
}

fn load_trees(path: &Path) -> anyhow::Result<IngestReport> {
    let file = File::open(path).with_context(|| format!("open trees {}", path.display()))?;
    read_trees_csv(BufReader::new(file)).with_context(|| format!("parse trees {}", path.display()))
}

fn cmd_stats(
    mesh: &Path,
    areas: &Path,
    trees: &Path,
    center: Point<f64>,
    json: bool,
    aggregation: AggregationConfig,
) -> anyhow::Result<()> {
    let grid = load_grid(mesh)?;
    let areas = load_areas(areas)?;
    let ingest = load_trees(trees)?;
    if !ingest.issues.is_empty() {
        tracing::warn!(
            rejected = ingest.rejected_rows(),
            coerced = ingest.coerced_values(),
            "tree CSV had issues; run `canopy audit` for details"
        );
    }

    let resolution = Resolver::new(&grid, &areas).resolve(center);
    let report = Aggregator::new(aggregation).aggregate(&resolution, &ingest.trees);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_sidebar(&report));
    }
    Ok(())
}

fn cmd_audit(trees: &Path, json: bool) -> anyhow::Result<()> {
    let ingest = load_trees(trees)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ingest.issues)?);
        return Ok(());
    }
    for issue in &ingest.issues {
        println!("{issue}");
    }
    println!(
        "{} trees loaded, {} rows rejected, {} values coerced",
        ingest.trees.len(),
        ingest.rejected_rows(),
        ingest.coerced_values()
    );
    Ok(())
}

#[derive(Serialize)]
struct AreaRow<'a> {
    name: &'a str,
    centroid: Option<[f64; 2]>,
    area_m2: f64,
}

fn cmd_areas(path: &Path) -> anyhow::Result<()> {
    let areas = load_areas(path)?;
    let rows: Vec<AreaRow<'_>> = areas
        .iter()
        .map(|a| {
            let poly = a.region.polygon();
            AreaRow {
                name: a.name.as_str(),
                centroid: poly.centroid().map(|c| [c.x(), c.y()]),
                area_m2: poly.iter().map(|p| p.geodesic_area_unsigned()).sum(),
            }
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn replay(
    context: SurveyContext,
    tracker: AreaTracker,
    source: DirTreeSource,
    centers: &[Point<f64>],
    json: bool,
) -> anyhow::Result<()> {
    let mut pipeline = ViewportPipeline::new(context, tracker, source);
    if !json {
        pipeline.subscribe(Box::new(SidebarPrinter::default()));
    }
    for &center in centers {
        match pipeline.on_viewport_changed(center) {
            Ok(Some(event)) if json => println!("{}", serde_json::to_string(&*event)?),
            Ok(_) => {}
            Err(err) => tracing::error!(%err, lon = center.x(), lat = center.y(), "refresh failed"),
        }
    }
    print_metrics(&pipeline.metrics().snapshot());
    Ok(())
}

async fn replay_background(
    context: SurveyContext,
    tracker: AreaTracker,
    source: DirTreeSource,
    centers: &[Point<f64>],
    json: bool,
) -> anyhow::Result<()> {
    let refresher = Refresher::spawn(context, tracker, source)?;
    let pending: Vec<_> = centers.iter().map(|&c| refresher.request(c)).collect();
    for p in pending {
        let ticket = p.ticket;
        if let RefreshOutcome::Failed(err) = p.outcome().await? {
            tracing::error!(%ticket, %err, "refresh failed");
        }
    }

    match refresher.latest() {
        Some(event) if json => println!("{}", serde_json::to_string(&*event)?),
        Some(event) => println!("#{}\n{}", event.generation, render_sidebar(&event.report)),
        None => println!("nothing published"),
    }
    let m = refresher.metrics();
    tracing::info!(
        published = m.counter(metrics::PUBLISHED),
        superseded = m.counter(metrics::SUPERSEDED),
        "background replay done"
    );
    print_metrics(&m.snapshot());
    Ok(())
}

fn print_metrics(snapshot: &[(&'static str, u64)]) {
    for (name, value) in snapshot {
        eprintln!("{name}: {value}");
    }
}
