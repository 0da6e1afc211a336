//! planetview command line entry point

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use pv_frontend::{
    DiagramOptions, StaticEphemeris, TrackerOptions, UniformTime, draw_moon_tracks,
    draw_planetary_view,
};

/// Planetary view and moon tracker diagrams as PostScript
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Draw the planet, moons, rings and stars at one instant
    View {
        /// Diagram options (RON)
        #[arg(short, long)]
        options: PathBuf,

        /// Body table (RON)
        #[arg(short, long)]
        ephemeris: PathBuf,

        /// Output file; PostScript goes to stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Plot moon offsets from the planet over a time range
    Track {
        /// Tracker options (RON)
        #[arg(short, long)]
        options: PathBuf,

        /// Body table (RON)
        #[arg(short, long)]
        ephemeris: PathBuf,

        /// Output file; PostScript goes to stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn open_output(path: Option<&Path>) -> anyhow::Result<(Box<dyn Write>, String)> {
    match path {
        Some(p) => {
            let file = File::create(p).with_context(|| format!("creating {}", p.display()))?;
            Ok((Box::new(BufWriter::new(file)), p.display().to_string()))
        }
        None => Ok((Box::new(std::io::stdout().lock()), "stdout".to_string())),
    }
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pv_frontend=info,pv_renderer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match args.command {
        Command::View {
            options,
            ephemeris,
            output,
        } => {
            let opts = DiagramOptions::load(&options)
                .with_context(|| format!("loading {}", options.display()))?;
            let table = StaticEphemeris::load(&ephemeris)
                .with_context(|| format!("loading {}", ephemeris.display()))?;
            let (out, name) = open_output(output.as_deref())?;
            tracing::info!("Drawing {} view into {}", opts.planet.name, name);
            let mut out = draw_planetary_view(out, &name, &opts, &table, &UniformTime)
                .context("drawing planetary view")?;
            out.flush()?;
        }
        Command::Track {
            options,
            ephemeris,
            output,
        } => {
            let opts = TrackerOptions::load(&options)
                .with_context(|| format!("loading {}", options.display()))?;
            let table = StaticEphemeris::load(&ephemeris)
                .with_context(|| format!("loading {}", ephemeris.display()))?;
            let (out, name) = open_output(output.as_deref())?;
            tracing::info!("Tracking {} moons of {} into {}", opts.moons.len(), opts.planet.name, name);
            let mut out = draw_moon_tracks(out, &name, &opts, &table, &UniformTime)
                .context("drawing moon tracker")?;
            out.flush()?;
        }
    }
    Ok(())
}
