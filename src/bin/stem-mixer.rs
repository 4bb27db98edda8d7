use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use stem_mixer_core::{
    AssetId, Orchestrator, PlaybackEngine, ServiceConfig, Stem, StemMap, TrackLoader,
};

#[derive(Parser)]
#[command(name = "stem-mixer")]
#[command(about = "Remix the separated stems of a remote audio-separation service", long_about = None)]
#[command(version)]
struct Cli {
    /// Service base URL (defaults to $STEM_MIXER_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct GainArgs {
    #[arg(long, default_value_t = 1.0)]
    vocals: f32,

    #[arg(long, default_value_t = 1.0)]
    drums: f32,

    #[arg(long, default_value_t = 1.0)]
    bass: f32,

    #[arg(long, default_value_t = 1.0)]
    other: f32,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file (or extract a video's audio), wait for separation,
    /// then write the mixed-down WAV
    Process {
        /// Local audio file to upload
        #[arg(short, long, conflicts_with = "video_id")]
        input: Option<PathBuf>,

        /// Video id to extract audio from instead of a local file
        #[arg(long)]
        video_id: Option<String>,

        /// Account id used to namespace the upload
        #[arg(short, long)]
        user: Option<String>,

        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        #[command(flatten)]
        gains: GainArgs,

        #[arg(short, long)]
        quiet: bool,
    },

    /// Mix down an already-processed asset
    Mix {
        #[arg(short, long)]
        asset: String,

        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        #[command(flatten)]
        gains: GainArgs,
    },

    /// Play an already-processed asset through the default output device
    Play {
        #[arg(short, long)]
        asset: String,

        #[command(flatten)]
        gains: GainArgs,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stem_mixer_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match service_config(cli.api_url.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Process {
            input,
            video_id,
            user,
            output,
            gains,
            quiet,
        } => handle_process(config, input, video_id, user, output, gains, quiet),
        Commands::Mix {
            asset,
            output,
            gains,
        } => handle_mix(config, asset, output, gains),
        Commands::Play { asset, gains } => handle_play(config, asset, gains),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn service_config(api_url: Option<&str>) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    match api_url {
        Some(url) => Ok(ServiceConfig::new(url.parse()?)),
        None => Ok(ServiceConfig::from_env()?),
    }
}

fn handle_process(
    config: ServiceConfig,
    input: Option<PathBuf>,
    video_id: Option<String>,
    user: Option<String>,
    output: PathBuf,
    gains: GainArgs,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = Orchestrator::new(config.clone())?;

    let asset = match (&input, &video_id) {
        (Some(path), None) => {
            if !path.exists() {
                return Err(format!("Input file not found: {}", path.display()).into());
            }
            orchestrator.submit_file(path, user.as_deref())?
        }
        (None, Some(id)) => {
            if !quiet {
                eprintln!("🎬 Extracting audio for video {id}");
            }
            let (bytes, suggested) = orchestrator.extract_video(id)?;
            let name = match &user {
                Some(u) => format!("{u}_{suggested}"),
                None => suggested,
            };
            orchestrator.submit_bytes(bytes, &name)?
        }
        _ => return Err("Provide exactly one of --input or --video-id".into()),
    };

    if !quiet {
        eprintln!("🎵 Uploaded as {asset}");
    }

    for event in orchestrator.watch_progress(&asset)? {
        let event = event?;
        if !quiet {
            eprint!("\rSeparating: {:>3}%", event.progress);
            if event.progress >= 100 {
                eprintln!();
            }
            let _ = std::io::stderr().flush();
        }
    }

    write_mixdown(config, asset, output, gains, quiet)
}

fn handle_mix(
    config: ServiceConfig,
    asset: String,
    output: PathBuf,
    gains: GainArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    write_mixdown(config, AssetId::new(asset), output, gains, false)
}

fn write_mixdown(
    config: ServiceConfig,
    asset: AssetId,
    output: PathBuf,
    gains: GainArgs,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let loader = TrackLoader::new(config)?;
    let tracks = loader.load_all(&asset)?;

    let mix = stem_mixer_core::mixdown(
        &tracks,
        &StemMap {
            vocals: gains.vocals,
            drums: gains.drums,
            bass: gains.bass,
            other: gains.other,
        },
    )?;

    fs::create_dir_all(&output)?;
    let path = output.join(asset.mixdown_filename());
    fs::write(&path, stem_mixer_core::encode_wav(&mix))?;

    if !quiet {
        eprintln!("✅ Wrote {}", path.display());
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

fn handle_play(
    config: ServiceConfig,
    asset: String,
    gains: GainArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let asset = AssetId::new(asset);
    let loader = TrackLoader::new(config)?;

    let mut engine = PlaybackEngine::with_default_output();
    engine.load(&loader, &asset)?;
    engine.set_gain(Stem::Vocals, gains.vocals);
    engine.set_gain(Stem::Drums, gains.drums);
    engine.set_gain(Stem::Bass, gains.bass);
    engine.set_gain(Stem::Other, gains.other);
    engine.play()?;

    eprintln!("▶ Playing {} ({:.1}s)", asset.display_name(), engine.duration_seconds());

    loop {
        std::thread::sleep(Duration::from_millis(200));
        let transport = engine.transport();
        eprint!(
            "\r{:>6.1}s / {:.1}s",
            transport.position_seconds, transport.duration_seconds
        );
        let _ = std::io::stderr().flush();
        if !transport.is_playing {
            eprintln!();
            break;
        }
    }
    Ok(())
}
