//! stem-mixer command-line host
//!
//! Usage:
//!   stem-mixer import  <library> <song-id> --drums a.wav --bass b.wav ...
//!   stem-mixer render  <library> <song-id> -o mix.wav [--gain vocals=0.8] [--config mixer.json]
//!   stem-mixer inspect <file.wav>

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use stem_mixer_core::models::render::DEFAULT_MP3_BITRATE_KBPS;
use stem_mixer_core::processing::pcm::{decode_pcm16_stereo, encode_pcm16};
use stem_mixer_core::processing::wav_format::{parse_header, WAV_HEADER_SIZE};
use stem_mixer_core::storage::metadata::{metadata_path, read_metadata};
use stem_mixer_core::{
    DirectoryStemStore, MixerConfiguration, OfflineRenderer, RenderRequest, RenderTrack, StemSet, StemStore, TrackName,
};

#[derive(Parser)]
#[command(name = "stem-mixer", version, about = "Stem library import, mixdown and inspection")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import four WAV stems into a song directory
    Import {
        /// Library root
        library: PathBuf,
        /// Song/job identifier
        song_id: String,
        #[arg(long)]
        drums: Option<PathBuf>,
        #[arg(long)]
        bass: Option<PathBuf>,
        #[arg(long)]
        other: Option<PathBuf>,
        #[arg(long)]
        vocals: Option<PathBuf>,
        /// Song title stored in the manifest
        #[arg(long)]
        title: Option<String>,
    },
    /// Mix a stored song down to a WAV or MP3 file
    Render {
        library: PathBuf,
        song_id: String,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long, value_enum, default_value = "wav")]
        format: OutputFormat,
        /// Per-track gain, e.g. `vocals=0.8` (repeatable)
        #[arg(short, long = "gain", value_parser = parse_gain)]
        gains: Vec<(TrackName, f32)>,
        /// Seconds to render (default: song duration)
        #[arg(short, long)]
        duration: Option<f64>,
        /// Output sample rate for WAV (default: song rate)
        #[arg(long)]
        sample_rate: Option<u32>,
        /// MP3 bitrate in kbps
        #[arg(long, default_value_t = DEFAULT_MP3_BITRATE_KBPS)]
        bitrate: u32,
        /// Mixer configuration JSON supplying default track volumes
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the header of a rendered WAV file and its metadata sidecar
    Inspect { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Wav,
    Mp3,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match cli.command {
        Commands::Import {
            library,
            song_id,
            drums,
            bass,
            other,
            vocals,
            title,
        } => {
            let sources = [
                (TrackName::Drums, drums),
                (TrackName::Bass, bass),
                (TrackName::Other, other),
                (TrackName::Vocals, vocals),
            ];
            import_song(&library, &song_id, title, &sources)
        }
        Commands::Render {
            library,
            song_id,
            output,
            format,
            gains,
            duration,
            sample_rate,
            bitrate,
            config,
        } => {
            let config = match config {
                Some(path) => MixerConfiguration::from_path(&path)
                    .with_context(|| format!("failed to load {}", path.display()))?,
                None => MixerConfiguration::default(),
            };
            render_song(
                &library,
                &song_id,
                &output,
                format,
                &gains,
                &config,
                duration,
                sample_rate,
                bitrate,
            )
        }
        Commands::Inspect { file } => inspect(&file),
    }
}

fn parse_gain(arg: &str) -> Result<(TrackName, f32), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected TRACK=GAIN, got {:?}", arg))?;
    let track: TrackName = name.trim().parse()?;
    let gain: f32 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid gain {:?}: {}", value, e))?;
    if !gain.is_finite() {
        return Err(format!("gain must be finite, got {}", gain));
    }
    Ok((track, gain))
}

/// A WAV stem converted to interleaved 16-bit stereo.
struct ImportedStem {
    sample_rate: u32,
    frames: usize,
    pcm: Vec<u8>,
}

fn read_stem(path: &Path) -> Result<ImportedStem> {
    let reader = hound::WavReader::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = 2.0_f32.powi(spec.bits_per_sample as i32 - 1);
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let stereo: Vec<f32> = match spec.channels {
        1 => samples.iter().flat_map(|s| [*s, *s]).collect(),
        2 => samples,
        n => bail!("{}: {} channels, expected mono or stereo", path.display(), n),
    };

    Ok(ImportedStem {
        sample_rate: spec.sample_rate,
        frames: stereo.len() / 2,
        pcm: encode_pcm16(&stereo),
    })
}

fn import_song(
    library: &Path,
    song_id: &str,
    title: Option<String>,
    sources: &[(TrackName, Option<PathBuf>)],
) -> Result<()> {
    let mut sample_rate = None;
    let mut frames = 0usize;
    let mut stems = BTreeMap::new();

    for (track, path) in sources {
        let Some(path) = path else {
            log::warn!("No {} stem given; the track will fail to load", track);
            continue;
        };
        let stem = read_stem(path)?;
        match sample_rate {
            None => sample_rate = Some(stem.sample_rate),
            Some(rate) if rate != stem.sample_rate => bail!(
                "{} stem is {} Hz, other stems are {} Hz",
                track,
                stem.sample_rate,
                rate
            ),
            Some(_) => {}
        }
        log::info!("{}: {} frames from {}", track, stem.frames, path.display());
        frames = frames.max(stem.frames);
        stems.insert(*track, stem.pcm);
    }

    let Some(sample_rate) = sample_rate else {
        bail!("at least one stem is required");
    };

    let set = StemSet {
        song_id: Some(song_id.to_string()),
        title,
        sample_rate,
        duration_secs: frames as f64 / sample_rate as f64,
        stems,
    };
    let store = DirectoryStemStore::new(library);
    store.save_song(song_id, &set)?;

    println!(
        "Imported {} ({} tracks, {:.2}s at {} Hz) into {}",
        song_id,
        set.stems.len(),
        set.duration_secs,
        sample_rate,
        store.song_dir(song_id)?.display()
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn render_song(
    library: &Path,
    song_id: &str,
    output: &Path,
    format: OutputFormat,
    gains: &[(TrackName, f32)],
    config: &MixerConfiguration,
    duration: Option<f64>,
    sample_rate: Option<u32>,
    bitrate: u32,
) -> Result<()> {
    let store = DirectoryStemStore::new(library);
    let Some(set) = store.load_song(song_id)? else {
        bail!("song {} not found in {}", song_id, library.display());
    };

    let overrides: BTreeMap<TrackName, f32> = gains.iter().copied().collect();
    let mut tracks = Vec::new();
    for (track, pcm) in &set.stems {
        let buffer = decode_pcm16_stereo(pcm, set.sample_rate)
            .map_err(|e| anyhow::anyhow!("{} stem: {}", track, e))?;
        let gain = overrides
            .get(track)
            .copied()
            .unwrap_or(config.default_volume(*track) as f32);
        log::debug!("{} at gain {}", track, gain);
        tracks.push(RenderTrack::new(Arc::new(buffer), gain).with_label(track.as_str()));
    }

    let duration = duration.unwrap_or(set.duration_secs);
    let request = match format {
        OutputFormat::Wav => RenderRequest::wav(tracks, duration, sample_rate.unwrap_or(set.sample_rate)),
        OutputFormat::Mp3 => RenderRequest::mp3(tracks, duration, bitrate),
    };

    let meta = OfflineRenderer::new()
        .render_to_file(&request, output)
        .with_context(|| format!("failed to render {}", song_id))?;

    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}

fn inspect(file: &Path) -> Result<()> {
    let mut header = [0u8; WAV_HEADER_SIZE];
    File::open(file)
        .and_then(|mut f| f.read_exact(&mut header))
        .with_context(|| format!("failed to read header of {}", file.display()))?;
    let header = parse_header(&header)?;

    println!("file:            {}", file.display());
    println!("format tag:      {}", header.format_tag);
    println!("channels:        {}", header.spec.channels);
    println!("sample rate:     {}", header.spec.sample_rate);
    println!("bits per sample: {}", header.spec.bits_per_sample);
    println!("byte rate:       {}", header.byte_rate);
    println!("block align:     {}", header.block_align);
    println!("data size:       {}", header.data_size);
    println!("frames:          {}", header.frames());
    println!("duration:        {:.3}s", header.duration_secs());

    let sidecar = metadata_path(file);
    if sidecar.exists() {
        let meta = read_metadata(file)?;
        println!("metadata:        {}", sidecar.display());
        println!("{}", serde_json::to_string_pretty(&meta)?);
    }
    Ok(())
}
