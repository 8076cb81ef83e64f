//! Run the avatar pipeline on a photo and write the result next to it.
//!
//! Usage:
//!   cargo run --example process_avatar -- <photo> [config.toml]
//!
//! Set `AVATARFRAME_LOG=debug` to see per-pass detection output.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use avatarframe::{AvatarConfig, AvatarProcessor, OutputFormat};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter =
        EnvFilter::try_from_env("AVATARFRAME_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let ext = match format {
        OutputFormat::Png => "png",
        OutputFormat::Webp => "webp",
    };
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "avatar".into());
    input.with_file_name(format!("{stem}_avatar.{ext}"))
}

fn main() -> Result<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let input = PathBuf::from(args.next().context("usage: process_avatar <photo> [config.toml]")?);
    let config = match args.next() {
        Some(path) => AvatarConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => AvatarConfig::default(),
    };

    let bytes = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
    let processor = AvatarProcessor::from_config(&config)?;
    let avatar = processor.process(&bytes)?;

    let output = output_path(&input, avatar.format);
    std::fs::write(&output, &avatar.data)
        .with_context(|| format!("writing {}", output.display()))?;

    let m = &avatar.metadata;
    println!(
        "{} -> {} ({}x{}, face_detected={}, crop_source={:?}, crop=({}, {}, {}x{}), {} bytes)",
        input.display(),
        output.display(),
        m.final_size.0,
        m.final_size.1,
        m.face_detected,
        m.crop_source,
        m.crop_region.x,
        m.crop_region.y,
        m.crop_region.width,
        m.crop_region.height,
        avatar.data.len(),
    );
    Ok(())
}
