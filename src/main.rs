//! Patter - A voice recorder for Linux
//!
//! This is the main entry point for the Patter application.

mod audio;
mod catalog;
mod cli;
mod models;
mod recorder;
mod settings;

use anyhow::Context;
use clap::Parser;
use log::info;
use std::io::BufRead;

use audio::{load_wav, AudioPlayer};
use cli::{Args, Command};
use recorder::Recorder;
use settings::Settings;

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments and initialize logging
    let args = Args::parse();
    cli::init_logging(&args);

    info!("Starting Patter voice recorder");

    let settings = Settings::load();

    match args.command {
        Command::Record { name } => record(&settings, name.as_deref()),
        Command::List => list(&settings),
        Command::Play { name } => play(&settings, &name),
    }
}

fn record(settings: &Settings, name: Option<&str>) -> anyhow::Result<()> {
    let mut recorder = Recorder::new(settings);

    let path = recorder.start(name)?;
    println!("Recording to {} - press Enter to stop", path.display());

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;

    let recording = recorder.stop()?;
    println!(
        "Saved {} ({:.1}s, {} Hz, {} ch)",
        recording.path.display(),
        recording.duration_seconds(),
        recording.sample_rate,
        recording.channels
    );
    Ok(())
}

fn list(settings: &Settings) -> anyhow::Result<()> {
    let recordings = catalog::list(&settings.recordings_dir)?;
    if recordings.is_empty() {
        println!("No recordings in {}", settings.recordings_dir.display());
        return Ok(());
    }

    for recording in recordings {
        let duration = recording
            .duration_seconds
            .map(|d| format!("{:>6.1}s", d))
            .unwrap_or_else(|| "     ?".to_string());
        println!(
            "{}  {}  {}",
            recording.modified.format("%Y-%m-%d %H:%M"),
            duration,
            recording.file_name
        );
    }
    Ok(())
}

fn play(settings: &Settings, name: &str) -> anyhow::Result<()> {
    let path = settings.recordings_dir.join(recorder::ensure_extension(name));
    let buffer = load_wav(&path)?;
    println!(
        "Playing {} ({:.1}s, {} Hz, {} ch)",
        path.display(),
        buffer.duration_seconds(),
        buffer.sample_rate,
        buffer.channels
    );

    let mut player = AudioPlayer::new();
    player.load(&buffer);
    player.play()?;
    player.wait()?;
    Ok(())
}
