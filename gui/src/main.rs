mod app;
mod decimate;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use eframe::egui;

use pulse_visualizer::daq::Backend;
use pulse_visualizer::{AcquisitionSession, AppConfig};

use app::PulseVisualizerApp;

#[derive(Parser, Debug)]
#[command(name = "pulse-visualizer")]
#[command(about = "Acquire analog voltage frames and show waveform and spectrum", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// simulated, nidaqmx or soundcard
    #[arg(short = 'b', long)]
    backend: Option<Backend>,

    /// Physical channel, e.g. Dev1/ai1
    #[arg(long)]
    channel: Option<String>,

    /// Sample clock rate in Hz
    #[arg(short = 'r', long)]
    rate: Option<f64>,

    /// Samples per acquisition
    #[arg(short = 'n', long)]
    samples: Option<usize>,

    /// Acquire one frame per START instead of repeating
    #[arg(long)]
    single: bool,

    /// Write the default configuration to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,

    /// List sound-card input devices and exit
    #[cfg(feature = "soundcard")]
    #[arg(long)]
    list_devices: bool,

    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(backend) = self.backend {
            config.device.backend = backend;
        }
        if let Some(channel) = &self.channel {
            config.acquisition.physical_channel = channel.clone();
        }
        if let Some(rate) = self.rate {
            config.acquisition.sample_rate = rate;
        }
        if let Some(samples) = self.samples {
            config.acquisition.samples_per_channel = samples;
        }
        if self.single {
            config.acquisition.repeat = false;
        }
    }
}

#[cfg(feature = "soundcard")]
fn list_devices() -> anyhow::Result<()> {
    let devices = pulse_visualizer::daq::soundcard::list_input_devices()
        .context("listing input devices")?;
    if devices.is_empty() {
        println!("No input devices found");
    }
    for device in devices {
        println!(
            "{}  ({} Hz, {} channels)",
            device.name, device.sample_rate, device.channels
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    #[cfg(feature = "soundcard")]
    if args.list_devices {
        return list_devices();
    }

    if let Some(path) = &args.write_default_config {
        AppConfig::default()
            .save(path)
            .with_context(|| format!("writing default configuration to {}", path.display()))?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    args.apply(&mut config);

    let session = AcquisitionSession::new(config).context("opening the acquisition task")?;
    log::info!(
        "Ready: {} on {}",
        session.task_info().name,
        session.task_info().physical_channel
    );

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 600.0])
            .with_min_inner_size([700.0, 400.0])
            .with_title("Pulse Visualizer"),
        ..Default::default()
    };

    eframe::run_native(
        "Pulse Visualizer",
        native_options,
        Box::new(move |cc| Ok(Box::new(PulseVisualizerApp::new(cc, session)))),
    )
    .map_err(|e| anyhow::anyhow!("eframe error: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "pulse-visualizer",
            "--backend",
            "simulated",
            "--channel",
            "Dev2/ai0",
            "-r",
            "2000",
            "-n",
            "500",
            "--single",
            "-vv",
        ]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.device.backend, Backend::Simulated);
        assert_eq!(config.acquisition.physical_channel, "Dev2/ai0");
        assert_eq!(config.acquisition.sample_rate, 2000.0);
        assert_eq!(config.acquisition.samples_per_channel, 500);
        assert!(!config.acquisition.repeat);
        assert_eq!(args.verbose, 2);
    }

    #[cfg(feature = "soundcard")]
    #[test]
    fn test_list_devices_flag() {
        let args = Args::parse_from(["pulse-visualizer", "--list-devices"]);
        assert!(args.list_devices);
        assert!(!Args::parse_from(["pulse-visualizer"]).list_devices);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Args::try_parse_from(["pulse-visualizer", "--backend", "scope"]).is_err());
    }
}
