//! Command-line hearing loop: plays the communications microphone through the
//! headset until stdin closes.
//!
//! Commands on stdin: a number sets the gain, `+`/`-` step it, `d` prints
//! diagnostics, `q` quits.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use audio_loopback_core::LoopbackConfiguration;

#[derive(Parser, Debug)]
#[command(name = "hearing-loop", about = "Real-time microphone to headset loopback")]
struct Args {
    /// Initial gain, 0.0 to 8.0
    #[arg(short, long, default_value_t = 1.0)]
    gain: f32,

    /// JSON configuration file; missing fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the Bluetooth headset preset (four times the minimum buffer)
    #[arg(long)]
    bluetooth: bool,

    /// Refuse to start unless a hands-free headset carries the audio
    #[arg(long)]
    require_bluetooth: bool,

    /// Print connected output devices and buffer sizes, then exit
    #[arg(long)]
    list_devices: bool,
}

fn load_configuration(args: &Args) -> Result<LoopbackConfiguration, String> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
            LoopbackConfiguration::from_json(&json)?
        }
        None if args.bluetooth => LoopbackConfiguration::bluetooth_headset(),
        None => LoopbackConfiguration::default(),
    };
    if args.require_bluetooth {
        config.require_bluetooth = true;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match load_configuration(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    platform::run(&args, config)
}

#[cfg(target_os = "windows")]
mod platform {
    use std::io::BufRead;
    use std::process::ExitCode;
    use std::sync::Arc;

    use audio_loopback_core::{EngineError, LoopbackConfiguration, LoopbackControl, LoopbackDelegate, LoopbackEngine, SessionState};
    use audio_loopback_windows::{WasapiBackend, WindowsRouting};

    use super::Args;

    const GAIN_STEP: f32 = 0.25;

    struct ConsoleDelegate;

    impl LoopbackDelegate for ConsoleDelegate {
        fn on_state_changed(&self, state: SessionState) {
            log::info!("Loopback {}", state);
        }

        fn on_error(&self, error: &EngineError) {
            log::error!("Loopback stopped: {}", error);
        }
    }

    pub fn run(args: &Args, config: LoopbackConfiguration) -> ExitCode {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => log::debug!("Configuration:\n{}", json),
            Err(e) => log::debug!("Configuration not printable: {}", e),
        }

        let engine = match LoopbackEngine::with_configuration(WasapiBackend::new(), Arc::new(WindowsRouting::new()), config) {
            Ok(engine) => engine,
            Err(e) => {
                log::error!("{}", e);
                return ExitCode::FAILURE;
            }
        };
        engine.set_delegate(Arc::new(ConsoleDelegate));
        let control = LoopbackControl::new(engine);

        for device in control.list_connected_devices() {
            println!("output: {}", device);
        }
        if let Some(buffers) = control.optimal_buffer_config() {
            println!("buffer: min {} samples, using {}", buffers.min_samples, buffers.optimal_samples);
        }
        if args.list_devices {
            return ExitCode::SUCCESS;
        }

        if !control.start(args.gain) {
            return ExitCode::FAILURE;
        }
        println!("Loopback running at gain {:.2}. Enter a gain, +, -, d or q.", control.engine().gain());

        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let current = control.engine().gain();
            match line.trim() {
                "q" => break,
                "+" => control.set_gain(current + GAIN_STEP),
                "-" => control.set_gain(current - GAIN_STEP),
                "d" => println!("{:#?}", control.engine().diagnostics()),
                other => match other.parse::<f32>() {
                    Ok(gain) => control.set_gain(gain),
                    Err(_) => println!("unknown command: {}", other),
                },
            }
            if !control.is_running() {
                log::warn!("Loopback is no longer running");
                break;
            }
            println!("gain {:.2}", control.engine().gain());
        }

        control.stop();
        ExitCode::SUCCESS
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use std::process::ExitCode;

    use audio_loopback_core::LoopbackConfiguration;

    use super::Args;

    pub fn run(_args: &Args, _config: LoopbackConfiguration) -> ExitCode {
        log::error!("hearing-loop needs the Windows WASAPI backend");
        ExitCode::FAILURE
    }
}
