//! Setu - stereo SLAM bridge daemon
//!
//! # Usage
//!
//! ```bash
//! # With default config (setu.toml, then /etc/setu.toml)
//! cargo run --release
//!
//! # With custom config file
//! cargo run --release -- --config setu.toml
//! ```

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use setu::SetuConfig;
use setu::daemon::Daemon;
use setu::engine::create_engine;
use setu::io::streaming::{SensorServer, Serializer, ServiceServer, StreamPublisher};
use setu::utils::setup_ctrl_c_handler;

struct Args {
    config_path: Option<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut result = Args { config_path: None };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    result.config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    result
}

fn print_help() {
    println!("setu - stereo visual-inertial SLAM bridge");
    println!();
    println!("USAGE:");
    println!("    setu [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>     Configuration file (default: setu.toml)");
    println!("    -h, --help              Print help information");
    println!();
    println!("CONFIGURATION:");
    println!("    All settings are configured via the TOML config file:");
    println!("    - [transform] no_odometry_mode, publish_tf: transform mode");
    println!("    - [publish] map_data_period_ms, landmark_period_ms");
    println!("    - [network] sensor/publish/service addresses, wire_format");
    println!("    - [engine] type: tracking engine backend");
    println!();
    println!("THREADS:");
    println!("    - Tracking Thread: stereo pairing and engine calls");
    println!("    - Publisher Threads: map data and landmark cloud");
    println!("    - Query Thread: on-demand map queries");
}

/// Resolve configuration. Returns the config and where it came from.
fn load_config(args: &Args) -> (SetuConfig, Option<String>) {
    match &args.config_path {
        Some(path) => match SetuConfig::from_file(path) {
            Ok(cfg) => (cfg, Some(path.clone())),
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => {
            // Try default paths
            for path in ["setu.toml", "/etc/setu.toml"] {
                if let Ok(cfg) = SetuConfig::from_file(path) {
                    return (cfg, Some(path.to_string()));
                }
            }
            (SetuConfig::default(), None)
        }
    }
}

fn main() {
    let args = parse_args();
    let (config, source) = load_config(&args);

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .format(|buf, record| {
        writeln!(
            buf,
            "[{}] {} - {}",
            record.level(),
            record.target(),
            record.args()
        )
    })
    .init();

    log::info!("setu starting");
    match source {
        Some(path) => log::info!("  Config: {}", path),
        None => log::info!("  Config: built-in defaults"),
    }
    log::info!(
        "  Transform: {} ({})",
        if config.transform.no_odometry_mode {
            "direct"
        } else {
            "composed"
        },
        if config.transform.publish_tf {
            "enabled"
        } else {
            "disabled"
        }
    );
    log::info!("  Engine: {}", config.engine.engine_type);

    let running = match setup_ctrl_c_handler() {
        Ok(running) => running,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&config, running.clone()) {
        running.store(false, Ordering::Relaxed);
        log::error!("Daemon error: {}", e);
        std::process::exit(1);
    }

    log::info!("setu shutdown complete");
}

fn run(config: &SetuConfig, running: Arc<AtomicBool>) -> setu::Result<()> {
    let engine = create_engine(&config.engine)?;
    let serializer = Serializer::new(config.network.wire_format)
        .with_max_frame_bytes(config.network.max_frame_bytes);

    let publisher = Arc::new(StreamPublisher::new(
        &config.network.publish_address,
        serializer.clone(),
        config.network.publish_queue_capacity,
    )?);

    let daemon = Daemon::spawn(config, engine, publisher.clone(), running.clone())?;

    let sensor_server = SensorServer::spawn(
        &config.network.sensor_address,
        serializer.clone(),
        daemon.router(),
        running.clone(),
    )?;
    let service_server = ServiceServer::spawn(
        &config.network.service_address,
        serializer,
        daemon.query_sender(),
        config.query.timeout_ms,
        running.clone(),
    )?;

    log::info!(
        "Bridge running (sensors {}, stream {}, queries {})",
        sensor_server.local_addr(),
        publisher.local_addr(),
        service_server.local_addr()
    );

    // Main thread just monitors the running flag
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    log::info!("Shutdown signal received, waiting for threads...");
    if sensor_server.join().is_err() {
        log::error!("Sensor server panicked");
    }
    if service_server.join().is_err() {
        log::error!("Service server panicked");
    }
    daemon.join();
    publisher.stop();

    Ok(())
}
