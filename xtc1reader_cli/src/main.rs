use clap::{value_parser, Arg, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use libxtc1reader::config::Config;
use libxtc1reader::process::{dump_events, process, xtc_info, FileSummary};

const DEFAULT_DUMP_EVENTS: u64 = 5;

fn make_template_config(path: &Path) {
    let config = Config::default();
    match config.write_config_file(path) {
        Ok(()) => log::info!("Done."),
        Err(e) => log::error!("Could not write template config: {e}"),
    }
}

fn report_summary(summary: &FileSummary) {
    match serde_yaml::to_string(summary) {
        Ok(yaml_str) => println!("{yaml_str}"),
        Err(e) => log::error!("Could not format summary: {e}"),
    }
    if let Some(err) = &summary.stream_error {
        log::warn!("The stream was cut short: {err}");
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("xtc1reader_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("info").about("Count events, container types and damage without decoding"),
        )
        .subcommand(
            Command::new("dump")
                .about("Print the container tree of the first events")
                .arg(
                    Arg::new("events")
                        .short('n')
                        .long("events")
                        .value_parser(value_parser!(u64))
                        .help("Number of events to print"),
                ),
        )
        .subcommand(Command::new("run").about("Decode events, assemble detector images and write them as .npy"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }

    // Parse the cli
    let config_path = match matches.get_one::<String>("path") {
        Some(path) => PathBuf::from(path),
        None => {
            log::error!("A configuration path is required");
            return;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("XTC Path: {}", config.xtc_path.to_string_lossy());
    match &config.run_number {
        Some(run) => log::info!("Run: {run}"),
        None => log::info!("Run: all"),
    }
    match &config.geometry_path {
        Some(path) => log::info!("Geometry Path: {}", path.to_string_lossy()),
        None => log::info!("Geometry Path: bundled Epix10ka2M"),
    }
    match &config.output_path {
        Some(path) => log::info!("Output Path: {}", path.to_string_lossy()),
        None => log::info!("Output Path: none, arrays are not written"),
    }
    log::info!("Max Depth: {}", config.max_depth);
    log::info!(
        "Pixel Scale: {} um, Tilt: {}",
        config.pixel_scale_size_um,
        config.do_tilt
    );

    if !config.does_xtc_path_exist() {
        log::error!(
            "XTC path {} does not exist!",
            config.xtc_path.to_string_lossy()
        );
        return;
    }

    match matches.subcommand() {
        Some(("dump", sub)) => {
            let n_events = sub
                .get_one::<u64>("events")
                .copied()
                .unwrap_or(DEFAULT_DUMP_EVENTS);
            match dump_events(&config, n_events) {
                Ok(text) => print!("{text}"),
                Err(e) => log::error!("Dump failed with error: {e}"),
            }
        }
        Some(("info", _)) => {
            let pb = pb_manager.add(ProgressBar::new(100));
            match xtc_info(&config, |progress| pb.set_position((progress * 100.0) as u64)) {
                Ok(summary) => report_summary(&summary),
                Err(e) => log::error!("Info failed with error: {e}"),
            }
            pb.finish();
        }
        _ => {
            // Setup the progress bar
            let pb = pb_manager.add(ProgressBar::new(100));
            let status = Arc::new(Mutex::new(0.0));
            let sent_status = status.clone();
            // Spawn the task!
            let handle = std::thread::spawn(move || process(config, sent_status));

            loop {
                std::thread::sleep(std::time::Duration::from_millis(250));
                match status.lock() {
                    Ok(stat) => pb.set_position((*stat * 100.0) as u64),
                    Err(e) => log::error!("{e}"),
                }

                if handle.is_finished() {
                    match handle.join() {
                        Ok(result) => match result {
                            Ok(summary) => {
                                log::info!("Successfully processed data!");
                                report_summary(&summary);
                            }
                            Err(e) => log::error!("Processing failed with error: {e}"),
                        },
                        Err(_) => log::error!("Failed to join processing task!"),
                    }
                    break;
                }
            }

            pb.finish();
        }
    }

    log::info!("Done.");
}
