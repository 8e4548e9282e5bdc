use std::path::PathBuf;

use terravox_app::{default_config, load_config_from_path, AppConfig, AppContext, AppError};

/// Frames rendered after real-time erosion finishes.
const SETTLE_FRAMES: u32 = 2;

fn load_config(path: Option<PathBuf>) -> Result<AppConfig, AppError> {
    match path {
        Some(path) => Ok(load_config_from_path(&path)?),
        None => Ok(default_config()?),
    }
}

fn run(config_path: Option<PathBuf>, erode: bool) -> Result<(), AppError> {
    let config = load_config(config_path)?;
    let gpu = pollster::block_on(terravox_app::init_headless())?;
    let mut app = AppContext::new(gpu, config)?;

    if erode {
        app.start_realtime_erosion()?;
    }

    let mut frame = 0u32;
    let mut settle = SETTLE_FRAMES;
    while settle > 0 {
        let report = app.frame()?;
        if let Some(progress) = &report.erosion_progress {
            log::info!("frame {frame}: {progress}");
        }
        if let Some(voxelize) = &report.voxelize {
            log::debug!(
                "frame {frame}: voxelized in {} passes",
                voxelize.geometry_passes
            );
            if let Some(err) = &voxelize.gpu_error {
                log::warn!("frame {frame}: {err}");
            }
        }
        if !app.terrain().is_eroding() {
            settle -= 1;
        }
        frame += 1;
    }

    let (min, max) = app.terrain().heightfield().min_max();
    log::info!("Done after {frame} frames, heights in [{min:.3}, {max:.3}]");
    Ok(())
}

const USAGE: &str = "Usage: terravox-headless [--config path.ron] [--erode]";

#[derive(Debug, Default, PartialEq)]
struct Options {
    config_path: Option<PathBuf>,
    erode: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Options, String> {
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => match args.next() {
                Some(path) if !path.starts_with("--") => {
                    options.config_path = Some(PathBuf::from(path))
                }
                _ => return Err("--config requires a path".to_string()),
            },
            "--erode" => options.erode = true,
            other => return Err(format!("Unknown argument: {other}")),
        }
    }
    Ok(options)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("{msg}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(options.config_path, options.erode) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parses_config_and_erode() {
        let options = parse_args(args(&["--erode", "--config", "terrain.ron"])).expect("parse");
        assert!(options.erode);
        assert_eq!(options.config_path, Some(PathBuf::from("terrain.ron")));
    }

    #[test]
    fn test_config_without_path_is_rejected() {
        assert!(parse_args(args(&["--config"])).is_err());
        assert!(parse_args(args(&["--config", "--erode"])).is_err());
    }

    #[test]
    fn test_unknown_argument_is_rejected() {
        let err = parse_args(args(&["--fast"])).unwrap_err();
        assert!(err.contains("--fast"));
    }
}
