use std::env;
use std::path::PathBuf;
use std::process;

use techno_enhancer::audio_clean::{BandLayout, Pipeline, PipelineOptions};
use techno_enhancer::services::config::AppConfig;

const DEFAULT_CONFIG: &str = "techno-enhancer.json";

struct Args {
    video: PathBuf,
    options: PipelineOptions,
    layout: Option<BandLayout>,
    config: PathBuf,
    output_dir: PathBuf,
    timeout_secs: Option<u64>,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} <video> [--preset soft|normal|intense] [--preview] [--vertical] \
         [--layout four-band|three-band] [--config FILE] [--output-dir DIR] [--timeout SECS]",
        program
    )
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let program = args.first().map(String::as_str).unwrap_or("techno-enhancer");
    let mut video = None;
    let mut options = PipelineOptions::default();
    let mut layout = None;
    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut output_dir = PathBuf::from(".");
    let mut timeout_secs = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} needs a value\n{}", flag, usage(program)))
        };

        match arg.as_str() {
            "--preset" => options.preset = value("--preset")?,
            "--preview" => options.preview_audio_only = true,
            "--vertical" => options.convert_vertical = true,
            "--layout" => layout = Some(value("--layout")?.parse::<BandLayout>()?),
            "--config" => config = PathBuf::from(value("--config")?),
            "--output-dir" => output_dir = PathBuf::from(value("--output-dir")?),
            "--timeout" => {
                let secs = value("--timeout")?;
                timeout_secs = Some(
                    secs.parse::<u64>()
                        .map_err(|_| format!("Invalid timeout '{}'", secs))?,
                );
            }
            "-h" | "--help" => return Err(usage(program)),
            flag if flag.starts_with("--") => {
                return Err(format!("Unknown option {}\n{}", flag, usage(program)))
            }
            path if video.is_none() => video = Some(PathBuf::from(path)),
            extra => return Err(format!("Unexpected argument '{}'\n{}", extra, usage(program))),
        }
    }

    let video = video.ok_or_else(|| usage(program))?;

    Ok(Args {
        video,
        options,
        layout,
        config,
        output_dir,
        timeout_secs,
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = env::args().collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            process::exit(2);
        }
    };

    if !args.video.exists() {
        eprintln!("Error: File not found: {}", args.video.display());
        process::exit(1);
    }

    let mut config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };

    if let Some(layout) = args.layout {
        config.layout = layout;
        config.presets = None;
    }
    if let Some(secs) = args.timeout_secs {
        config.ffmpeg.timeout_secs = secs;
    }

    let pipeline = Pipeline::from_config(&config);

    match pipeline.run(&args.video, &args.options, &args.output_dir) {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                log::error!("Failed to serialize result: {}", e);
                process::exit(1);
            }
        },
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("techno-enhancer")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults() {
        let args = parse_args(&argv(&["clip.mp4"])).unwrap();
        assert_eq!(args.video, PathBuf::from("clip.mp4"));
        assert_eq!(args.options, PipelineOptions::default());
        assert_eq!(args.layout, None);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG));
        assert_eq!(args.timeout_secs, None);
    }

    #[test]
    fn test_all_flags() {
        let args = parse_args(&argv(&[
            "--preset",
            "intense",
            "clip.mp4",
            "--preview",
            "--vertical",
            "--layout",
            "three-band",
            "--output-dir",
            "out",
            "--timeout",
            "30",
        ]))
        .unwrap();

        assert_eq!(args.options.preset, "intense");
        assert!(args.options.preview_audio_only);
        assert!(args.options.convert_vertical);
        assert_eq!(args.layout, Some(BandLayout::ThreeBand));
        assert_eq!(args.output_dir, PathBuf::from("out"));
        assert_eq!(args.timeout_secs, Some(30));
    }

    #[test]
    fn test_bad_input() {
        assert!(parse_args(&argv(&[])).is_err());
        assert!(parse_args(&argv(&["clip.mp4", "--preset"])).is_err());
        assert!(parse_args(&argv(&["clip.mp4", "--layout", "five-band"])).is_err());
        assert!(parse_args(&argv(&["clip.mp4", "--timeout", "soon"])).is_err());
        assert!(parse_args(&argv(&["clip.mp4", "--loud"])).is_err());
        assert!(parse_args(&argv(&["a.mp4", "b.mp4"])).is_err());
    }
}
