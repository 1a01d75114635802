use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use cutline_profiles::{
    ProfileParams, ProfileRepository, ProfileWatcher, RepositoryConfig, display_aspect_for,
};
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Debug, Parser)]
#[command(name = "cutline-profiles", version, about = "Inspect available video profiles")]
struct Cli {
    /// Repository config file (JSON)
    #[arg(long, global = true, env = "CUTLINE_PROFILES_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of built-in MLT profiles
    #[arg(long, global = true)]
    mlt_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every valid profile, sorted by description
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show the parameters of one profile
    Show { key: String },
    /// List the distinct frame rates on offer
    Fps,
    /// Find a profile with the given parameters
    Match(MatchArgs),
    /// Keep the repository refreshed as profile files change
    Watch,
}

#[derive(Debug, Args)]
struct MatchArgs {
    #[arg(long)]
    width: u32,
    #[arg(long)]
    height: u32,
    #[arg(long)]
    fps_num: u32,
    #[arg(long, default_value_t = 1)]
    fps_den: u32,
    #[arg(long, default_value_t = 1)]
    sar_num: u32,
    #[arg(long, default_value_t = 1)]
    sar_den: u32,
    /// Derived from the frame size and pixel aspect when omitted
    #[arg(long, requires = "dar_den")]
    dar_num: Option<u32>,
    #[arg(long, requires = "dar_num")]
    dar_den: Option<u32>,
    #[arg(long)]
    interlaced: bool,
}

impl MatchArgs {
    fn params(&self) -> anyhow::Result<ProfileParams> {
        let (display_aspect_num, display_aspect_den) = match (self.dar_num, self.dar_den) {
            (Some(num), Some(den)) => (num, den),
            _ => display_aspect_for(self.width, self.height, self.sar_num, self.sar_den)
                .with_context(|| {
                    format!(
                        "Display aspect of {}x{} at {}/{} is out of range",
                        self.width, self.height, self.sar_num, self.sar_den
                    )
                })?,
        };
        Ok(ProfileParams {
            width: self.width,
            height: self.height,
            frame_rate_num: self.fps_num,
            frame_rate_den: self.fps_den,
            progressive: !self.interlaced,
            sample_aspect_num: self.sar_num,
            sample_aspect_den: self.sar_den,
            display_aspect_num,
            display_aspect_den,
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                ),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RepositoryConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RepositoryConfig::load(),
    };
    if let Some(path) = cli.mlt_path {
        config.mlt_profiles_path = Some(path);
    }

    let repository = ProfileRepository::init_global(&config);

    match cli.command {
        Command::List { json } => {
            let profiles = repository.all_profiles();
            if json {
                println!("{}", serde_json::to_string_pretty(&profiles)?);
            } else if profiles.is_empty() {
                tracing::warn!("No profiles found");
            } else {
                let width = profiles.iter().map(|(d, _)| d.len()).max().unwrap_or(0);
                for (description, key) in &profiles {
                    println!("{description:<width$}  {key}");
                }
            }
        }
        Command::Show { key } => {
            let Some(profile) = repository.profile(&key) else {
                bail!("No profile with key {key:?}");
            };
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::Fps => {
            for fps in repository.all_frame_rates() {
                println!("{fps:.3}");
            }
        }
        Command::Match(args) => {
            let params = args.params()?;
            match repository.find_matching_profile(&params) {
                Some(key) => println!("{key}"),
                None => bail!("No matching profile"),
            }
        }
        Command::Watch => {
            let watcher = ProfileWatcher::spawn(repository.clone())
                .context("Failed to start profile watcher")?;
            if watcher.roots().is_empty() {
                bail!("No profile directories to watch");
            }
            tracing::info!(
                "Watching {} directories, {} profiles loaded",
                watcher.roots().len(),
                repository.len()
            );
            loop {
                std::thread::park();
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_args(extra: &[&str]) -> MatchArgs {
        let mut argv = vec!["cutline-profiles", "match"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Match(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_match_derives_reduced_display_aspect() {
        let args = match_args(&["--width", "720", "--height", "576", "--fps-num", "25"]);
        let params = args.params().unwrap();
        assert_eq!((params.display_aspect_num, params.display_aspect_den), (5, 4));

        let args = match_args(&[
            "--width", "720", "--height", "576", "--fps-num", "25", "--sar-num", "16",
            "--sar-den", "15",
        ]);
        let params = args.params().unwrap();
        assert_eq!((params.display_aspect_num, params.display_aspect_den), (4, 3));
    }

    #[test]
    fn test_match_explicit_display_aspect_is_kept() {
        let args = match_args(&[
            "--width", "1920", "--height", "1080", "--fps-num", "25", "--dar-num", "32",
            "--dar-den", "18",
        ]);
        let params = args.params().unwrap();
        assert_eq!((params.display_aspect_num, params.display_aspect_den), (32, 18));
    }

    #[test]
    fn test_match_oversized_display_aspect_is_an_error() {
        let args = match_args(&[
            "--width", "4000000000", "--height", "1", "--fps-num", "25", "--sar-num",
            "4000000000",
        ]);
        let err = args.params().unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
