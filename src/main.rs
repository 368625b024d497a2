mod config;
mod context;
mod device;
mod error;
mod host;
mod image_preload;
mod store;
mod sync;
mod transport;

#[cfg(test)]
mod testing;

use clap::{Args, Parser, Subcommand};
use config::{DeviceConfig, HostConfig};
use context::{parse_arg_pair, ArgBag};
use error::user_warning;
use host::CliContext;
use std::path::PathBuf;
use std::process::ExitCode;
use store::StoreTarget;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit status for an abort the operator can act on
const EXIT_USER_WARNING: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "ccaction", version, about = "Run change-control actions from the command line")]
struct Cli {
    /// Host configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raw action argument, may be repeated; typed flags take precedence
    #[arg(short = 'a', long = "arg", global = true, value_parser = parse_arg_pair)]
    args: Vec<(String, String)>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Copy an EOS image onto the device's flash
    ImagePreload(ImagePreloadArgs),
    /// Mirror change-control templates and action bundles to another server
    SyncTemplates(SyncTemplatesArgs),
}

#[derive(Args, Debug)]
struct ImagePreloadArgs {
    /// Image server `host[:port]`
    #[arg(long)]
    authority: Option<String>,
    /// Directory of the image on the server
    #[arg(long)]
    path: Option<String>,
    /// Image file name
    #[arg(long)]
    eos: Option<String>,
    /// VRF the copy runs in
    #[arg(long)]
    vrf: Option<String>,
    /// Device eAPI address, overrides the config file
    #[arg(long)]
    device: Option<String>,
    #[arg(long, default_value = "admin")]
    device_user: String,
    #[arg(long, env = "CCACTION_DEVICE_PASSWORD", default_value = "")]
    device_password: String,
}

#[derive(Args, Debug)]
struct SyncTemplatesArgs {
    /// Destination server `host:port`
    #[arg(long)]
    dst: Option<String>,
    #[arg(long)]
    dst_user: Option<String>,
    #[arg(long, env = "CCACTION_DST_PASSWORD")]
    dst_password: Option<String>,
    /// Local store `host:port`, overrides the config file
    #[arg(long)]
    source: Option<String>,
    #[arg(long, requires = "source")]
    source_token: Option<PathBuf>,
    #[arg(long, requires = "source")]
    source_ca: Option<PathBuf>,
    /// Directory for the token, certificate and backups
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

/// Merge `--arg` pairs with typed flags; a set flag replaces the raw pair
fn merge_args(raw: Vec<(String, String)>, typed: Vec<(&str, Option<String>)>) -> ArgBag {
    let typed = typed
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)));
    raw.into_iter().chain(typed).collect()
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };

    match cli.action {
        Action::ImagePreload(flags) => {
            let args = merge_args(
                cli.args,
                vec![
                    ("authority", flags.authority),
                    ("path", flags.path),
                    ("eos", flags.eos),
                    ("vrf", flags.vrf),
                ],
            );
            let device = match flags.device {
                Some(address) => Some(DeviceConfig::new(
                    address,
                    flags.device_user,
                    flags.device_password,
                )),
                None => config.device,
            };

            let mut ctx = CliContext::new(args);
            match device {
                Some(device) => ctx = ctx.with_device(&device)?,
                None => warn!("No device configured"),
            }
            info!("Running image preload");
            image_preload::run(&ctx).await
        }
        Action::SyncTemplates(flags) => {
            let args = merge_args(
                cli.args,
                vec![
                    ("dst", flags.dst),
                    ("dstUser", flags.dst_user),
                    ("dstPassword", flags.dst_password),
                ],
            );
            let source = match flags.source {
                Some(address) => {
                    let mut target = StoreTarget::new(address);
                    target.token_file = flags.source_token;
                    target.ca_file = flags.source_ca;
                    Some(target)
                }
                None => config.source_store,
            };
            let mut settings = config.sync;
            if let Some(work_dir) = flags.work_dir {
                settings.work_dir = work_dir;
            }

            let mut ctx = CliContext::new(args);
            match source {
                Some(target) => ctx = ctx.with_source_store(&target).await?,
                None => warn!("No local store configured"),
            }
            info!("Running template sync, work dir {}", settings.work_dir.display());
            sync::run(&ctx, settings).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match user_warning(&err) {
            Some(warning) => {
                warn!("{}", warning.message());
                ExitCode::from(EXIT_USER_WARNING)
            }
            None => {
                error!("{:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_typed_flags_override_raw_args() {
        let cli = Cli::try_parse_from([
            "ccaction",
            "image-preload",
            "-a",
            "vrf=default",
            "--arg",
            "eos=EOS-old.swi",
            "--eos",
            "EOS-4.30.swi",
            "--authority",
            "x.example.com",
        ])
        .expect("parse failed");

        let Action::ImagePreload(flags) = cli.action else {
            panic!("wrong subcommand");
        };
        let args = merge_args(
            cli.args,
            vec![
                ("authority", flags.authority),
                ("path", flags.path),
                ("eos", flags.eos),
                ("vrf", flags.vrf),
            ],
        );
        assert_eq!(args.get("eos"), Some("EOS-4.30.swi"));
        assert_eq!(args.get("vrf"), Some("default"));
        assert_eq!(args.get("authority"), Some("x.example.com"));
        assert_eq!(args.get("path"), None);
    }

    #[test]
    fn test_source_token_requires_source() {
        let orphan_token = ["ccaction", "sync-templates", "--source-token", "/tmp/t"];
        assert!(Cli::try_parse_from(orphan_token).is_err());
        let with_source = ["ccaction", "sync-templates", "--source", "127.0.0.1:9900"];
        assert!(Cli::try_parse_from(with_source).is_ok());
    }

    #[test]
    fn test_bad_arg_pair_rejected() {
        assert!(Cli::try_parse_from(["ccaction", "-a", "novalue", "image-preload"]).is_err());
    }
}
