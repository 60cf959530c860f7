use anyhow::Result;
use clap::Parser;
use showboat_shim::error::{EXIT_LOCAL_FAILURE, ShimError, find_shim_error};
use showboat_shim::install::{self, ShimConfig};
use showboat_shim::launcher::Launcher;
use showboat_shim::runtime::RealRuntime;
use std::ffi::OsString;
use std::path::PathBuf;

/// showboat-shim - installs and runs the showboat binary
///
/// Downloads the prebuilt showboat release for this platform and forwards
/// invocations to it.
///
/// Examples:
///   showboat-shim install            # Install the pinned showboat release
///   showboat-shim run -- --version   # Run showboat with arguments
#[derive(Parser, Debug)]
#[command(author, version = env!("SHOWBOAT_SHIM_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Install root directory (overrides defaults; also via SHOWBOAT_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "SHOWBOAT_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub install_root: Option<PathBuf>,

    /// Release download URL (defaults to the showboat GitHub releases)
    #[arg(
        long = "base-url",
        env = "SHOWBOAT_BASE_URL",
        value_name = "URL",
        global = true
    )]
    pub base_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Download and install the showboat binary
    Install(InstallArgs),

    /// Run the installed showboat binary, forwarding all arguments
    Run(RunArgs),

    /// Print the path of the installed showboat binary
    Path,

    /// Remove the installed showboat binary
    Uninstall,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Reinstall even if the same version is already present
    #[arg(long)]
    pub force: bool,

    /// Install this showboat version instead of the pinned one
    #[arg(long = "version-pin", value_name = "VERSION")]
    pub version_pin: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Arguments passed to showboat unchanged
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<OsString>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            find_shim_error(&e)
                .map(ShimError::exit_code)
                .unwrap_or(EXIT_LOCAL_FAILURE)
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> Result<i32> {
    let runtime = RealRuntime;

    match cli.command {
        Commands::Install(args) => {
            let config = ShimConfig::new(cli.install_root, cli.base_url, args.version_pin);
            install::install(runtime, config, args.force).await?;
        }
        Commands::Run(args) => {
            let config = ShimConfig::new(cli.install_root, cli.base_url, None);
            let launcher = Launcher::from_config(runtime, &config)?;
            return Ok(launcher.passthrough(args.args).await?);
        }
        Commands::Path => {
            let config = ShimConfig::new(cli.install_root, cli.base_url, None);
            let launcher = Launcher::from_config(runtime, &config)?;
            if !launcher.is_installed() {
                return Err(ShimError::BinaryNotInstalled {
                    path: launcher.binary_path().to_path_buf(),
                }
                .into());
            }
            println!("{}", launcher.binary_path().display());
        }
        Commands::Uninstall => {
            let config = ShimConfig::new(cli.install_root, cli.base_url, None);
            if install::uninstall(runtime, config)? {
                println!("showboat uninstalled.");
            } else {
                println!("showboat is not installed.");
            }
        }
    }
    Ok(0)
}
