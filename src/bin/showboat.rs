//! Drop-in `showboat` command: forwards every argument to the installed
//! binary and exits with its exit code.

use anyhow::Result;
use showboat_shim::error::{EXIT_LOCAL_FAILURE, ShimError, find_shim_error};
use showboat_shim::install::ShimConfig;
use showboat_shim::launcher::Launcher;
use showboat_shim::runtime::RealRuntime;
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let code = match launch().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:#}", e);
            find_shim_error(&e)
                .map(ShimError::exit_code)
                .unwrap_or(EXIT_LOCAL_FAILURE)
        }
    };
    std::process::exit(code);
}

async fn launch() -> Result<i32> {
    let install_root = std::env::var_os("SHOWBOAT_ROOT")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let config = ShimConfig::new(install_root, None, None);
    let launcher = Launcher::from_config(RealRuntime, &config)?;

    Ok(launcher.passthrough(std::env::args_os().skip(1)).await?)
}
