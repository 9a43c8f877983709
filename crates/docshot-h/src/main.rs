use anyhow::bail;
use clap::Parser;
use docshot_core::config::{AuthConfig, DocshotConfig};
use docshot_core::protocol::Chain;
use docshot_engine::config::ConfigLoader;
use docshot_engine::delay::HumanLikeDelays;
use docshot_engine::driver::Driver;
use docshot_engine::dispatch::Dispatcher;
use docshot_engine::orchestrator::ChainRunner;
use docshot_engine::session::{self, SessionManager};
use docshot_h::cdp::LaunchOptions;
use docshot_h::driver::HeadlessDriver;
use std::path::PathBuf;
use tracing::{error, info, warn};
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scripted documentation screenshots", long_about = None)]
struct Args {
    /// Chain configuration file (defaults to ./docshot.yaml, then
    /// ~/.docshot/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Launch the browser with a visible window
    #[arg(long)]
    visible: bool,

    /// Run only the chain with this name
    #[arg(long)]
    chain: Option<String>,

    /// Skip session establishment (public targets)
    #[arg(long)]
    no_auth: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path).await?,
        None => ConfigLoader::load_default().await?,
    };
    apply_env_credentials(&mut config);

    let chains: Vec<Chain> = config
        .chains
        .iter()
        .filter(|chain| args.chain.as_deref().is_none_or(|name| chain.name == name))
        .cloned()
        .collect();
    if chains.is_empty() {
        bail!("no chains to run");
    }

    let auth = if args.no_auth { None } else { config.auth.clone() };

    // Refresh the session cache once before the chains fan out, so no two
    // chain tasks race the cache file with concurrent interactive logins.
    if let Some(auth) = &auth {
        refresh_session(auth, &config.base_url, args.visible).await?;
    }

    let mut handles = Vec::new();
    for chain in chains {
        let base_url = config.base_url.clone();
        let output_dir = config.output_dir.clone();
        let auth = auth.clone();
        let visible = args.visible;
        let name = chain.name.clone();
        let handle = tokio::spawn(async move {
            run_chain(chain, base_url, output_dir, auth, visible).await
        });
        handles.push((name, handle));
    }

    let mut failed = 0usize;
    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(())) => info!(chain = %name, "chain finished"),
            Ok(Err(e)) => {
                failed += 1;
                error!(chain = %name, "chain failed: {e:#}");
            }
            Err(e) => {
                failed += 1;
                error!(chain = %name, "chain task panicked: {e}");
            }
        }
    }

    if failed > 0 {
        bail!("{failed} chain(s) failed");
    }
    Ok(())
}

fn apply_env_credentials(config: &mut DocshotConfig) {
    if let Some(auth) = &mut config.auth {
        if let Ok(email) = std::env::var("DOCSHOT_EMAIL") {
            auth.email = email;
        }
        if let Ok(password) = std::env::var("DOCSHOT_PASSWORD") {
            auth.password = password;
        }
    }
}

/// Authenticate once up front so every chain task starts from a valid cache.
async fn refresh_session(auth: &AuthConfig, base_url: &Url, visible: bool) -> anyhow::Result<()> {
    let cached = session::load_cached_state(&auth.storage_state_path).await;
    let options = LaunchOptions {
        visible,
        ..Default::default()
    };
    let mut driver = HeadlessDriver::launch(options, cached).await?;
    let page = driver.page()?;

    let delays = HumanLikeDelays::default();
    let manager = SessionManager::new(auth, base_url, &delays);
    let result = manager.establish(&driver, &page).await;
    if let Err(e) = driver.close().await {
        warn!("error closing session-refresh browser: {e}");
    }
    let method = result?;
    info!(?method, "session established");
    Ok(())
}

async fn run_chain(
    chain: Chain,
    base_url: Url,
    output_dir: PathBuf,
    auth: Option<AuthConfig>,
    visible: bool,
) -> anyhow::Result<()> {
    let cached = match &auth {
        Some(auth) => session::load_cached_state(&auth.storage_state_path).await,
        None => None,
    };
    let options = LaunchOptions {
        visible,
        ..Default::default()
    };
    let mut driver = HeadlessDriver::launch(options, cached).await?;
    let page = match driver.page() {
        Ok(page) => page,
        Err(e) => {
            let _ = driver.close().await;
            return Err(e.into());
        }
    };

    if let Some(auth) = &auth {
        let delays = HumanLikeDelays::default();
        let manager = SessionManager::new(auth, &base_url, &delays);
        if let Err(e) = manager.establish(&driver, &page).await {
            let _ = driver.close().await;
            return Err(e.into());
        }
    }

    let runner = ChainRunner::new(driver, page, base_url, Dispatcher::new(output_dir));
    runner.run_to_completion(&chain).await?;
    Ok(())
}
