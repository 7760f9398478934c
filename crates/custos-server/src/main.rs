//! Custos Server - Entry point

use std::path::PathBuf;

use anyhow::Context;
use custos_authz::Custos;
use custos_config::{ConfigLoader, CustosConfig};
use custos_core::{ServiceName, User, UserId};
use custos_store::RoleGrant;
use custos_telemetry::init_telemetry;
use tracing::{error, info};

use custos_server::admin_manifest::CACHE_ADMIN_ROLE;
use custos_server::{register_manifests, AdminServer};

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("custos-server {}", custos_server::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"Custos Server - Attribute-cached authorization engine

USAGE:
    custos-server [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    CUSTOS__SERVER__HTTP_ADDR          Admin listen address (default: 0.0.0.0:8080)
    CUSTOS__SERVER__SERVICE_NAME       Service identity of the admin API (default: custos)
    CUSTOS__SERVER__IDENTITY_HEADER    Header carrying the caller id (default: x-custos-user)
    CUSTOS__SERVER__BOOTSTRAP_ADMIN    User granted cache_admin at startup
    CUSTOS__CACHE__TTL_SECS            Bundle time-to-live (default: 86400)
    CUSTOS__CACHE__OP_TIMEOUT_MS       Cache operation timeout (default: 250)
    CUSTOS__STORE__OP_TIMEOUT_MS       Store operation timeout (default: 2000)
    CUSTOS__ENGINE__AUTO_REFRESH       Cache bundles on a miss (default: true)
    CUSTOS__LOGGING__LEVEL             Log filter (default: info)
    CUSTOS__METRICS__ENABLED           Install the Prometheus recorder
    CUSTOS__MANIFESTS                  Comma-separated service manifest paths

EXAMPLES:
    custos-server --config /etc/custos/custos.toml
    CUSTOS__SERVER__BOOTSTRAP_ADMIN=ops custos-server
"
    );
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<CustosConfig> {
    let mut loader = ConfigLoader::new().with_production().with_dotenv()?;
    if let Some(path) = path {
        loader = loader
            .with_file(&path)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }
    Ok(loader.with_env_prefix("CUSTOS").load()?)
}

async fn build(config: &CustosConfig) -> anyhow::Result<Custos> {
    let manifests = config.load_manifests().context("failed to load service manifests")?;

    let builder = Custos::builder()
        .config(config.engine_config())
        .cache_config(config.cache_config());
    let custos = register_manifests(builder, &config.server.service_name, manifests)
        .build()
        .await?;

    if let Some(admin) = &config.server.bootstrap_admin {
        let user_id = UserId::new(admin.as_str());
        custos.admin().upsert_user(User::new(admin.as_str(), admin.as_str())).await?;
        custos
            .admin()
            .assign_role(RoleGrant::new(
                user_id.clone(),
                ServiceName::new(config.server.service_name.as_str()),
                CACHE_ADMIN_ROLE,
                "bootstrap",
            ))
            .await?;
        info!(user_id = %user_id, "granted bootstrap cache admin");
    }

    Ok(custos)
}

#[tokio::main]
async fn main() {
    // Parse arguments
    let args = Args::parse();

    // Load configuration
    let config = match load_config(args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            std::process::exit(1);
        }
    };

    // Initialize logging and metrics
    if let Err(e) = init_telemetry(&config.telemetry_config()) {
        eprintln!("Failed to initialize telemetry: {e}");
        std::process::exit(1);
    }

    info!("Starting Custos server v{}", custos_server::VERSION);

    let custos = match build(&config).await {
        Ok(custos) => custos,
        Err(e) => {
            error!("Failed to build authorization engine: {:#}", e);
            std::process::exit(1);
        }
    };

    let server = AdminServer::new(custos, &config.server);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    };

    if let Err(e) = server.run_with_shutdown(shutdown).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
