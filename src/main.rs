use std::{net::SocketAddr, sync::Arc};

use anyhow::{bail, Context};
use axum::http::HeaderValue;
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use k_to_drinks_api as api;

#[derive(Parser)]
#[command(name = "k-to-drinks-api", about = "K-TO Drinks operations API server", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Create an administrator account
    CreateAdmin(CreateAdminArgs),
}

#[derive(Args)]
struct CreateAdminArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long, help = "At least 8 characters")]
    password: String,
    #[arg(long, default_value = "")]
    first_name: String,
    #[arg(long, default_value = "")]
    last_name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Migrate => {
            api::db::run_migrations(&db_pool)
                .await
                .context("failed running migrations")?;
            info!("migrations applied");
            Ok(())
        }
        Commands::CreateAdmin(args) => create_admin(db_pool, args).await,
        Commands::Serve => serve(cfg, db_pool).await,
    }
}

async fn create_admin(db_pool: api::db::DbPool, args: CreateAdminArgs) -> anyhow::Result<()> {
    if args.password.len() < 8 {
        bail!("password must be at least 8 characters");
    }
    api::db::run_migrations(&db_pool)
        .await
        .context("failed running migrations")?;

    let users = api::services::users::UserService::new(Arc::new(db_pool));
    let (user, _) = users
        .create_user(
            api::services::users::NewUser {
                username: args.username,
                email: args.email,
                password: args.password,
                first_name: args.first_name,
                last_name: args.last_name,
                role: api::entities::user::UserRole::Admin,
                phone_number: None,
            },
            None,
        )
        .await
        .context("failed to create administrator")?;
    info!(user_id = %user.id, username = %user.username, "administrator created");
    Ok(())
}

fn cors_layer(cfg: &api::config::AppConfig) -> anyhow::Result<CorsLayer> {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any));
    }
    if cfg.allows_any_origin() {
        info!(environment = %cfg.environment, "no CORS origins configured; allowing any origin");
        return Ok(CorsLayer::permissive());
    }
    bail!("no usable CORS origins; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true")
}

async fn serve(cfg: api::config::AppConfig, db_pool: api::db::DbPool) -> anyhow::Result<()> {
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool)
            .await
            .context("failed running migrations")?;
    }
    api::handlers::health::init_start_time();

    let db_arc = Arc::new(db_pool);
    let auth_cfg =
        api::auth::AuthConfig::from_app_config(&cfg).context("failed to create auth config")?;
    let auth_service = Arc::new(api::auth::AuthService::new(auth_cfg, db_arc.clone()));

    let cors = cors_layer(&cfg)?;
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;

    let app_state = api::AppState::new(db_arc, cfg);
    let app = api::build_router(app_state, auth_service)
        .layer(api::tracing::configure_http_tracing())
        .layer(cors)
        // Outermost so every span and error body carries the request id
        .layer(axum::middleware::from_fn(
            api::middleware_helpers::request_id_middleware,
        ));

    info!("k-to-drinks-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
