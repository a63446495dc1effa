use std::{process, sync::Arc};

use bookstore::{
    application::{
        auth::{AccessKey, Authenticator},
        catalog::{CatalogService, CatalogSettings},
        error::AppError,
        links::LinkBuilder,
        pagination::PageLimits,
        repos::{AuthorsWriteRepo, BooksWriteRepo},
        versioning::VersionTag,
    },
    cache::{CacheConfig, TaggedCache},
    config::{self, CliArgs},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use clap::Parser;
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let cli_args = CliArgs::parse();

    if let Some(config::Command::HashToken(args)) = cli_args.command.as_ref() {
        println!("{}", hex::encode(Authenticator::hash_token(&args.token)));
        return Ok(());
    }

    let settings = config::load(&cli_args)?;
    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        Some(config::Command::Migrate(_)) => run_migrate(settings).await,
        _ => run_serve(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    info!(
        target = "bookstore::migrate",
        pool_size = repositories.pool().size(),
        "Migrations applied"
    );
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings);
    serve_http(&settings, state).await
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(
        database_url,
        settings.database.max_connections.get(),
        settings.database.acquire_timeout,
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(repositories: Arc<PostgresRepositories>, settings: &config::Settings) -> HttpState {
    let authors_repo: Arc<dyn AuthorsWriteRepo> = repositories.clone();
    let books_repo: Arc<dyn BooksWriteRepo> = repositories.clone();

    let cache_config = CacheConfig::from(&settings.cache);
    info!(
        target = "bookstore::cache",
        enabled = cache_config.enabled,
        capacity = cache_config.capacity,
        "Response cache configured"
    );
    let cache = Arc::new(TaggedCache::new(cache_config));

    let catalog_settings = CatalogSettings {
        default_version: VersionTag::new(settings.api.default_version.clone()),
        page_limits: PageLimits {
            default_limit: settings.api.default_page_limit.get(),
            max_limit: settings.api.max_page_limit.get(),
        },
        links: LinkBuilder::new(&settings.api.public_base_url),
    };
    let catalog = CatalogService::new(authors_repo, books_repo, cache, catalog_settings);

    let keys = settings.auth.keys.iter().map(AccessKey::from).collect::<Vec<_>>();
    if keys.is_empty() {
        warn!(
            target = "bookstore::auth",
            "No access keys configured; write endpoints will reject every request"
        );
    }
    let authenticator = Arc::new(Authenticator::new(keys));

    HttpState {
        catalog,
        authenticator,
        db: Some(repositories),
    }
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "bookstore::server",
        addr = %settings.server.addr,
        "Listening"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            let _ = shutdown_rx.changed().await;
        },
    );
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return flatten_server_result(joined),
        () = shutdown_signal() => {}
    }

    info!(
        target = "bookstore::server",
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "Shutdown requested, draining connections"
    );
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => flatten_server_result(joined),
        Err(_) => {
            warn!(
                target = "bookstore::server",
                "Graceful shutdown timed out, aborting open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn flatten_server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "bookstore::server", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "bookstore::server", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
