use std::{future::Future, net::SocketAddr, process, sync::Arc, time::Duration};

use kumoscan::{
    application::error::AppError,
    application::{
        accounts::{AccountService, IdentityVerifier},
        admin::{
            audit::AdminAuditService, chapters::AdminChapterService,
            statistics::AdminStatisticsService, titles::AdminTitleService,
            users::AdminUserService,
        },
        catalog::{CatalogOptions, CatalogService},
        comments::CommentService,
        favorites::FavoriteService,
        ratings::RatingService,
        reading::ReadingService,
        repos::{
            AuditRepo, ChaptersRepo, ChaptersWriteRepo, CommentsRepo, HealthRepo, RatingsRepo,
            ReadingProgressRepo, StatisticsRepo, TitlesRepo, TitlesWriteRepo, UsersRepo,
        },
        uploads::ImageHost,
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, ApiRateLimiter, ApiState},
        identity::HttpIdentityVerifier,
        image_host::HttpImageHost,
        telemetry,
    },
};
use tokio::{sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;

    let prune_handle = spawn_rate_limit_pruner(
        app.rate_limiter.clone(),
        Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get())),
    );

    let result = serve_http(&settings, app.api_state, app.admin_state).await;

    prune_handle.abort();
    let _ = prune_handle.await;

    result
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;
    info!(target = "kumoscan::migrate", "migrations applied");
    Ok(())
}

async fn connect_pool(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    Ok(pool)
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let pool = connect_pool(settings).await?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

struct ApplicationContext {
    api_state: ApiState,
    admin_state: AdminState,
    rate_limiter: Arc<ApiRateLimiter>,
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let titles_repo: Arc<dyn TitlesRepo> = repositories.clone();
    let titles_write_repo: Arc<dyn TitlesWriteRepo> = repositories.clone();
    let chapters_repo: Arc<dyn ChaptersRepo> = repositories.clone();
    let chapters_write_repo: Arc<dyn ChaptersWriteRepo> = repositories.clone();
    let ratings_repo: Arc<dyn RatingsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let progress_repo: Arc<dyn ReadingProgressRepo> = repositories.clone();
    let statistics_repo: Arc<dyn StatisticsRepo> = repositories.clone();
    let audit_repo: Arc<dyn AuditRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories.clone();

    let image_host: Arc<dyn ImageHost> = Arc::new(HttpImageHost::new(&settings.image_host)?);
    let verifier: Arc<dyn IdentityVerifier> =
        Arc::new(HttpIdentityVerifier::new(&settings.identity)?);
    if settings.image_host.api_key.is_none() {
        warn!(
            target = "kumoscan::startup",
            "image host api key is not configured; uploads will be refused"
        );
    }

    let catalog_options = CatalogOptions {
        page_size: settings.catalog.page_size.get(),
        placeholder_cover: settings.catalog.placeholder_cover.clone(),
    };
    let max_image_bytes = settings.image_host.max_image_bytes.get();

    let accounts = Arc::new(AccountService::new(verifier, users_repo.clone()));
    let catalog = Arc::new(CatalogService::new(
        titles_repo.clone(),
        chapters_repo.clone(),
        catalog_options,
    ));
    let ratings = Arc::new(RatingService::new(titles_repo.clone(), ratings_repo));
    let comments = Arc::new(CommentService::new(chapters_repo.clone(), comments_repo));
    let reading = Arc::new(ReadingService::new(
        titles_repo.clone(),
        chapters_repo.clone(),
        progress_repo,
    ));
    let favorites = Arc::new(FavoriteService::new(titles_repo.clone(), users_repo.clone()));

    let audit_service = AdminAuditService::new(audit_repo);
    let admin_titles = Arc::new(AdminTitleService::new(
        titles_repo.clone(),
        titles_write_repo,
        image_host.clone(),
        max_image_bytes,
        audit_service.clone(),
    ));
    let admin_chapters = Arc::new(AdminChapterService::new(
        titles_repo.clone(),
        chapters_repo,
        chapters_write_repo,
        image_host,
        max_image_bytes,
        audit_service.clone(),
    ));
    let admin_users = Arc::new(AdminUserService::new(
        users_repo.clone(),
        audit_service.clone(),
    ));
    let admin_statistics = Arc::new(AdminStatisticsService::new(
        statistics_repo,
        titles_repo,
        users_repo,
    ));

    let rate_limiter = Arc::new(ApiRateLimiter::new(
        Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get())),
        settings.rate_limit.max_requests.get(),
    ));

    let api_state = ApiState {
        accounts: accounts.clone(),
        catalog,
        ratings,
        comments,
        reading,
        favorites,
        health: health_repo.clone(),
        rate_limiter: rate_limiter.clone(),
    };

    let admin_state = AdminState {
        accounts,
        titles: admin_titles,
        chapters: admin_chapters,
        users: admin_users,
        statistics: admin_statistics,
        audit: Arc::new(audit_service),
        health: health_repo,
    };

    Ok(ApplicationContext {
        api_state,
        admin_state,
        rate_limiter,
    })
}

fn spawn_rate_limit_pruner(
    limiter: Arc<ApiRateLimiter>,
    window: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(window.max(Duration::from_secs(1)));
        interval.tick().await;
        loop {
            interval.tick().await;
            limiter.prune();
        }
    })
}

async fn serve_http(
    settings: &config::Settings,
    api_state: ApiState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let upload_body_limit = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::validation("uploads.max_request_bytes exceeds platform limits"))?;
    let public_router = http::build_api_router(api_state);
    let admin_router = http::build_admin_router(admin_state, upload_body_limit);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(InfraError::from)?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(InfraError::from)?;

    info!(
        target = "kumoscan::startup",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "kumoscan::shutdown", error = %err, "failed to listen for ctrl-c");
            return;
        }
        info!(target = "kumoscan::shutdown", "shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let public_server = axum::serve(
        public_listener,
        public_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));

    let servers = async move { try_join!(public_server, admin_server) };

    tokio::select! {
        result = servers => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_deadline(shutdown_rx, settings.server.graceful_shutdown) => {
            warn!(
                target = "kumoscan::shutdown",
                grace_seconds = settings.server.graceful_shutdown.as_secs(),
                "in-flight requests did not finish before the grace period"
            );
        }
    }

    Ok(())
}

fn shutdown_requested(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        // A dropped sender means the signal listener failed; keep serving.
        if rx.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Resolves once shutdown was requested and the grace period has elapsed.
async fn drain_deadline(rx: watch::Receiver<bool>, grace: Duration) {
    shutdown_requested(rx).await;
    tokio::time::sleep(grace).await;
}
