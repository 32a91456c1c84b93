//! habitgrid server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware, routing::get};
use habitgrid_api::{
    AppState, RateLimiterState,
    middleware::auth_middleware,
    rate_limit::rate_limit_middleware,
    router as api_router,
};
use habitgrid_common::{Config, LocalStorage, StorageBackend, config::LoggingConfig};
use habitgrid_core::{
    ActivityService, CronLockService, EmailSender, EmailService, FollowingService, JobService,
    JobWorkerContext, LikeService, NotificationService, PushNotificationService, ReminderService,
    SmtpEmailSender, StoryService, StreakService, SummaryService, TileService, UserService,
    VapidConfig, WebPushSender,
};
use habitgrid_db::repositories::{
    ActivityRepository, CronJobLogRepository, FollowRepository, LikeRepository,
    NotificationRepository, PushSubscriptionRepository, StoryRepository, StreakRepository,
    TileRepository, UserRepository,
};
use habitgrid_queue::{SchedulerConfig, ServiceExecutor, spawn_scheduler};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How often stale rate limit keys are dropped.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "habitgrid=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging settings live in the config, so it loads first
    let config = Config::load()?;
    init_tracing(&config.logging);

    info!("Starting habitgrid server...");

    let db = habitgrid_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    habitgrid_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let activity_repo = ActivityRepository::new(Arc::clone(&db));
    let tile_repo = TileRepository::new(Arc::clone(&db));
    let follow_repo = FollowRepository::new(Arc::clone(&db));
    let like_repo = LikeRepository::new(Arc::clone(&db));
    let streak_repo = StreakRepository::new(Arc::clone(&db));
    let story_repo = StoryRepository::new(Arc::clone(&db));
    let notification_repo = NotificationRepository::new(Arc::clone(&db));
    let push_repo = PushSubscriptionRepository::new(Arc::clone(&db));
    let cron_repo = CronJobLogRepository::new(Arc::clone(&db));

    // Background jobs: push fan-out and follow recounts
    let job_service = JobService::new();
    let job_sender = job_service.sender();

    // Initialize services
    let mut notification_service = NotificationService::new(notification_repo.clone());
    notification_service.set_job_sender(job_sender.clone());

    let mut following_service = FollowingService::new(
        follow_repo.clone(),
        user_repo.clone(),
        notification_service.clone(),
    );
    following_service.set_job_sender(job_sender);

    let user_service = UserService::new(user_repo.clone());
    let tile_service = TileService::new(tile_repo);
    let streak_service = StreakService::new(streak_repo);
    let activity_service = ActivityService::new(
        activity_repo.clone(),
        user_repo.clone(),
        tile_service.clone(),
        streak_service.clone(),
    );
    let like_service = LikeService::new(
        like_repo,
        user_repo.clone(),
        follow_repo.clone(),
        notification_service.clone(),
    );
    let summary_service = SummaryService::new(
        user_repo.clone(),
        activity_repo.clone(),
        follow_repo.clone(),
        like_service.clone(),
        streak_service.clone(),
    );

    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(
        config.storage.base_path.clone(),
        config.storage.base_url.clone(),
    ));
    let story_service = StoryService::new(
        story_repo,
        activity_repo.clone(),
        user_repo.clone(),
        follow_repo,
        storage,
        notification_service.clone(),
    );

    let mut push_service =
        PushNotificationService::new(push_repo, notification_repo, user_repo.clone());
    match config.push {
        Some(ref push) => match WebPushSender::new(VapidConfig::from(push)) {
            Ok(sender) => {
                push_service.set_sender(Arc::new(sender), push.vapid_public_key.clone());
                info!("Web push enabled");
            }
            Err(e) => warn!(error = %e, "Web push disabled: sender setup failed"),
        },
        None => info!("Web push disabled: no VAPID keys configured"),
    }

    let email_sender: Option<Arc<dyn EmailSender>> = match config.email {
        Some(ref settings) => {
            info!(host = %settings.smtp_host, "Reminder emails enabled");
            Some(Arc::new(SmtpEmailSender::new(settings)?))
        }
        None => {
            info!("Reminder emails disabled: no SMTP relay configured");
            None
        }
    };
    let email_service = EmailService::new(email_sender, config.server.url.clone());
    let reminder_service = ReminderService::new(
        user_repo,
        activity_repo,
        notification_service.clone(),
        email_service,
    );

    let job_handle = job_service.start(JobWorkerContext {
        push_service: Some(push_service.clone()),
        following_service: Some(following_service.clone()),
    });

    // Daily jobs; every replica may schedule them, the cron log picks one runner
    let scheduler_handles = if config.jobs.enabled {
        let schedule = SchedulerConfig::from_jobs(&config.jobs)?;
        let executor = Arc::new(ServiceExecutor::new(
            streak_service,
            reminder_service,
            story_service.clone(),
        ));
        spawn_scheduler(schedule, executor, CronLockService::new(cron_repo))
    } else {
        info!("Daily jobs disabled on this replica");
        Vec::new()
    };

    let rate_limiter = RateLimiterState::new();
    let cleanup_limiter = rate_limiter.clone();
    let cleanup_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup().await;
        }
    });

    let state = AppState {
        user_service,
        activity_service,
        tile_service,
        following_service,
        like_service,
        summary_service,
        story_service,
        notification_service,
        push_service,
        max_upload_bytes: config.storage.max_upload_bytes,
    };

    // The rate limiter runs inside the auth layer so signed-in users are keyed by id
    let api = api_router()
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api);

    // Only a path prefix is served locally; a full URL points at a CDN
    let files_prefix = config.storage.base_url.trim_end_matches('/');
    if files_prefix.starts_with('/') && files_prefix.len() > 1 {
        app = app.nest_service(files_prefix, ServeDir::new(&config.storage.base_path));
    }

    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    for handle in scheduler_handles {
        handle.abort();
    }
    cleanup_handle.abort();
    if let Some(handle) = job_handle {
        handle.abort();
    }

    info!("Server shutdown complete");
    Ok(())
}
