use std::{num::NonZeroU32, process, sync::Arc};

use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        chrome::ChromeService,
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        identity::IdentityService,
        pagination::Paginator,
        posts::PostService,
        repos::{
            CommentsRepo, CreateGroupCommand, CreateUserCommand, FollowsRepo, GroupsRepo,
            HealthRepo, PostsRepo, PostsWriteRepo, RepoError, UsersRepo,
        },
    },
    config,
    domain::slug::{generate_unique_slug_async, validate_slug},
    infra::{
        cache::ResponseCache,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        uploads::ImageStorage,
    },
};

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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Groups(args) => match args.command {
            config::GroupsCommand::Add(add) => run_add_group(settings, add).await,
        },
        config::Command::Users(args) => match args.command {
            config::UsersCommand::Add(add) => run_add_user(settings, add).await,
        },
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let http_state = build_http_state(repositories, &settings)?;
    serve_http(&settings, http_state).await
}

async fn run_add_group(
    settings: config::Settings,
    args: config::AddGroupArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let groups: Arc<dyn GroupsRepo> = repositories;

    let slug = match args.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => {
            validate_slug(slug).map_err(|err| AppError::validation(err.to_string()))?;
            slug.to_string()
        }
        None => {
            let lookup = groups.clone();
            generate_unique_slug_async(&args.title, move |candidate| {
                let lookup = lookup.clone();
                let candidate = candidate.to_string();
                async move {
                    let existing = lookup.find_by_slug(&candidate).await?;
                    Ok::<bool, RepoError>(existing.is_none())
                }
            })
            .await
            .map_err(|err| AppError::validation(err.to_string()))?
        }
    };

    let group = groups
        .create_group(CreateGroupCommand {
            title: args.title.trim().to_string(),
            description: args.description,
            slug,
        })
        .await
        .map_err(|err| match err {
            RepoError::Duplicate { constraint } => {
                AppError::validation(format!("group already exists ({constraint})"))
            }
            other => AppError::unexpected(other.to_string()),
        })?;

    info!(
        target = "yatube::cli",
        group_id = group.id,
        slug = %group.slug,
        "group created"
    );
    Ok(())
}

async fn run_add_user(
    settings: config::Settings,
    args: config::AddUserArgs,
) -> Result<(), AppError> {
    let username = args.username.trim();
    if username.is_empty() {
        return Err(AppError::validation("username must not be empty"));
    }

    let repositories = init_repositories(&settings).await?;
    let users: Arc<dyn UsersRepo> = repositories;
    let user = users
        .create_user(CreateUserCommand {
            username: username.to_string(),
            first_name: args.first_name,
            last_name: args.last_name,
        })
        .await
        .map_err(|err| match err {
            RepoError::Duplicate { .. } => {
                AppError::validation(format!("user `{username}` already exists"))
            }
            other => AppError::unexpected(other.to_string()),
        })?;

    info!(
        target = "yatube::cli",
        user_id = user.id,
        username = %user.username,
        "user created"
    );
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(InfraError::from)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let images = Arc::new(
        ImageStorage::new(settings.uploads.directory.clone())
            .map_err(|err| InfraError::media(&settings.uploads.directory, err.to_string()))?,
    );

    let paginator = Paginator::new(settings.listing.posts_per_page);
    let title_symbols = title_symbols(settings.listing.title_symbols);

    let feed = Arc::new(FeedService::new(
        posts_repo.clone(),
        groups_repo.clone(),
        users_repo.clone(),
        comments_repo.clone(),
        follows_repo.clone(),
        paginator,
        title_symbols,
    ));
    let posts = Arc::new(PostService::new(
        posts_repo,
        posts_write_repo,
        groups_repo,
        comments_repo,
        images.clone(),
    ));
    let follows = Arc::new(FollowService::new(users_repo.clone(), follows_repo));
    let identity = Arc::new(IdentityService::new(users_repo));
    let chrome = Arc::new(ChromeService::new(settings.auth.login_url.clone()));

    let max_request_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::validation("uploads.max_request_bytes does not fit in memory"))?;

    Ok(HttpState {
        feed,
        posts,
        follows,
        identity,
        chrome,
        health: health_repo,
        images,
        cache: ResponseCache::new(settings.cache.index_ttl, settings.cache.index_capacity),
        auth: settings.auth.clone(),
        max_request_bytes,
    })
}

fn title_symbols(value: NonZeroU32) -> usize {
    usize::try_from(value.get()).unwrap_or(usize::MAX)
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;

    info!(
        target = "yatube::http",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
