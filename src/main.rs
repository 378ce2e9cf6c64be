use std::{process, sync::Arc};

use newsdesk::{
    application::{
        articles::ArticleService,
        error::AppError,
        pagination::PageRequest,
        query::{AuthorRef, ListingFilters, ListingSort, QueryComposer, SearchQuery, SearchSort},
        repos::{ArticlesRepo, ArticlesWriteRepo},
    },
    cache::{CacheConfig, TaggedCache},
    config::{self, Command, PageArgs, QuerySettings},
    infra::{db::PostgresRepositories, error::InfraError, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let chain = error.chain();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?chain, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let repositories = init_repositories(&settings).await?;
    let service = build_service(repositories, &settings);

    execute(&service, cli_args.command, settings.query).await
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

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database("connect", err)))?;

    let repositories = PostgresRepositories::new(pool);
    repositories
        .health_check()
        .await
        .map_err(|err| AppError::from(InfraError::database("health check", err)))?;

    Ok(Arc::new(repositories))
}

fn build_service(repositories: Arc<PostgresRepositories>, settings: &config::Settings) -> ArticleService {
    let reader: Arc<dyn ArticlesRepo> = repositories.clone();
    let writer: Arc<dyn ArticlesWriteRepo> = repositories;
    let cache = Arc::new(TaggedCache::new(CacheConfig::from(&settings.cache)));
    info!(
        target = "newsdesk::startup",
        cache_enabled = settings.cache.enabled,
        max_entries = settings.cache.max_entries,
        "Article service ready"
    );
    ArticleService::new(reader, writer, QueryComposer::new(settings.ranking), cache)
}

fn page_request(args: &PageArgs, query: QuerySettings) -> PageRequest {
    PageRequest::clamped(
        args.page,
        args.per_page.unwrap_or(query.default_page_size),
        query.max_page_size,
    )
}

async fn execute(
    service: &ArticleService,
    command: Command,
    query: QuerySettings,
) -> Result<(), AppError> {
    match command {
        Command::Show(args) => {
            let level = args.level.into();
            let found = match Uuid::parse_str(args.reference.trim()) {
                Ok(id) => service.find_by_id(id, level).await?,
                Err(_) => service.find_by_slug(args.reference.trim(), level).await?,
            };
            print_json(&found.ok_or(AppError::NotFound)?)
        }
        Command::List(args) => {
            let filters = ListingFilters {
                category: args.category,
                tag: args.tag,
                author: args.author.as_deref().and_then(AuthorRef::parse),
                featured: args.featured,
                breaking: args.breaking,
                recent_days: args.days,
                article_type: args.article_type,
                sort: ListingSort::parse_lenient(&args.sort),
            };
            let page = page_request(&args.page, query);
            print_json(&service.list_published(&filters, page).await?)
        }
        Command::Search(args) => {
            let search = SearchQuery {
                text: args.text,
                category_id: args.category_id,
                tag_ids: args.tag_ids,
                author_id: args.author_id,
                date_from: args.from,
                date_to: args.to,
                sort: SearchSort::parse_lenient(&args.sort),
            };
            let page = page_request(&args.page, query);
            print_json(&service.search(&search, page).await?)
        }
        Command::Featured(args) => print_json(&service.list_featured(args.limit).await?),
        Command::Trending(args) => {
            print_json(&service.list_trending(args.hours, args.limit).await?)
        }
        Command::Popular(args) => print_json(&service.list_popular(args.days, args.limit).await?),
        Command::Related(args) => print_json(&service.list_related(args.id, args.limit).await?),
        Command::Scheduled(args) => {
            print_json(&service.list_scheduled(page_request(&args, query)).await?)
        }
        Command::PendingReview(args) => {
            print_json(&service.list_pending_review(page_request(&args, query)).await?)
        }
        Command::Analytics(args) => {
            print_json(&service.get_analytics(args.from, args.to).await?)
        }
        Command::StatusCounts => print_json(&service.get_status_counts().await?),
        Command::BulkPublish(args) => print_changed(service.bulk_publish(&args.ids).await?),
        Command::BulkUnpublish(args) => print_changed(service.bulk_unpublish(&args.ids).await?),
        Command::BulkFeature(args) => print_changed(service.bulk_feature(&args.ids).await?),
        Command::BulkArchive(args) => print_changed(service.bulk_archive(&args.ids).await?),
    }
}

#[derive(Serialize)]
struct BulkOutcome {
    changed: u64,
}

fn print_changed(changed: u64) -> Result<(), AppError> {
    print_json(&BulkOutcome { changed })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
