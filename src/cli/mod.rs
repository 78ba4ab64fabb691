use axum::http::Method;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::app::{ApiBuilder, ResourceRoutes};
use crate::config::AppConfig;
use crate::database::{Database, MemoryDatabase, PgDatabase};
use crate::models::{Article, Author};
use crate::permission::StaticGrants;
use crate::view::ViewContext;

#[derive(Parser)]
#[command(name = "resource-rest")]
#[command(about = "Paginated REST CRUD API over registered resources")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "URL prefix for links and routes (overrides API_START)")]
    pub prefix: Option<String>,

    #[arg(long, global = true, help = "Default page size (overrides API_PER_PAGE)")]
    pub per_page: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server")]
    Serve {
        #[arg(long, help = "Port to listen on (overrides API_PORT/PORT)")]
        port: Option<u16>,

        #[arg(long, help = "PostgreSQL URL; the in-memory store is used when absent")]
        database_url: Option<String>,
    },

    #[command(about = "Print the routes every resource registers")]
    Routes {
        #[arg(long, help = "Output in JSON format")]
        json: bool,
    },
}

impl Cli {
    /// Layer command-line flags over the environment-derived config.
    pub fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(prefix) = &self.prefix {
            config.api.prefix = prefix.clone();
        }
        if let Some(per_page) = self.per_page.filter(|n| *n > 0) {
            config.api.per_page = per_page;
        }
        if let Commands::Serve { port, database_url } = &self.command {
            if let Some(port) = port {
                config.server.port = *port;
            }
            if let Some(url) = database_url {
                config.database.url = Some(url.clone());
            }
        }
        config
    }
}

/// Resources this binary serves.
pub fn api(ctx: ViewContext) -> ApiBuilder {
    ApiBuilder::new(ctx)
        .resource::<Article>(|view| {
            view.with_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        })
        .resource::<Author>(|view| view.with_methods([Method::GET, Method::POST]).with_per_page(25))
}

fn permissions() -> StaticGrants {
    StaticGrants::new().grant("*", "view", "anybody")
}

async fn database(config: &AppConfig) -> anyhow::Result<Arc<dyn Database>> {
    match &config.database.url {
        Some(url) => Ok(Arc::new(PgDatabase::connect(url, config.database.max_connections).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store");
            Ok(Arc::new(MemoryDatabase::new()))
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.apply(AppConfig::from_env());

    match cli.command {
        Commands::Serve { .. } => serve(config).await,
        Commands::Routes { json } => {
            let ctx = ViewContext::new(config.api, Arc::new(MemoryDatabase::new()), Arc::new(permissions()));
            print_routes(ctx, json)
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting resource-rest in {:?} mode", config.environment);

    let db = database(&config).await?;
    let ctx = ViewContext::new(config.api.clone(), db, Arc::new(permissions()));
    let app = api(ctx).build();

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{} (prefix {})", bind_addr, config.api.prefix);

    axum::serve(listener, app).await?;
    Ok(())
}

fn print_routes(ctx: ViewContext, json: bool) -> anyhow::Result<()> {
    let api = api(ctx);

    if json {
        let all: Vec<_> = api
            .views()
            .iter()
            .map(|v| serde_json::json!({ "endpoint": v.endpoint_name(), "routes": v.routes() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&all)?);
    } else {
        for view in api.views() {
            for route in view.routes() {
                let methods: Vec<&str> = route.methods.iter().map(|m| m.as_str()).collect();
                println!("{:<24} {}", route.pattern, methods.join(", "));
            }
        }
    }
    Ok(())
}
