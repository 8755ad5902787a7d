//! Subcommand implementations

use anyhow::{anyhow, bail, Context};
use clap::{Args, Subcommand};
use fetchgate_foundation::{GatewayConfig, SqliteBackend};
use fetchgate_pipeline::{
    ApiRequest, CacheFilter, CacheStrategy, Gateway, GatewayBuilder, HttpMethod, StaticToken,
    TracingObserver,
};
use std::sync::Arc;
use std::time::Duration;

/// Bearer token for routes that require auth
pub const TOKEN_ENV: &str = "FETCHGATE_TOKEN";

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Request path, e.g. /users?page=2
    pub path: String,

    #[arg(short = 'X', long, default_value = "GET")]
    pub method: HttpMethod,

    /// Target domain (overrides route matching)
    #[arg(long)]
    pub domain: Option<String>,

    /// cacheOnly, cacheFirst, cacheThenNetwork, staleWhileRevalidate,
    /// networkFirst or networkOnly
    #[arg(short, long)]
    pub strategy: Option<CacheStrategy>,

    /// Query parameter (repeatable)
    #[arg(short, long = "query", value_name = "KEY=VALUE", value_parser = parse_pair)]
    pub query: Vec<(String, String)>,

    /// Request header (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME=VALUE", value_parser = parse_pair)]
    pub header: Vec<(String, String)>,

    /// JSON request body
    #[arg(short, long)]
    pub body: Option<String>,

    #[arg(long)]
    pub force_refresh: bool,

    /// Skip the cache entirely
    #[arg(long)]
    pub no_cache: bool,

    /// TTL for the cached response (seconds)
    #[arg(long)]
    pub max_stale_secs: Option<u64>,

    /// Transport timeout (milliseconds)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Print status and source along with the body
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cache statistics
    Stats,

    /// List cached keys
    Keys {
        /// Key prefix after the namespace, e.g. "GET:api.example.com"
        #[arg(short, long, default_value = "")]
        prefix: String,
    },

    /// Remove cached entries
    Clear {
        #[arg(long)]
        domain: Option<String>,

        #[arg(short = 'X', long)]
        method: Option<HttpMethod>,

        /// Substring of the cache key
        #[arg(long)]
        pattern: Option<String>,

        /// Only remove expired and corrupted entries
        #[arg(long, conflicts_with_all = ["domain", "method", "pattern", "all"])]
        expired: bool,

        /// Remove everything
        #[arg(long, conflicts_with_all = ["domain", "method", "pattern"])]
        all: bool,
    },
}

/// HTTP gateway persisting its cache in the platform data directory
pub fn build_gateway(config: &GatewayConfig) -> anyhow::Result<Gateway> {
    let backend = SqliteBackend::open_default().context("Failed to open response cache")?;

    let mut builder = GatewayBuilder::from_config(config)
        .backend(Arc::new(backend))
        .observer(Arc::new(TracingObserver));
    if let Some(token) = StaticToken::from_env(TOKEN_ENV) {
        builder = builder.auth_handler(Arc::new(token));
    }

    Ok(builder.build()?)
}

pub async fn run_request(gateway: &Gateway, args: RequestArgs) -> anyhow::Result<()> {
    let mut request = ApiRequest::new(args.method, args.path).use_cache(!args.no_cache);

    if let Some(domain) = args.domain {
        request = request.domain(domain);
    }
    if let Some(strategy) = args.strategy {
        request = request.strategy(strategy);
    }
    for (name, value) in args.query {
        request = request.query(name, value);
    }
    for (name, value) in args.header {
        request = request.header(name, value);
    }
    if let Some(body) = args.body {
        let body = serde_json::from_str(&body).context("--body is not valid JSON")?;
        request = request.body(body);
    }
    if args.force_refresh {
        request = request.force_refresh(true);
    }
    if let Some(secs) = args.max_stale_secs {
        request = request.max_stale(Duration::from_secs(secs));
    }
    if let Some(ms) = args.timeout_ms {
        request = request.timeout(Duration::from_millis(ms));
    }

    let response = gateway.execute(request).await?;

    if args.verbose {
        eprintln!(
            "{} {} {} ({})",
            response.status, response.domain, response.path, response.source
        );
    }
    println!("{}", serde_json::to_string_pretty(&response.data)?);
    Ok(())
}

pub async fn run_cache(gateway: &Gateway, action: CacheAction) -> anyhow::Result<()> {
    match action {
        CacheAction::Stats => {
            let stats = gateway.cache_stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        CacheAction::Keys { prefix } => {
            let keys = gateway.cache_keys(&prefix).await?;
            if keys.is_empty() {
                println!("No cached entries.");
            }
            for key in keys {
                println!("{}", key);
            }
        }
        CacheAction::Clear {
            domain,
            method,
            pattern,
            expired,
            all,
        } => {
            let filter = CacheFilter {
                domain,
                method,
                pattern,
            };
            let removed = if expired {
                gateway.clear_expired_cache().await?
            } else if all {
                gateway.clear_all_cache().await?
            } else if filter.is_empty() {
                bail!("Nothing to clear: pass --domain, --method, --pattern, --expired or --all");
            } else {
                gateway.clear_cache(&filter).await?
            };
            println!("Removed {} entries.", removed);
        }
    }
    Ok(())
}

fn parse_pair(raw: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{}'", raw))?;
    if key.trim().is_empty() {
        bail!("empty key in '{}'", raw);
    }
    Ok((key.trim().to_string(), value.to_string()))
}
