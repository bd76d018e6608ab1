//! Hybrid Probe - run one merge from the command line.
//!
//! Seeds an in-memory store with a few report passages, picks a web provider
//! from the environment (Serper, then Tavily, else an offline mock), and
//! prints the merged passages with their citations and the usage snapshot.
//!
//! ```bash
//! SERPER_API_KEY=... HYBRID_EXPAND=true \
//!     cargo run --example hybrid_probe -- "HBM market outlook" "Acme Corp"
//! ```

use std::sync::Arc;

use hybrid_retrieval::{
    ChunkKind, HybridRetriever, MemoryStore, MockWebProvider, Passage, RateLimitedProvider,
    Result, RetrievalConfig, SearchCredentials, SerperProvider, TavilyProvider,
    WebSearchProvider,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn demo_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.extend([
        Passage::internal("R-2024-1", 10, "Acme Corp", "HBM market outlook: demand for HBM3E exceeds supply through 2025.")
            .with_title("II. Business > Market"),
        Passage::internal("R-2024-1", 11, "Acme Corp", "(see table below)").with_excluded(true),
        Passage::internal("R-2024-1", 12, "Acme Corp", "| Product | 2024 | 2025 |\n| HBM3E | 30% | 55% |")
            .with_kind(ChunkKind::Table),
        Passage::internal("R-2024-1", 20, "Acme Corp", "Capex for memory lines rises on HBM market strength."),
        Passage::internal("R-2024-7", 3, "Globex", "Globex HBM market outlook is cautious."),
    ]);
    store
}

fn web_provider(credentials: SearchCredentials, query: &str) -> Arc<dyn WebSearchProvider> {
    if let Some(key) = credentials.serper {
        tracing::info!("Using Serper web search");
        return Arc::new(RateLimitedProvider::with_default_rate(SerperProvider::new(key)));
    }
    if let Some(key) = credentials.tavily {
        tracing::info!("Using Tavily web search");
        return Arc::new(RateLimitedProvider::with_default_rate(TavilyProvider::new(key)));
    }
    tracing::warn!("No web search key configured, using offline results");
    Arc::new(MockWebProvider::new().with_pages(
        query,
        &[
            ("https://news.example.com/hbm-outlook", "Analysts expect HBM prices to stay firm."),
            ("https://blog.example.com/memory-cycle", "The memory cycle turns on AI demand."),
        ],
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hybrid_retrieval=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let mut args = std::env::args().skip(1);
    let query = args.next().unwrap_or_else(|| "HBM market outlook".to_string());
    let scope_name = args.next().unwrap_or_else(|| "Acme Corp".to_string());

    let config = RetrievalConfig::from_env()?;
    let web = web_provider(SearchCredentials::from_env(), &query);
    let retriever = HybridRetriever::new(demo_store(), web, config);

    let scope = retriever.scope_catalog().await?.select(&scope_name)?;
    let request = retriever.config().request(query, scope);
    let outcome = retriever.merge(&request).await?;

    for (i, passage) in outcome.passages.iter().enumerate() {
        println!("{:>2}. {} {}", i + 1, passage.source, passage.citation());
        println!("    {}", passage.expanded_text().replace('\n', "\n    "));
    }

    println!(
        "\nusage: internal {} calls / {} items, external {} calls / {} items",
        outcome.usage.internal.calls,
        outcome.usage.internal.items_returned,
        outcome.usage.external.calls,
        outcome.usage.external.items_returned
    );
    if let Some(failure) = &outcome.usage.external.last_error {
        println!("external failure: {} ({})", failure.kind, failure.message);
    }

    Ok(())
}
