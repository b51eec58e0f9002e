//! Generator Tick Benchmark
//!
//! Measures one full generation tick (price walk, history append,
//! node accounting, metrics recompute) across the default five-asset
//! catalog.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use oracle_price_feed::config::AppConfig;
use oracle_price_feed::usecases::OracleService;

const CONFIG: &str = r#"
    [service]
    name = "feed-bench"

    [feed]
    seed = 42

    [server]

    [client]
    ws_url = "ws://localhost:9001"
    http_url = "http://localhost:8080"

    [metrics]

    [[assets]]
    id = "KALE"
    symbol = "KALE"
    name = "KALE Token"
    base_price = 0.15
    volatility = 0.05

    [[assets]]
    id = "XLM"
    symbol = "XLM"
    name = "Stellar Lumens"
    base_price = 0.12
    volatility = 0.08

    [[assets]]
    id = "USDC"
    symbol = "USDC"
    name = "USD Coin"
    base_price = 1.0
    volatility = 0.001

    [[assets]]
    id = "BTC"
    symbol = "BTC"
    name = "Bitcoin"
    base_price = 45000.0
    volatility = 0.12

    [[assets]]
    id = "ETH"
    symbol = "ETH"
    name = "Ethereum"
    base_price = 3200.0
    volatility = 0.10

    [[nodes]]
    id = "node-1"
    name = "Alpha"
    address = "GNODE1"
    reliability = 0.98

    [[nodes]]
    id = "node-2"
    name = "Beta"
    address = "GNODE2"
    reliability = 0.95

    [[nodes]]
    id = "node-3"
    name = "Gamma"
    address = "GNODE3"
    reliability = 0.92
"#;

fn bench_generator_tick(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let config: AppConfig = toml::from_str(CONFIG).unwrap();
    let service = Arc::new(OracleService::new(&config));

    c.bench_function("generator_tick_five_assets", |b| {
        b.to_async(&runtime).iter(|| {
            let service = Arc::clone(&service);
            async move {
                service.force_update().await.unwrap();
            }
        });
    });
}

criterion_group!(benches, bench_generator_tick);
criterion_main!(benches);
