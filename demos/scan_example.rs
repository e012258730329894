use screener_proxy::catalog::ScreenerCatalog;
use screener_proxy::chartink::ScanDispatcher;
use screener_proxy::config::AppConfig;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("Screener Example");
    println!("================");

    let config = AppConfig::default();
    let catalog = Arc::new(ScreenerCatalog::built_in()?);

    for category in catalog.categories() {
        println!("\n📂 {}", category.label);
        for screener in catalog.list_by_category(Some(category.label.as_str())) {
            println!("   - {} ({})", screener.display_name, screener.id);
        }
    }

    let screener_id = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "minervini_stage_2".to_string());
    let dispatcher = ScanDispatcher::new(catalog.clone(), &config);

    println!("\n📈 Running {} against {}", screener_id, dispatcher.endpoint());
    println!("{}", "-".repeat(40));

    match dispatcher.run_scan(&screener_id).await {
        Ok(result) => {
            println!(
                "✅ {} stocks at {}",
                result.rows.len(),
                result.fetched_at_in(config.display_timezone)
            );
            for row in result.rows.iter().take(10) {
                println!(
                    "   #{:<4} {:<14} {:>8}%  ₹{:<10} vol {}",
                    row.rank.to_string(),
                    row.stock_name.to_string(),
                    row.percent_change.to_string(),
                    row.current_price.to_string(),
                    row.trade_volume
                );
            }
        }
        Err(e) => println!("❌ Scan failed ({}): {}", e.kind(), e),
    }

    Ok(())
}
