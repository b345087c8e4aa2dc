use config::Config;
use sea_orm_migration::prelude::*;
use std::env;

#[tokio::main]
async fn main() {
    // DATABASE_URL wins; otherwise fall back to the bridge's config.yaml
    if env::var("DATABASE_URL").is_err() {
        let path = env::var("BRIDGE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
        let settings = match Config::builder()
            .add_source(config::File::with_name(&path))
            .build()
        {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Failed to read {path}: {e}");
                std::process::exit(1);
            }
        };
        if let Ok(url) = settings.get_string("database_url") {
            env::set_var("DATABASE_URL", url);
        }
    }
    cli::run_cli(migration::Migrator).await;
}
