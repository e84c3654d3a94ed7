//! `numthread status` — Show configuration and stored entity counts.

use numthread_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("numthread status");
    println!("================");
    println!("  Config dir:  {}", AppConfig::config_dir().display());
    println!("  Storage:     {}", super::serve::describe_storage(&config));
    println!("  Gateway:     {}:{}", config.gateway.host, config.gateway.port);
    println!("  Origins:     {}", config.gateway.allowed_origins.join(", "));
    println!(
        "  Token key:   {}",
        if config.auth.token_secret.is_some() {
            "configured"
        } else {
            "random per process"
        }
    );

    let store = numthread_store::open_store(&config.database).await?;
    let counts = store.counts().await?;
    println!();
    println!("  Users:       {}", counts.users);
    println!("  Discussions: {}", counts.discussions);
    println!("  Comments:    {}", counts.comments);

    if AppConfig::config_path().exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file; run `numthread init` to write one");
    }

    Ok(())
}
