//! `numthread serve` — Start the HTTP API server.

use numthread_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("numthread gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Storage:   {}", describe_storage(&config));
    println!("   Endpoints:");
    for (method, path) in ENDPOINTS {
        println!("     {method:<5} {path}");
    }

    numthread_gateway::start(config).await?;

    Ok(())
}

const ENDPOINTS: &[(&str, &str)] = &[
    ("POST", "/api/auth/register"),
    ("POST", "/api/auth/login"),
    ("GET", "/api/discussions"),
    ("GET", "/api/discussions/{id}"),
    ("POST", "/api/discussions"),
    ("POST", "/api/comments"),
    ("GET", "/api/health"),
];

pub(crate) fn describe_storage(config: &AppConfig) -> String {
    match config.database.backend.as_str() {
        "sqlite" => format!("sqlite ({})", config.database.path.display()),
        other => other.to_string(),
    }
}
