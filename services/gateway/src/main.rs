use std::sync::Arc;
use std::time::Duration;

use bifrost_common::observability::{init_tracing, TracingConfig};
use bifrost_common::RateLimitConfig;
use bifrost_gateway::app::build_app;
use bifrost_gateway::config::GatewayConfig;
use bifrost_gateway::discovery::{DiscoveryCallback, DiscoveryEvent, DiscoverySource, PollingDiscoverySource};
use bifrost_gateway::gateway::GatewayCoordinator;
use bifrost_gateway::handlers::publisher::{
    command_envelope_transform, command_response, publisher_handler, HttpBroker, MessageBroker,
    PublisherOptions,
};
use bifrost_gateway::handlers::reverseproxy::reverse_proxy_handler;
use bifrost_gateway::middleware::auth::{auth_middleware, JwksKeyResolver};
use bifrost_gateway::middleware::cors::{cors_middleware, CorsOptions};
use bifrost_gateway::middleware::rate_limit::rate_limit_middleware;
use bifrost_gateway::middleware::recovery::recovery_middleware;
use bifrost_gateway::router::DynamicRouter;
use tracing::{error, info};

const CONFIG_PATH_ENV: &str = "BIFROST_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = GatewayConfig::load(&config_path)?;

    init_tracing(TracingConfig {
        service_name: config.name.clone(),
        otlp_endpoint: None,
        log_level: config.log_level.clone(),
        json_format: true,
    })?;

    info!(name = %config.name, port = config.port, "starting bifrost gateway");

    let http_client = reqwest::Client::builder().build()?;
    let router = Arc::new(DynamicRouter::new());
    let mut coordinator = GatewayCoordinator::new(config.clone(), router.clone());

    coordinator.register_handler(
        "reverseproxy",
        Arc::new({
            let client = http_client.clone();
            move |endpoint| reverse_proxy_handler(client.clone(), endpoint)
        }),
    );

    if let Some(broker_config) = &config.broker {
        let broker: Arc<dyn MessageBroker> = Arc::new(HttpBroker::new(
            http_client.clone(),
            broker_config.base_url.clone(),
        ));
        let publisher_options = Arc::new(PublisherOptions {
            source: broker_config.source.clone(),
            topic_prefix: broker_config.topic_prefix.clone(),
            broker,
            transform_message: Arc::new(command_envelope_transform),
            build_response: Arc::new(command_response),
        });
        coordinator.register_handler(
            "event",
            Arc::new(move |endpoint| publisher_handler(publisher_options.clone(), endpoint)),
        );
    }

    coordinator.use_middleware("recovery", recovery_middleware());
    coordinator.use_middleware(
        "cors",
        cors_middleware(
            config
                .cors
                .clone()
                .map(|c| CorsOptions {
                    allowed_origins: c.allowed_origins,
                    allow_credentials: c.allow_credentials,
                })
                .unwrap_or(CorsOptions {
                    allowed_origins: vec!["*".to_string()],
                    allow_credentials: true,
                }),
        ),
    );

    let rate_limit_config = config.rate_limit.unwrap_or_default();
    let rate_limiter = Arc::new(bifrost_common::TokenBucketLimiter::new(
        rate_limit_config,
        bifrost_common::rate_limit::MAX_TRACKED_KEYS,
    ));
    coordinator.use_middleware(
        "rate_limit",
        rate_limit_middleware(rate_limiter, rate_limit_config),
    );

    if let Some(auth_config) = &config.auth {
        let resolver = Arc::new(JwksKeyResolver::new(
            auth_config.authority.clone(),
            http_client.clone(),
        ));
        coordinator.use_middleware("auth", auth_middleware(resolver));
    }

    let coordinator = Arc::new(coordinator);

    if config.discovery.enabled {
        let mut source = PollingDiscoverySource::new(
            config.discovery.url.clone(),
            Duration::from_secs(config.discovery.poll_interval_seconds),
            http_client.clone(),
        );

        let callback_coordinator = coordinator.clone();
        let callback: DiscoveryCallback = Arc::new(move |event| {
            let coordinator = callback_coordinator.clone();
            Box::pin(async move {
                let result = match event {
                    DiscoveryEvent::Add(service) => coordinator.add_service(service).await,
                    DiscoveryEvent::Update { old, new } => coordinator.update_service(old, new).await,
                    DiscoveryEvent::Remove(service) => {
                        coordinator.remove_service(service).await;
                        Ok(())
                    }
                };
                if let Err(err) = result {
                    error!(%err, "discovery event handling failed");
                }
            })
        });
        source.on_event(callback);

        tokio::spawn(async move {
            source.start().await;
        });
    }

    let app = build_app(router, config.name.clone());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
