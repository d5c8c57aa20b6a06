//! apserve server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use apserve_common::{Config, HostLists, HostPolicy};
use apserve_db::repositories::{InstanceRepository, UserKeypairRepository, UserRepository};
use apserve_federation::{
    AccessGate, ApClient, DbFederationStore, FederationState, InboxIntake, InstanceActor,
    LocalIdentity, PublicKeyCache, SignaturePolicy, SignatureVerifier, StoreKeyResolver,
    federation_router, not_acceptable_router,
};
use apserve_queue::{RedisInboxQueue, connect_inbox_storage};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "apserve=info,tower_http=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Static config lists merged with the hosts recorded in the instance table.
async fn load_host_lists(config: &Config, instances: &InstanceRepository) -> anyhow::Result<HostLists> {
    let mut blocked = instances.blocked_hosts().await?;
    blocked.extend(config.federation.blocked_hosts.iter().cloned());
    let mut silenced = instances.silenced_hosts().await?;
    silenced.extend(config.federation.silenced_hosts.iter().cloned());
    Ok(HostLists::new(blocked, silenced))
}

fn spawn_host_policy_refresh(config: Config, instances: InstanceRepository, policy: HostPolicy) {
    let period = Duration::from_secs(config.federation.host_policy_refresh_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            match load_host_lists(&config, &instances).await {
                Ok(lists) => policy.replace(lists),
                Err(e) => warn!(error = %e, "Failed to refresh host policy, keeping previous lists"),
            }
        }
    });
}

fn spawn_key_cache_prune(cache: PublicKeyCache, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period.max(Duration::from_secs(1)));
        interval.tick().await;
        loop {
            interval.tick().await;
            cache.prune_expired().await;
        }
    });
}

async fn load_instance_actor(
    config: &Config,
    users: &UserRepository,
    keypairs: &UserKeypairRepository,
) -> anyhow::Result<InstanceActor> {
    let username = &config.federation.instance_actor_username;
    let Some(user) = users.find_local_by_username(username).await? else {
        bail!("instance actor @{username} does not exist");
    };
    let Some(keypair) = keypairs.find_by_user_id(&user.id).await? else {
        bail!("instance actor @{username} has no keypair");
    };
    Ok(InstanceActor {
        id: user.id,
        username: user.username,
        public_key_pem: keypair.public_key,
        private_key_pem: keypair.private_key,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Starting apserve...");

    let config = Config::load().context("failed to load configuration")?;
    let public_url = config.public_url()?;
    let local_host = config.host()?;
    let federation = &config.federation;
    if !federation.enabled {
        bail!("federation is disabled in configuration");
    }

    let db = Arc::new(apserve_db::init(&config).await?);
    info!("Connected to database");

    let instances = InstanceRepository::new(db.clone());
    let host_policy = HostPolicy::new(load_host_lists(&config, &instances).await?);
    spawn_host_policy_refresh(config.clone(), instances, host_policy.clone());

    let instance_actor = load_instance_actor(
        &config,
        &UserRepository::new(db.clone()),
        &UserKeypairRepository::new(db.clone()),
    )
    .await?;
    let local = Arc::new(LocalIdentity::new(
        &public_url,
        &federation.alternate_hosts,
        instance_actor,
    ));
    info!(host = %local_host, instance_actor = %local.instance_actor.id, "Loaded instance actor");

    let client = ApClient::new(
        public_url.as_str(),
        Duration::from_secs(federation.key_fetch_timeout_secs),
    )?
    .with_instance_actor(
        &local.instance_actor,
        local.urls.key_id(&local.instance_actor.id),
    )?;

    let storage = connect_inbox_storage(&config.redis.url, &config.redis.prefix).await?;
    info!("Connected to Redis job queue");

    let store = Arc::new(DbFederationStore::new(db));
    let key_cache_ttl = Duration::from_secs(federation.key_cache_ttl_secs);
    let key_cache = PublicKeyCache::new(key_cache_ttl);
    spawn_key_cache_prune(key_cache.clone(), key_cache_ttl);
    let resolver = StoreKeyResolver::new(store.clone(), key_cache, Arc::new(client));
    let signature_policy = SignaturePolicy::new(local_host, federation.signature_max_age_secs);
    let verifier = SignatureVerifier::new(
        Arc::new(resolver),
        host_policy.clone(),
        local.clone(),
        signature_policy.clone(),
    );

    let state = FederationState {
        local: local.clone(),
        store,
        gate: AccessGate::new(federation.check_get_signature, verifier, local),
        intake: InboxIntake::new(
            Arc::new(RedisInboxQueue::new(storage)),
            host_policy,
            signature_policy,
        ),
    };

    let app = federation_router(state, not_acceptable_router()).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
