//! # hauslinkd — hauslink daemon
//!
//! Composition root that wires all adapters together and starts the bridge.
//!
//! ## Responsibilities
//! - Load daemon settings (TOML + env overrides) and initialize tracing
//! - Read the configuration document once at startup
//! - Construct the persistence gateway, transport bridge, and hub link
//! - Construct the engine, injecting the ports, and spawn its event loop
//! - Start the adapters against the engine handle
//! - Build the axum router and serve on the document's listen port
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

use anyhow::Context;

use hauslink_adapter_harmony::HarmonyLink;
use hauslink_adapter_http_axum::router;
use hauslink_adapter_http_axum::state::AppState;
use hauslink_adapter_mqtt::{MqttBridge, topics};
use hauslink_adapter_storage_json::JsonConfigStore;
use hauslink_app::engine::Engine;

mod config;

use config::Settings;

const ENGINE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&settings.logging.filter))
        .init();

    let document = hauslink_adapter_storage_json::load(&settings.document.path)
        .await
        .context("loading configuration document")?;
    let port = document.port;
    let subscriptions = topics::subscriptions(&document.devices);
    tracing::info!(
        devices = document.devices.len(),
        port,
        "configuration document loaded"
    );

    let store = JsonConfigStore::spawn(settings.document.path.clone());
    let bridge = MqttBridge::new(&document.mqtt.url, subscriptions)
        .context("configuring mqtt transport")?;
    let link = HarmonyLink::new(document.harmony.url.clone());

    let (engine, handle) = Engine::new(
        document,
        store,
        bridge.publisher(),
        link.commands(),
        ENGINE_CAPACITY,
    );
    tokio::spawn(engine.run());
    bridge.start(handle.clone());
    link.start(handle.clone());

    let app = router::build(AppState::new(handle));
    let bind_addr = format!("0.0.0.0:{port}");
    tracing::info!(%bind_addr, "hauslinkd listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("binding listen port")?;
    axum::serve(listener, app).await.context("serving http")?;

    Ok(())
}
