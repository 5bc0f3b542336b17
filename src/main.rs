use std::sync::Arc;

use gigboard::config::Config;
use gigboard::lifecycle::SessionRuntime;
use gigboard::lifecycle::idle::ActivityEvent;
use gigboard::net::api::HttpAuthApi;
use gigboard::net::ws_channel::WsChannel;
use gigboard::shell::TerminalShell;
use gigboard::state::auth::AuthStore;
use gigboard::storage::FileStorage;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = Config::from_env().expect("invalid configuration");

    let api = Arc::new(HttpAuthApi::new(&config.api_base_url, config.timeouts).expect("http client build failed"));
    let storage = Arc::new(FileStorage::new(&config.session_file));
    let store = Arc::new(AuthStore::new(storage, api.clone()));

    match store.rehydrate() {
        Ok(status) => tracing::info!(?status, path = %config.session_file.display(), "session rehydrated"),
        Err(e) => tracing::warn!(error = %e, "session rehydrate failed; starting logged out"),
    }

    if !store.is_logged_in() {
        if let Some(creds) = &config.credentials {
            match store.sign_in(&creds.email, &creds.password).await {
                Ok(()) => tracing::info!(email = %creds.email, "signed in"),
                Err(e) => tracing::warn!(error = %e, "sign-in failed"),
            }
        }
    }

    let (channel, mut notifications) = WsChannel::new(api, &config.ws_base_url);
    let runtime = SessionRuntime::mount(config.lifecycle, store.clone(), Arc::new(TerminalShell), Arc::new(channel));

    let _notifications = tokio::spawn(async move {
        while let Some(n) = notifications.recv().await {
            tracing::info!(kind = %n.kind, payload = %n.payload, "notification");
        }
    });

    // Each stdin line counts as a key press.
    let activity = runtime.activity();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    tracing::info!(logged_in = store.is_logged_in(), "gigboard agent running; ctrl-c or EOF to exit");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line {
                Ok(Some(_)) => {
                    activity.record(ActivityEvent::KeyDown);
                }
                Ok(None) => {
                    tracing::info!("stdin closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            },
        }
    }

    runtime.teardown().await;
}
