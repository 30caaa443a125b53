use std::sync::Arc;

use arsip::prelude::*;

/// Optional `Cookie` value for the API origin, e.g. `access_token=...`.
const ENV_SESSION_COOKIE: &str = "ARSIP_SESSION_COOKIE";
/// Where the session clock is persisted. In memory when unset.
const ENV_SESSION_FILE: &str = "ARSIP_SESSION_FILE";

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn describe(notification: &Notification) -> String {
    match &notification.channel {
        Channel::Sidebar => match notification.decode::<SidebarCounts>() {
            Ok(counts) => format!(
                "menu {} has {} unread",
                counts.code_notif, counts.unread_count
            ),
            Err(e) => format!("unreadable sidebar payload: {e}"),
        },
        Channel::Connection => match notification.decode::<ConnectionStatus>() {
            Ok(ConnectionStatus::Reconnecting { attempt }) => {
                format!("reconnecting (attempt {attempt})")
            }
            Ok(ConnectionStatus::Connected) => "connected".to_string(),
            Ok(ConnectionStatus::Disconnected) => "disconnected".to_string(),
            Ok(ConnectionStatus::Failed) => "gave up reconnecting".to_string(),
            Ok(ConnectionStatus::AuthenticationFailed) => {
                "session rejected, log in again".to_string()
            }
            Err(e) => format!("unreadable connection payload: {e}"),
        },
        other => format!("{}: {}", other.as_str(), notification.payload),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ArsipConfig::from_env()?;
    init_tracing(config.debug_mode);

    let store: Arc<dyn SessionStore> = match std::env::var(ENV_SESSION_FILE) {
        Ok(path) if !path.is_empty() => Arc::new(FileStore::new(path)),
        _ => Arc::new(MemoryStore::new()),
    };
    let session = SessionCoordinator::http(config, store, Arc::new(LogNavigator))?;

    if let Ok(cookie) = std::env::var(ENV_SESSION_COOKIE) {
        session.transport().add_cookie(&cookie)?;
    }
    session.record_login()?;
    let _keepalive = session.spawn_keepalive();

    let _subscriptions: Vec<Subscription> = [Channel::Sidebar, Channel::Connection, Channel::Error]
        .into_iter()
        .map(|channel| {
            session.notifications().subscribe(channel, |n: &Notification| {
                tracing::info!(channel = %n.channel, "{}", describe(n));
            })
        })
        .collect();

    session.notifications().connect();
    tracing::info!("tailing notifications, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    session.logout()?;
    Ok(())
}
