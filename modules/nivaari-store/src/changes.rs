//! Change propagation over Postgres LISTEN/NOTIFY.
//!
//! Writers NOTIFY a channel per table after each mutation; live streams
//! LISTEN and rebuild their snapshot on every nudge. The payload carries no
//! data — a notification means "something changed, reload", nothing more.

use anyhow::Result;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::warn;

/// One channel per mutable table.
pub mod channel {
    pub const CITIZEN_REPORTS: &str = "nivaari_citizen_reports";
    pub const MODERATOR_DECISIONS: &str = "nivaari_moderator_decisions";
    pub const MAP_PINS: &str = "nivaari_map_pins";
    pub const MODERATORS: &str = "nivaari_moderators";
    pub const USERS: &str = "nivaari_users";
}

/// Best-effort PG NOTIFY — a nudge, not a delivery guarantee. Streams that
/// miss one catch up on the next change or rebuild on reconnect.
pub async fn notify(pool: &PgPool, channel: &str) {
    let result = sqlx::query("SELECT pg_notify($1, '')")
        .bind(channel)
        .execute(pool)
        .await;

    if let Err(e) = result {
        warn!(error = %e, channel, "PG NOTIFY failed (non-fatal)");
    }
}

/// A LISTEN subscription across one or more channels. Dropping the feed
/// tears the listening connection down.
pub struct ChangeFeed {
    listener: PgListener,
}

impl ChangeFeed {
    pub async fn connect(pool: &PgPool, channels: &[&str]) -> Result<Self> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen_all(channels.iter().copied()).await?;
        Ok(Self { listener })
    }

    /// Wait for the next change on any subscribed channel. Returns the
    /// channel name, or `None` once the listening connection is lost —
    /// callers should end their stream and let the client reconnect.
    pub async fn changed(&mut self) -> Option<String> {
        match self.listener.recv().await {
            Ok(notification) => Some(notification.channel().to_string()),
            Err(e) => {
                warn!(error = %e, "change listener connection lost");
                None
            }
        }
    }
}
