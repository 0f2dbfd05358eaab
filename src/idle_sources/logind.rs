use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use log::info;
use zbus::{Connection, proxy, proxy::PropertyStream};
use zvariant::OwnedObjectPath;

use crate::idle::IdleEventSource;

#[proxy(
    interface = "org.freedesktop.login1.Seat",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1/seat/seat0"
)]
trait Seat {
    /// Session id and object path of the session in the foreground.
    #[zbus(property)]
    fn active_session(&self) -> zbus::Result<(String, OwnedObjectPath)>;
}

#[proxy(
    interface = "org.freedesktop.login1.Session",
    default_service = "org.freedesktop.login1"
)]
trait Session {
    #[zbus(property)]
    fn idle_hint(&self) -> zbus::Result<bool>;
}

/// `IdleHint` of the active session on `seat0`, as reported by logind.
pub struct LogindIdleSource {
    // Keeps the proxy and its connection alive for the stream.
    _session: SessionProxy<'static>,
    changes: PropertyStream<'static, bool>,
}

impl LogindIdleSource {
    /// Subscribes to the idle hint of the session active at call time.
    pub async fn connect() -> Result<Self> {
        let connection = Connection::system()
            .await
            .context("Failed to connect to the system bus")?;

        let seat = SeatProxy::new(&connection)
            .await
            .context("Failed to reach logind seat0")?;
        let (id, path) = seat
            .active_session()
            .await
            .context("Failed to resolve active session")?;

        let session = SessionProxy::builder(&connection)
            .path(path.into_inner())?
            .build()
            .await
            .with_context(|| format!("Failed to reach logind session {id}"))?;
        let changes = session.receive_idle_hint_changed().await;

        info!("Watching IdleHint of logind session {id}");
        Ok(Self {
            _session: session,
            changes,
        })
    }
}

#[async_trait]
impl IdleEventSource for LogindIdleSource {
    async fn next_change(&mut self) -> Result<Option<bool>> {
        match self.changes.next().await {
            Some(change) => Ok(Some(
                change.get().await.context("Failed to read IdleHint")?,
            )),
            None => Ok(None),
        }
    }

    fn name(&self) -> &'static str {
        "logind"
    }
}
