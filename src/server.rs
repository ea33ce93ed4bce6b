//! TCP accept loop with a connection cap, and the shutdown drain.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, warn};

use crate::engine::Engine;
use crate::observability;
use crate::wire;

/// How long shutdown waits for open connections to finish.
pub const DRAIN_GRACE: Duration = Duration::from_secs(10);

/// Connection slots. Every open connection holds one permit.
#[derive(Clone)]
pub struct ConnectionLimit {
    slots: Arc<Semaphore>,
    max: usize,
}

impl ConnectionLimit {
    pub fn new(max: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    pub fn try_admit(&self) -> Option<OwnedSemaphorePermit> {
        self.slots.clone().try_acquire_owned().ok()
    }

    pub fn open_connections(&self) -> usize {
        self.max - self.slots.available_permits()
    }

    /// Wait until every slot is free again, or `grace` runs out.
    /// Returns `true` when all connections closed in time.
    pub async fn drain(&self, grace: Duration) -> bool {
        let all = u32::try_from(self.max).unwrap_or(u32::MAX);
        matches!(
            tokio::time::timeout(grace, self.slots.acquire_many(all)).await,
            Ok(Ok(_))
        )
    }
}

fn spawn_connection(
    socket: TcpStream,
    peer: SocketAddr,
    permit: OwnedSemaphorePermit,
    engine: Arc<Engine>,
) {
    info!("connection from {peer}");
    metrics::counter!(observability::CONNECTIONS_TOTAL).increment(1);
    metrics::gauge!(observability::CONNECTIONS_ACTIVE).increment(1.0);

    tokio::spawn(async move {
        if let Err(e) = wire::process_connection(socket, engine).await {
            tracing::error!("connection error from {peer}: {e}");
        }
        metrics::gauge!(observability::CONNECTIONS_ACTIVE).decrement(1.0);
        drop(permit);
    });
}

/// Accept connections until `shutdown` resolves. Connections past the limit
/// are closed straight away.
pub async fn serve<F>(
    listener: TcpListener,
    engine: Arc<Engine>,
    limit: ConnectionLimit,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };
                let Some(permit) = limit.try_admit() else {
                    warn!("connection limit reached, rejecting {peer}");
                    metrics::counter!(observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                    continue;
                };
                spawn_connection(socket, peer, permit, engine.clone());
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::store::ReservationStore;
    use futures::{SinkExt, StreamExt};
    use tokio::sync::oneshot;
    use tokio_util::codec::{Framed, LinesCodec};

    fn test_engine(name: &str) -> Arc<Engine> {
        let dir = std::env::temp_dir().join("bookit_test_server").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let catalog = Catalog::parse("id scope\nname Scope\n\n.\n");
        Arc::new(Engine::new(catalog, ReservationStore::new(dir.join("reservations.txt"))).unwrap())
    }

    #[tokio::test]
    async fn drain_waits_for_open_connections() {
        let limit = ConnectionLimit::new(2);
        let permit = limit.try_admit().unwrap();
        assert_eq!(limit.open_connections(), 1);
        assert!(!limit.drain(Duration::from_millis(20)).await);

        drop(permit);
        assert_eq!(limit.open_connections(), 0);
        assert!(limit.drain(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn try_admit_respects_limit() {
        let limit = ConnectionLimit::new(1);
        let first = limit.try_admit();
        assert!(first.is_some());
        assert!(limit.try_admit().is_none());
        drop(first);
        assert!(limit.try_admit().is_some());
    }

    #[tokio::test]
    async fn serve_rejects_past_limit_and_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let limit = ConnectionLimit::new(1);
        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(
            listener,
            test_engine("limit"),
            limit.clone(),
            async move {
                let _ = stopped.await;
            },
        ));

        let mut first = Framed::new(TcpStream::connect(addr).await.unwrap(), LinesCodec::new());
        first.send("LIST").await.unwrap();
        let cookie = first.next().await.unwrap().unwrap();
        assert!(cookie.starts_with("SET-COOKIE"));

        // Over the limit: accepted and closed without a reply.
        let mut second = Framed::new(TcpStream::connect(addr).await.unwrap(), LinesCodec::new());
        let _ = second.send("LIST").await;
        assert!(!matches!(second.next().await, Some(Ok(_))));

        stop.send(()).unwrap();
        server.await.unwrap();

        drop(first);
        assert!(limit.drain(Duration::from_secs(5)).await);
    }
}
