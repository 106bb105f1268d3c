//! WebSocket listener and per-connection tasks

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::broadcaster::DashboardBroadcaster;
use crate::dispatcher::RequestDispatcher;
use crate::error::{BroadcasterError, Result};
use crate::registry::{ConnectionHandle, ConnectionRegistry, Outbound};
use crate::topic::Topic;

/// Upper bound on a single accept attempt
const ACCEPT_TIMEOUT: Duration = Duration::from_millis(1);

/// Pause between accept loop iterations
const LOOP_SLEEP: Duration = Duration::from_millis(5);

/// Connections must finish the WebSocket handshake within this time
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `stop` waits for connection tasks before aborting them
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

type ConnectionTasks = Arc<Mutex<JoinSet<()>>>;

/// Accepts dashboard connections and assigns them to topics
pub struct DashboardServer {
    addr: SocketAddr,
    broadcaster: Arc<DashboardBroadcaster>,
    dispatcher: Arc<RequestDispatcher>,
    local_addr: Arc<RwLock<Option<SocketAddr>>>,
    accept_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    connections: ConnectionTasks,
    running: Arc<RwLock<bool>>,
}

impl DashboardServer {
    pub fn new(
        addr: SocketAddr,
        broadcaster: Arc<DashboardBroadcaster>,
        dispatcher: Arc<RequestDispatcher>,
    ) -> Self {
        Self {
            addr,
            broadcaster,
            dispatcher,
            local_addr: Arc::new(RwLock::new(None)),
            accept_task: Arc::new(Mutex::new(None)),
            connections: Arc::new(Mutex::new(JoinSet::new())),
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.broadcaster.registry()
    }

    /// Address actually bound, once started
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().await
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Bind the listener and spawn the accept loop.
    ///
    /// Returns the bound address (useful when the configured port is 0).
    pub async fn start(&self) -> Result<SocketAddr> {
        if *self.running.read().await {
            return Err(BroadcasterError::AlreadyRunning);
        }

        let listener = TcpListener::bind(self.addr).await?;
        let bound = listener.local_addr()?;
        *self.local_addr.write().await = Some(bound);

        tracing::info!("Dashboard server listening on {}", bound);

        *self.running.write().await = true;

        let running = Arc::clone(&self.running);
        let broadcaster = Arc::clone(&self.broadcaster);
        let dispatcher = Arc::clone(&self.dispatcher);
        let connections = Arc::clone(&self.connections);

        let task = tokio::spawn(async move {
            accept_loop(listener, bound, running, connections, broadcaster, dispatcher).await;
        });

        *self.accept_task.lock().await = Some(task);

        Ok(bound)
    }

    /// Stop accepting and close every open connection
    pub async fn stop(&self) -> Result<()> {
        if !*self.running.read().await {
            return Err(BroadcasterError::NotStarted);
        }

        *self.running.write().await = false;

        if let Some(task) = self.accept_task.lock().await.take() {
            task.abort();
            let _ = task.await;
        }

        self.registry().close_all().await;

        // Closed connections exit on their own; handshakes still pending are cut off
        let mut connections = std::mem::take(&mut *self.connections.lock().await);
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while connections.join_next().await.is_some() {}
        })
        .await
        .is_ok();
        if !drained {
            tracing::warn!("Aborting {} connection tasks still running", connections.len());
            connections.shutdown().await;
        }

        *self.local_addr.write().await = None;

        tracing::info!("Dashboard server stopped");
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    bound: SocketAddr,
    running: Arc<RwLock<bool>>,
    connections: ConnectionTasks,
    broadcaster: Arc<DashboardBroadcaster>,
    dispatcher: Arc<RequestDispatcher>,
) {
    let mut listener = Some(listener);

    loop {
        if !*running.read().await {
            break;
        }

        match listener.as_ref() {
            Some(active) => {
                let accepted = tokio::time::timeout(ACCEPT_TIMEOUT, active.accept()).await;
                match accepted {
                    // Nothing pending
                    Err(_) => {}
                    Ok(Ok((stream, peer))) => {
                        let running = Arc::clone(&running);
                        let broadcaster = Arc::clone(&broadcaster);
                        let dispatcher = Arc::clone(&dispatcher);
                        connections.lock().await.spawn(async move {
                            if let Err(e) = serve_connection(stream, peer, running, broadcaster, dispatcher).await {
                                tracing::warn!("Connection from {} ended with error: {}", peer, e);
                            }
                        });
                    }
                    Ok(Err(e)) => {
                        tracing::error!("Accept failed, restarting listener: {}", e);
                        listener = None;
                    }
                }
            }
            None => match TcpListener::bind(bound).await {
                Ok(fresh) => {
                    tracing::info!("Listener restarted on {}", bound);
                    listener = Some(fresh);
                }
                Err(e) => tracing::error!("Failed to rebind {}: {}", bound, e),
            },
        }

        {
            let mut connections = connections.lock().await;
            while connections.try_join_next().is_some() {}
        }
        broadcaster.registry().sweep().await;
        tokio::time::sleep(LOOP_SLEEP).await;
    }

    tracing::info!("Accept loop stopped");
}

/// Request path without any query string
fn request_path(request: &Request) -> &str {
    request.uri().path()
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    running: Arc<RwLock<bool>>,
    broadcaster: Arc<DashboardBroadcaster>,
    dispatcher: Arc<RequestDispatcher>,
) -> Result<()> {
    let mut topic = None;
    let callback = |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
        let path = request_path(request);
        match Topic::from_path(path) {
            Ok(resolved) => {
                topic = Some(resolved);
                Ok(response)
            }
            Err(e) => {
                tracing::warn!("Rejected connection from {}: {}", peer, e);
                let mut rejection = ErrorResponse::new(Some(e.to_string()));
                *rejection.status_mut() = StatusCode::NOT_FOUND;
                Err(rejection)
            }
        }
    };

    let handshake = tokio_tungstenite::accept_hdr_async(stream, callback);
    let mut socket = match tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake).await {
        Ok(result) => result?,
        Err(_) => return Err(BroadcasterError::HandshakeTimeout),
    };
    let topic = topic.ok_or_else(|| BroadcasterError::UnknownTopic(String::new()))?;

    let registry = broadcaster.registry();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = registry.next_id();
    registry
        .join(ConnectionHandle::new(id, topic, Some(peer), tx))
        .await;

    // `stop` clears the flag before closing members, so a join that raced
    // past `close_all` is caught here
    if !*running.read().await {
        registry.leave(id).await;
        socket.close(None).await?;
        return Ok(());
    }

    broadcaster.on_open(topic).await;

    let (mut sink, mut frames) = socket.split();

    let writer = async {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Text(text) => sink.send(Message::Text(text.into())).await?,
                Outbound::Close => {
                    sink.send(Message::Close(None)).await?;
                    break;
                }
            }
        }
        Ok::<(), BroadcasterError>(())
    };

    let reader = async {
        while let Some(frame) = frames.next().await {
            match frame? {
                Message::Text(text) => dispatcher.handle(text.as_str()).await,
                Message::Close(_) => break,
                _ => {}
            }
        }
        Ok::<(), BroadcasterError>(())
    };

    let result = tokio::select! {
        result = writer => result,
        result = reader => result,
    };

    registry.leave(id).await;
    result
}
