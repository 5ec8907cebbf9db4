//! Remote debug bridge
//!
//! A TCP service attached to one domain. Each client receives a JSON line
//! announcing the attachment, then one JSON line per domain exception:
//!
//! ```text
//! {"event":"attached","module":"gameplay","main_thread":"ThreadId(1)"}
//! {"event":"exception","kind":"NativeError","message":"...","stack":["at A::B (a.hfx:3)"]}
//! ```
//!
//! The bridge stops when dropped and removes its exception observer.

use hotfix_engine::{DebugService, DomainException, ObserverId};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::error::{HotfixError, HotfixResult};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum BridgeEvent {
    Attached {
        module: String,
        main_thread: Option<String>,
    },
    Exception {
        kind: String,
        message: String,
        stack: Vec<String>,
    },
}

impl BridgeEvent {
    fn from_exception(exception: &DomainException) -> Self {
        BridgeEvent::Exception {
            kind: exception.kind.clone(),
            message: exception.message.clone(),
            stack: exception.stack.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn to_line(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(mut line) => {
                line.push('\n');
                Some(line)
            }
            Err(e) => {
                warn!(error = %e, "failed to serialize bridge event");
                None
            }
        }
    }
}

/// Running debug bridge for one domain
#[derive(Debug)]
pub struct DebugBridge {
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    debug: Weak<DebugService>,
    observer: ObserverId,
}

impl DebugBridge {
    /// Bind `addr` and start serving `debug`'s exceptions.
    ///
    /// Must be called from within a tokio runtime. Binding does not suspend.
    pub fn start(
        addr: SocketAddr,
        debug: &Arc<DebugService>,
        module: &str,
    ) -> HotfixResult<Self> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| HotfixError::DebugBridge(format!("no async runtime: {}", e)))?;

        let std_listener = std::net::TcpListener::bind(addr)
            .map_err(|e| HotfixError::DebugBridge(format!("bind {}: {}", addr, e)))?;
        std_listener.set_nonblocking(true)?;
        let local_addr = std_listener.local_addr()?;
        let listener = {
            let _enter = handle.enter();
            TcpListener::from_std(std_listener)?
        };

        let (events, _) = broadcast::channel::<String>(EVENT_BUFFER);
        let sender = events.clone();
        let observer = debug.add_exception_observer(move |exception| {
            if let Some(line) = BridgeEvent::from_exception(exception).to_line() {
                // No subscribers is not an error.
                let _ = sender.send(line);
            }
        });

        let hello = BridgeEvent::Attached {
            module: module.to_string(),
            main_thread: debug.main_thread().map(|id| format!("{:?}", id)),
        }
        .to_line()
        .unwrap_or_default();

        let accept_task = handle.spawn(accept_loop(listener, events, hello));
        info!(addr = %local_addr, module, "debug bridge listening");

        Ok(Self {
            local_addr,
            accept_task,
            debug: Arc::downgrade(debug),
            observer,
        })
    }

    /// Address the bridge is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and disconnect all clients
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for DebugBridge {
    fn drop(&mut self) {
        self.accept_task.abort();
        if let Some(debug) = self.debug.upgrade() {
            debug.remove_exception_observer(self.observer);
        }
        debug!(addr = %self.local_addr, "debug bridge stopped");
    }
}

// Dropping the JoinSet aborts every client task.
async fn accept_loop(listener: TcpListener, events: broadcast::Sender<String>, hello: String) {
    let mut clients = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!(%peer, "debugger attached");
                    let rx = events.subscribe();
                    clients.spawn(serve_client(stream, rx, hello.clone()));
                }
                Err(e) => warn!(error = %e, "debug bridge accept failed"),
            },
            Some(_) = clients.join_next(), if !clients.is_empty() => {}
        }
    }
}

async fn serve_client(mut stream: TcpStream, mut rx: broadcast::Receiver<String>, hello: String) {
    if stream.write_all(hello.as_bytes()).await.is_err() {
        return;
    }
    loop {
        match rx.recv().await {
            Ok(line) => {
                if let Err(e) = stream.write_all(line.as_bytes()).await {
                    debug!(error = %e, "debugger disconnected");
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "debugger too slow, exception reports dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotfix_engine::StackFrame;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[test]
    fn test_event_json_shape() {
        let exception = DomainException::new("NativeError", "boom").with_frame(StackFrame {
            type_name: "A".into(),
            method: "B".into(),
            location: None,
        });
        let line = BridgeEvent::from_exception(&exception).to_line().unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["event"], "exception");
        assert_eq!(value["kind"], "NativeError");
        assert_eq!(value["stack"][0], "at A::B");
    }

    #[test]
    fn test_start_requires_runtime() {
        let debug = Arc::new(DebugService::new());
        let err = DebugBridge::start("127.0.0.1:0".parse().unwrap(), &debug, "m").unwrap_err();
        assert!(matches!(err, HotfixError::DebugBridge(_)));
        assert_eq!(debug.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_client_receives_attach_and_exceptions() {
        let debug = Arc::new(DebugService::new());
        debug.tag_main_thread();
        let bridge =
            DebugBridge::start("127.0.0.1:0".parse().unwrap(), &debug, "gameplay").unwrap();

        let stream = TcpStream::connect(bridge.local_addr()).await.unwrap();
        let mut lines = BufReader::new(stream).lines();

        let hello: serde_json::Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(hello["event"], "attached");
        assert_eq!(hello["module"], "gameplay");
        assert!(hello["main_thread"].is_string());

        debug.report(&DomainException::new("Panic", "lost"));
        let event: serde_json::Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(event["event"], "exception");
        assert_eq!(event["message"], "lost");

        bridge.stop();
    }

    #[tokio::test]
    async fn test_stop_removes_observer() {
        let debug = Arc::new(DebugService::new());
        debug.add_exception_observer(|_| {});
        let bridge = DebugBridge::start("127.0.0.1:0".parse().unwrap(), &debug, "m").unwrap();
        assert_eq!(debug.observer_count(), 2);

        bridge.stop();
        assert_eq!(debug.observer_count(), 1);
        assert_eq!(debug.report(&DomainException::new("Panic", "after stop")), 1);
    }
}
