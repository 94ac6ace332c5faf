// Server loop module
// Accepts connections until a shutdown signal arrives

use std::future::Future;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Accept connections until `shutdown` resolves.
///
/// Must run inside a `LocalSet`: each connection is served by a local task.
/// Connections already accepted keep running after the loop returns, until
/// the runtime itself stops.
#[allow(clippy::ignored_unit_patterns)]
pub async fn start_server_loop<S>(listener: TcpListener, state: Arc<AppState>, shutdown: S)
where
    S: Future<Output = ()>,
{
    let active_connections = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            _ = &mut shutdown => {
                logger::log_shutdown();
                break;
            }
        }
    }
}
