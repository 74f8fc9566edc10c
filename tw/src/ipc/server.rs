//! IPC server - answers CLI requests from the [`WatchService`]

use std::sync::Arc;

use eyre::Result;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::listener::{read_message, send_response};
use super::messages::{DaemonMessage, DaemonResponse};
use crate::daemon::VERSION;
use crate::reconcile::ReconcileError;
use crate::service::WatchService;

/// Accept connections until `shutdown` fires; one task per connection
///
/// A `Shutdown` request cancels `shutdown` after acknowledging.
pub async fn serve(listener: UnixListener, service: Arc<WatchService>, shutdown: CancellationToken) {
    info!("IPC server listening");
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let service = service.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, service, shutdown).await {
                            debug!(error = %e, "serve: connection ended with error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "serve: accept failed"),
            },
        }
    }
    info!("IPC server stopped");
}

fn error_response(e: &ReconcileError) -> DaemonResponse {
    DaemonResponse::error(e.class().as_str(), e.to_string())
}

/// Answer one request
pub async fn handle_connection(
    mut stream: UnixStream,
    service: Arc<WatchService>,
    shutdown: CancellationToken,
) -> Result<()> {
    let msg = match read_message(&mut stream).await {
        Ok(msg) => msg,
        Err(e) => {
            let response = DaemonResponse::error("bad-request", format!("{e:#}"));
            return send_response(&mut stream, &response).await;
        }
    };

    let response = match msg {
        DaemonMessage::SubmitUrl { url, save_path } => match service.submit_url(&url, save_path).await {
            Ok(report) => DaemonResponse::Submitted {
                status: report.status,
                item: report.item,
            },
            Err(e) => error_response(&e),
        },
        DaemonMessage::ListItems => match service.list_tracked_items().await {
            Ok(items) => DaemonResponse::Items { items },
            Err(e) => error_response(&e),
        },
        DaemonMessage::RemoveItem { id } => match service.remove_item(id).await {
            Ok(()) => DaemonResponse::Ok,
            Err(e) => error_response(&e),
        },
        DaemonMessage::SetWatch { id, minutes } => match service.set_watch(id, minutes).await {
            Ok(()) => DaemonResponse::Ok,
            Err(e) => error_response(&e),
        },
        DaemonMessage::DownloadPaths => match service.download_paths().await {
            Ok(paths) => DaemonResponse::Paths { paths },
            Err(e) => error_response(&e),
        },
        DaemonMessage::Subscribe => return stream_events(stream, &service, &shutdown).await,
        DaemonMessage::Ping => DaemonResponse::Pong {
            version: VERSION.to_string(),
        },
        DaemonMessage::Shutdown => {
            info!("IPC: shutdown requested");
            send_response(&mut stream, &DaemonResponse::Ok).await?;
            shutdown.cancel();
            return Ok(());
        }
    };

    send_response(&mut stream, &response).await
}

async fn stream_events(mut stream: UnixStream, service: &WatchService, shutdown: &CancellationToken) -> Result<()> {
    let (statuses, mut rx) = match service.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => return send_response(&mut stream, &error_response(&e)).await,
    };
    send_response(&mut stream, &DaemonResponse::Snapshot { statuses }).await?;

    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            event = rx.recv() => event,
        };
        match event {
            Ok(event) => send_response(&mut stream, &DaemonResponse::Event { event }).await?,
            Err(RecvError::Lagged(missed)) => warn!(missed, "stream_events: subscriber lagging, events dropped"),
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}
