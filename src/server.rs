use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, instrument, warn};

use crate::buffer;
use crate::commands::CommandDispatcher;
use crate::config::Config;
use crate::connection::Connection;
use crate::snapshot;
use crate::store::Store;
use crate::Error;

/// Runs the server until Ctrl-C: restores the last snapshot, accepts connections, saves the store
/// periodically and one last time on the way out.
pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let store = Store::new();
    restore(&store, &config.snapshot_path).await;

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Redis server listening on {}", listener.local_addr()?);

    let snapshots = config.snapshot_period().map(|period| {
        tokio::spawn(snapshot::run_periodic(
            store.clone(),
            config.snapshot_path.clone(),
            period,
        ))
    });

    let res = tokio::select! {
        res = serve(listener, store.clone(), config.max_buffer_size) => res,
        _ = signal::ctrl_c() => {
            info!("The shutdown signal has been received");
            Ok(())
        }
    };

    if let Some(snapshots) = snapshots {
        snapshots.abort();
    }

    match snapshot::save_store(&store, &config.snapshot_path).await {
        Ok(count) => info!(count, "Final snapshot written"),
        Err(err) => error!(cause = %err, "Failed to write final snapshot"),
    }

    res
}

/// Accepts connections on `listener` and spawns a worker for each of them. Only returns when
/// accepting keeps failing.
pub async fn serve(
    listener: TcpListener,
    store: Store,
    max_buffer_size: usize,
) -> Result<(), Error> {
    let dispatcher = Arc::new(CommandDispatcher::with_builtin_commands());

    loop {
        let (socket, client_address) = accept(&listener).await?;
        let store = store.clone();
        let dispatcher = dispatcher.clone();
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            let res =
                handle_connection(socket, client_address, store, dispatcher, max_buffer_size).await;

            if let Err(err) = res {
                match err.downcast_ref::<buffer::Error>() {
                    Some(cause) => warn!(%cause, %client_address, "Closing connection"),
                    None => error!(cause = %err, %client_address, "Connection error"),
                }
            }
        });
    }
}

/// Loads the snapshot into `store`. A missing or unreadable snapshot leaves the store empty.
async fn restore(store: &Store, path: &Path) {
    match snapshot::load(path).await {
        Ok(pairs) => {
            let count = pairs.len();
            store.restore(pairs);
            info!(count, path = %path.display(), "Restored snapshot");
        }
        Err(err) => {
            warn!(cause = %err, path = %path.display(), "No snapshot restored, starting empty")
        }
    }
}

/// Errors are handled by backing off and retrying, doubling the pause each time. Gives up after
/// waiting 64 seconds.
async fn accept(listener: &TcpListener) -> Result<(TcpStream, SocketAddr), Error> {
    let mut backoff = 1;

    loop {
        match listener.accept().await {
            Ok(accepted) => return Ok(accepted),
            Err(err) => {
                if backoff > 64 {
                    return Err(err.into());
                }
                error!(cause = %err, backoff, "Failed to accept connection");
            }
        }

        time::sleep(Duration::from_secs(backoff)).await;

        backoff *= 2;
    }
}

#[instrument(
    name = "connection",
    skip(stream, store, dispatcher, max_buffer_size),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    store: Store,
    dispatcher: Arc<CommandDispatcher>,
    max_buffer_size: usize,
) -> Result<(), Error> {
    let mut conn = Connection::new(stream, max_buffer_size);

    tracing::Span::current()
        .record("connection_id", tracing::field::display(conn.id))
        .record("client_address", tracing::field::display(client_address));

    while let Some(args) = conn.read_command().await? {
        // `*0\r\n` and top level nulls carry no command, Redis stays silent on them too.
        if args.is_empty() {
            continue;
        }

        debug!(
            command = %String::from_utf8_lossy(&args[0]),
            args = args.len() - 1,
            "Received command from client"
        );
        let res = dispatcher.execute(&store, &args);
        debug!("Sending response to client: {}", res);

        conn.write_frame(res).await?;
    }

    info!("Connection closed");
    Ok(())
}
