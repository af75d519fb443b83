//! tokio runtime for the gateway.
//!
//! [`Server`] accepts TCP connections and spawns one task per connection.
//! Each task owns its own [`StateMachine`] and [`GatewayCodec`]; nothing is
//! shared between tasks except the read-only [`Config`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::codec::GatewayCodec;
use crate::config::Config;
use crate::connection::{Clock, ConnectionId, DecodedUnit, Phase, StateMachine};
use crate::error::{Error, Result};

/// A bound gateway listener.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    config: Arc<Config>,
}

impl Server {
    /// Bind to `config.bind_addr`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the address cannot be bound.
    pub async fn bind(config: Config) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!(addr = %config.bind_addr, endpoint = %config.endpoint_uri(), "gateway listening");
        Ok(Self {
            listener,
            config: Arc::new(config),
        })
    }

    /// The address actually bound, useful when binding port 0.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accept connections forever.
    ///
    /// # Errors
    ///
    /// Never returns `Ok`; accept errors are logged and the loop continues.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already spawned keep running after the loop stops.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok(())` once `shutdown` completes.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut next_id = 0u64;

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("gateway shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    next_id += 1;
                    let id = ConnectionId(next_id);
                    let config = Arc::clone(&self.config);
                    debug!(connection = %id, %peer, "accepted");

                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, &config, id).await {
                            debug!(connection = %id, %peer, error = %e, "connection ended with error");
                        }
                    });
                }
            }
        }
    }
}

/// Drive one connection to completion.
///
/// Decodes units according to the current phase, feeds them to a fresh
/// [`StateMachine`] and writes whatever it emits. Once the machine reaches
/// `Closing` (or the peer goes away) the transport is shut down and the
/// machine is marked `Closed`.
///
/// # Errors
///
/// Returns the condition that tore the connection down, if any. A clean close
/// handshake or the peer disconnecting between units returns `Ok(())`.
pub async fn serve_connection<T>(io: T, config: &Config, id: ConnectionId) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut machine = StateMachine::new(id, config);
    let mut codec = GatewayCodec::new(io, config.clone());

    let outcome = drive(&mut machine, &mut codec).await;

    if let Err(e) = codec.shutdown().await {
        debug!(connection = %id, error = %e, "shutdown failed");
    }
    machine.on_shutdown();
    debug!(connection = %id, frames = machine.state().frames_dispatched(), "closed");
    outcome
}

async fn drive<T, C>(machine: &mut StateMachine<C>, codec: &mut GatewayCodec<T>) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
    C: Clock,
{
    loop {
        let decoded = match machine.phase() {
            Phase::AwaitingUpgrade => codec.read_request().await.map(|r| r.map(DecodedUnit::from)),
            Phase::Established => codec.read_frame().await.map(|f| f.map(DecodedUnit::from)),
            Phase::Closing | Phase::Closed => return Ok(()),
        };

        let step = match decoded {
            Ok(Some(unit)) => machine.handle(unit),
            Ok(None) => {
                debug!(connection = %machine.state().id(), phase = %machine.phase(), "peer disconnected");
                return Ok(());
            }
            Err(cause) => machine.fail(cause),
        };

        for unit in &step.outbound {
            if let Err(e) = codec.write(unit).await {
                return Err(write_failed(machine, e));
            }
        }
        if let Err(e) = codec.flush().await {
            return Err(write_failed(machine, e));
        }

        if let Some(cause) = step.error {
            return Err(cause);
        }
    }
}

/// Route a write failure to teardown unless the connection is already closing.
fn write_failed<C: Clock>(machine: &mut StateMachine<C>, e: Error) -> Error {
    if !machine.phase().is_closing() {
        machine.fail(e.clone());
    }
    e
}
