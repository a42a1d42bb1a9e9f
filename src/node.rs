//! libp2p node: transports, listeners, and the swarm driver task.
//!
//! A [`Node`] owns a swarm running TCP (noise + yamux) and QUIC v1 with the
//! `libp2p-stream` behaviour, which hands out raw protocol streams. The swarm
//! itself lives on a background task; the handle talks to it over a command
//! channel and exposes a [`libp2p_stream::Control`] for opening and accepting
//! streams.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use libp2p::swarm::dial_opts::DialOpts;
use libp2p::swarm::SwarmEvent;
use libp2p::{noise, tcp, yamux, Multiaddr, PeerId, Swarm, SwarmBuilder};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::addr::PeerAddr;
use crate::config::NetworkConfig;
use crate::identity::Identity;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound on waiting for every listener to report an address.
const LISTEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra time to collect per-interface addresses of wildcard listeners.
const LISTEN_SETTLE: Duration = Duration::from_millis(100);

const COMMAND_BUFFER: usize = 16;

type Behaviour = libp2p_stream::Behaviour;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum NodeError {
    /// No connection was established before the deadline.
    #[error("timed out after {timeout:?} connecting to {peer}")]
    ConnectTimeout { peer: PeerId, timeout: Duration },

    /// The dial was attempted and failed.
    #[error("failed to connect to {peer}: {reason}")]
    Dial { peer: PeerId, reason: String },

    /// The swarm driver task is gone.
    #[error("network driver has shut down")]
    Shutdown,
}

enum Command {
    Dial {
        peer: PeerId,
        addr: Multiaddr,
        reply: oneshot::Sender<Result<(), String>>,
    },
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Handle to a running libp2p node.
///
/// Dropping the handle stops the swarm driver, which closes every connection.
pub struct Node {
    peer_id: PeerId,
    listen_addrs: Vec<Multiaddr>,
    control: libp2p_stream::Control,
    commands: mpsc::Sender<Command>,
    driver: Option<JoinHandle<()>>,
}

impl Node {
    /// Build the swarm, bring up `listen` addresses (may be empty for a
    /// dial-only node), and spawn the driver.
    ///
    /// Returns once every listener has reported at least one address, so
    /// [`Node::listen_addrs`] is complete for printing.
    pub async fn start(
        identity: &Identity,
        config: &NetworkConfig,
        listen: &[Multiaddr],
    ) -> Result<Self> {
        let mut swarm = build_swarm(identity, config)?;
        let peer_id = *swarm.local_peer_id();
        let control = swarm.behaviour().new_control();

        let listen_addrs = if listen.is_empty() {
            Vec::new()
        } else {
            tokio::time::timeout(LISTEN_TIMEOUT, start_listeners(&mut swarm, listen))
                .await
                .context("timed out waiting for listeners to come up")??
        };

        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let driver = tokio::spawn(drive(swarm, command_rx));

        info!(%peer_id, listeners = listen_addrs.len(), "node started");

        Ok(Node {
            peer_id,
            listen_addrs,
            control,
            commands,
            driver: Some(driver),
        })
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Addresses the node is reachable on, without the `/p2p` suffix.
    pub fn listen_addrs(&self) -> &[Multiaddr] {
        &self.listen_addrs
    }

    /// A fresh handle for opening or accepting protocol streams.
    pub fn control(&self) -> libp2p_stream::Control {
        self.control.clone()
    }

    /// Connect to `peer`, giving up after `timeout`.
    ///
    /// Resolves as soon as a connection to the expected peer ID exists; a
    /// remote presenting a different identity fails the dial.
    pub async fn connect(&self, peer: &PeerAddr, timeout: Duration) -> Result<(), NodeError> {
        match tokio::time::timeout(timeout, self.dial(peer)).await {
            Ok(result) => result,
            Err(_) => Err(NodeError::ConnectTimeout {
                peer: peer.peer_id,
                timeout,
            }),
        }
    }

    async fn dial(&self, peer: &PeerAddr) -> Result<(), NodeError> {
        let (reply, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Dial {
                peer: peer.peer_id,
                addr: peer.addr.clone(),
                reply,
            })
            .await
            .map_err(|_| NodeError::Shutdown)?;

        reply_rx
            .await
            .map_err(|_| NodeError::Shutdown)?
            .map_err(|reason| NodeError::Dial {
                peer: peer.peer_id,
                reason,
            })
    }

    /// Stop the swarm driver and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
            let _ = driver.await;
        }
        debug!(peer_id = %self.peer_id, "node stopped");
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if let Some(driver) = &self.driver {
            driver.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Swarm construction
// ---------------------------------------------------------------------------

fn build_swarm(identity: &Identity, config: &NetworkConfig) -> Result<Swarm<Behaviour>> {
    let keypair = identity.keypair()?;
    let idle_timeout = config.idle_timeout();

    let swarm = SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(
            tcp::Config::default(),
            noise::Config::new,
            yamux::Config::default,
        )
        .context("failed to configure TCP transport")?
        .with_quic()
        .with_behaviour(|_| Behaviour::new())
        .context("failed to configure stream behaviour")?
        .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(idle_timeout))
        .build();

    Ok(swarm)
}

async fn start_listeners(
    swarm: &mut Swarm<Behaviour>,
    listen: &[Multiaddr],
) -> Result<Vec<Multiaddr>> {
    let mut pending = HashSet::new();
    for addr in listen {
        let id = swarm
            .listen_on(addr.clone())
            .with_context(|| format!("failed to listen on {addr}"))?;
        pending.insert(id);
    }

    let mut addrs = Vec::new();
    while !pending.is_empty() {
        match swarm.select_next_some().await {
            SwarmEvent::NewListenAddr {
                listener_id,
                address,
            } => {
                debug!(%address, "listener ready");
                pending.remove(&listener_id);
                addrs.push(address);
            }
            SwarmEvent::ListenerClosed {
                listener_id,
                reason,
                ..
            } => {
                anyhow::bail!("listener {listener_id:?} closed during startup: {reason:?}");
            }
            SwarmEvent::ListenerError { listener_id, error } => {
                anyhow::bail!("listener {listener_id:?} failed during startup: {error}");
            }
            other => trace!(event = ?other, "event before listeners were ready"),
        }
    }

    // Wildcard binds report one address per interface.
    while let Ok(Some(event)) = tokio::time::timeout(LISTEN_SETTLE, swarm.next()).await {
        if let SwarmEvent::NewListenAddr { address, .. } = event {
            debug!(%address, "listener ready");
            addrs.push(address);
        }
    }

    Ok(addrs)
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

type DialReply = oneshot::Sender<Result<(), String>>;

/// Callers waiting on an outbound connection, keyed by peer.
#[derive(Default)]
struct PendingDials {
    waiters: HashMap<PeerId, Vec<DialReply>>,
}

impl PendingDials {
    /// Queue `reply` for `peer`. Waiters whose `connect` already gave up are
    /// dropped first.
    fn insert(&mut self, peer: PeerId, reply: DialReply) {
        self.waiters.retain(|_, replies| {
            replies.retain(|r| !r.is_closed());
            !replies.is_empty()
        });
        self.waiters.entry(peer).or_default().push(reply);
    }

    fn resolve(&mut self, peer: &PeerId, result: Result<(), String>) {
        if let Some(replies) = self.waiters.remove(peer) {
            for reply in replies {
                let _ = reply.send(result.clone());
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.waiters.values().map(Vec::len).sum()
    }
}

/// Poll the swarm until every [`Node`] handle is gone.
async fn drive(mut swarm: Swarm<Behaviour>, mut commands: mpsc::Receiver<Command>) {
    let mut pending_dials = PendingDials::default();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("node handle dropped, stopping swarm driver");
                    return;
                };
                match command {
                    Command::Dial { peer, addr, reply } => {
                        if swarm.is_connected(&peer) {
                            let _ = reply.send(Ok(()));
                            continue;
                        }
                        let opts = DialOpts::peer_id(peer)
                            .addresses(vec![addr.clone()])
                            .build();
                        match swarm.dial(opts) {
                            Ok(()) => {
                                debug!(%peer, %addr, "dialing");
                                pending_dials.insert(peer, reply);
                            }
                            Err(e) => {
                                let _ = reply.send(Err(e.to_string()));
                            }
                        }
                    }
                }
            }

            event = swarm.select_next_some() => match event {
                SwarmEvent::ConnectionEstablished { peer_id, endpoint, .. } => {
                    let remote = endpoint.get_remote_address();
                    if endpoint.is_listener() {
                        info!(peer = %peer_id, "Incoming connection from {remote}");
                    } else {
                        debug!(peer = %peer_id, %remote, "outbound connection established");
                    }
                    pending_dials.resolve(&peer_id, Ok(()));
                }
                SwarmEvent::ConnectionClosed { peer_id, endpoint, cause, .. } => {
                    debug!(
                        peer = %peer_id,
                        remote = %endpoint.get_remote_address(),
                        cause = ?cause,
                        "connection closed"
                    );
                }
                SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                    warn!(peer = ?peer_id, error = %error, "outbound connection failed");
                    if let Some(peer) = peer_id {
                        pending_dials.resolve(&peer, Err(error.to_string()));
                    }
                }
                SwarmEvent::IncomingConnectionError { send_back_addr, error, .. } => {
                    warn!(remote = %send_back_addr, error = %error, "incoming connection failed");
                }
                SwarmEvent::NewListenAddr { address, .. } => {
                    info!(%address, "listening");
                }
                SwarmEvent::ExpiredListenAddr { address, .. } => {
                    info!(%address, "no longer listening");
                }
                SwarmEvent::ListenerError { error, .. } => {
                    warn!(error = %error, "listener error");
                }
                other => trace!(event = ?other, "swarm event"),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
