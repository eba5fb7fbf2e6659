//! Outbound connection setup
//!
//! Builds a connected, multiplexer-registered SRT socket for the client roles.
//! Each acquired handle is owned by an RAII wrapper, so any early return
//! releases exactly what was created up to that point.

use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::ConnectError;
use crate::protocol::constants::SRT_DEFAULT_BIND_ADDRESS;
use crate::protocol::options::OptionProfile;
use crate::transport::{AddressFamily, EpollEvents, Poller, SharedTransport, SocketState, SrtSocket};

/// Parameters of an outbound connection
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Remote host name or address literal
    pub host: String,
    pub port: u16,
    /// Option profile; its role also selects the readiness interest
    pub profile: OptionProfile,
    pub bind_address: Option<String>,
    pub bind_port: u16,
}

impl ConnectRequest {
    fn needs_bind(&self) -> bool {
        self.bind_address.is_some() || self.bind_port != 0 || self.profile.rendezvous
    }
}

/// A connected socket with its multiplexer
#[derive(Debug)]
pub struct Connection {
    pub socket: SrtSocket,
    pub poller: Poller,
    /// Resolved remote address
    pub address: SocketAddr,
}

impl Connection {
    /// Deregister, close and release; safe to call more than once
    pub fn shutdown(&self) {
        self.poller.remove(&self.socket);
        self.socket.close();
        self.poller.release();
    }
}

fn resolve(host: &str, port: u16) -> Option<SocketAddr> {
    (host, port).to_socket_addrs().ok()?.next()
}

/// Connect to the host in `request`
pub fn connect(transport: &SharedTransport, request: &ConnectRequest) -> Result<Connection, ConnectError> {
    if request.host.is_empty() {
        return Err(ConnectError::InvalidHost);
    }

    let address = resolve(&request.host, request.port).ok_or_else(|| {
        ConnectError::AddressResolution {
            host: request.host.clone(),
            port: request.port,
        }
    })?;

    let poller = Poller::create(transport).map_err(ConnectError::MultiplexerInit)?;

    let socket = SrtSocket::create(transport, AddressFamily::of(&address))
        .map_err(ConnectError::SocketCreate)?;

    socket.apply_options(&request.profile.options());

    if request.needs_bind() {
        let bind_host = request
            .bind_address
            .as_deref()
            .unwrap_or(SRT_DEFAULT_BIND_ADDRESS);

        // Both peers of a rendezvous use the same port
        let bind_port = if request.profile.rendezvous {
            request.port
        } else {
            request.bind_port
        };

        let bind_addr = resolve(bind_host, bind_port).ok_or_else(|| ConnectError::Bind {
            addr: format!("{}:{}", bind_host, bind_port),
            reason: "cannot resolve address".into(),
        })?;

        tracing::debug!(socket = socket.raw(), addr = %bind_addr, "Binding SRT socket");

        socket.bind(bind_addr).map_err(|e| ConnectError::Bind {
            addr: bind_addr.to_string(),
            reason: e.to_string(),
        })?;
    }

    socket
        .connect(address)
        .map_err(|source| ConnectError::Connect { addr: address, source })?;

    match socket.state() {
        SocketState::Connected => {}
        state => return Err(ConnectError::NotConnected(state)),
    }

    let interest = if request.profile.role.is_sender() {
        EpollEvents::sender()
    } else {
        EpollEvents::receiver()
    };
    poller.add(&socket, interest).map_err(ConnectError::Register)?;

    tracing::info!(
        socket = socket.raw(),
        poll = poller.raw(),
        peer = %address,
        role = ?request.profile.role,
        "SRT connection established"
    );

    Ok(Connection {
        socket,
        poller,
        address,
    })
}
