use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::{packet, LightCommand, LightSink};

pub const DEFAULT_LIGHT_PORT: u16 = 56700;

/// Broadcasts light commands on the local segment
pub struct LanLightClient {
    socket: UdpSocket,
    target: SocketAddr,
}

impl LanLightClient {
    pub fn new(broadcast: Ipv4Addr, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).context("Failed to bind light socket")?;
        socket
            .set_broadcast(true)
            .context("Failed to enable broadcast on light socket")?;

        let target = SocketAddr::from((broadcast, port));
        info!("Light commands go to {}", target);

        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl LightSink for LanLightClient {
    fn send(&self, command: &LightCommand) -> Result<()> {
        let datagram = packet::encode(command);
        self.socket
            .send_to(&datagram, self.target)
            .with_context(|| format!("Failed to send light command to {}", self.target))?;
        debug!("Sent {:?} ({} bytes)", command, datagram.len());
        Ok(())
    }
}
