//! This node's reachable address

use std::net::{IpAddr, Ipv4Addr};
use tokio::net::UdpSocket;
use tracing::debug;

/// Probe target; nothing is sent, connecting only selects the outbound route
const ROUTE_PROBE: (Ipv4Addr, u16) = (Ipv4Addr::new(8, 8, 8, 8), 10002);

/// Address of the interface carrying outbound traffic, or `127.0.0.1` when
/// there is no route.
pub async fn detect_node_ip() -> IpAddr {
    match outbound_route_ip().await {
        Ok(ip) => ip,
        Err(e) => {
            debug!(error = %e, "No outbound route, falling back to loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

async fn outbound_route_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect(ROUTE_PROBE).await?;
    Ok(socket.local_addr()?.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detected_address_is_concrete() {
        let ip = detect_node_ip().await;
        assert!(!ip.is_unspecified());
    }
}
