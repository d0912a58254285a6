//! Address helpers and the TCP reachability wait used before opening a pool

use std::net::IpAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::database::ConnectionError;

const DIAL_INTERVAL: Duration = Duration::from_millis(100);

/// True for the unspecified address (`0.0.0.0` or `::`)
pub fn is_any(ip: IpAddr) -> bool {
    ip.is_unspecified()
}

/// True when `addr` carries an explicit port (`host:port` or `[v6]:port`)
pub fn contains_port(addr: &str) -> bool {
    if let Some(rest) = addr.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((_, tail)) => tail
                .strip_prefix(':')
                .is_some_and(|port| !port.is_empty() && port.parse::<u16>().is_ok()),
            None => false,
        };
    }

    match addr.rsplit_once(':') {
        // a bare IPv6 address has several colons and no brackets
        Some((host, port)) => {
            !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}

/// Dial `addr` until a TCP connection succeeds or `max_wait` elapses
pub async fn dial_until_reachable(addr: &str, max_wait: Duration) -> Result<(), ConnectionError> {
    let deadline = Instant::now() + max_wait;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let attempt = tokio::time::timeout(remaining.max(DIAL_INTERVAL), TcpStream::connect(addr));

        match attempt.await {
            Ok(Ok(_stream)) => {
                tracing::debug!(address = %addr, "Address is reachable");
                return Ok(());
            }
            Ok(Err(e)) => tracing::debug!(address = %addr, error = %e, "Address not reachable yet"),
            Err(_) => tracing::debug!(address = %addr, "Dial timed out"),
        }

        if Instant::now() + DIAL_INTERVAL > deadline {
            tracing::warn!(address = %addr, waited = ?max_wait, "Gave up waiting for address");
            return Err(ConnectionError::Unreachable {
                address: addr.to_string(),
                waited: max_wait,
            });
        }
        tokio::time::sleep(DIAL_INTERVAL).await;
    }
}
