//! Listener binding for the dev and reload servers.

use std::net::{IpAddr, SocketAddr, TcpListener};

use anyhow::Result;

/// Maximum port retry attempts
pub const MAX_PORT_RETRIES: u16 = 10;

/// Try binding to port, retry with incremented port if in use.
///
/// Port 0 asks the OS for any free port and never retries.
pub fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries.max(1) {
        let Some(port) = base_port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => {
                last_error = Some(e);
                if base_port == 0 {
                    break;
                }
            }
        }
    }

    Err(anyhow::anyhow!(
        "failed to bind {}:{} after {} attempts: {}",
        interface,
        base_port,
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
