//! Detecção de conectividade e do endereço de hardware.
//!
//! O watcher descobre se existe rota para fora com um socket UDP
//! "conectado" (nenhum pacote é enviado) e notifica o dispatcher apenas
//! quando o estado muda.

use airnode_core::NodeEvent;
use airnode_core::connectivity::NetworkEvent;
use crossbeam_channel::Sender;
use std::net::{IpAddr, UdpSocket};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Endereço local usado para sair em direção a `route_check_addr`, se houver rota.
pub fn local_address(route_check_addr: &str) -> Option<IpAddr> {
    let sock = UdpSocket::bind("0.0.0.0:0").ok()?;
    sock.connect(route_check_addr).ok()?;
    let ip = sock.local_addr().ok()?.ip();
    (!ip.is_unspecified() && !ip.is_loopback()).then_some(ip)
}

pub fn spawn_link_watcher(
    route_check_addr: String,
    interval: Duration,
    tx: Sender<NodeEvent>,
) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("link-watcher".into())
        .spawn(move || {
            if tx.send(NodeEvent::Network(NetworkEvent::Connecting)).is_err() {
                return;
            }
            let mut online: Option<bool> = None;
            loop {
                let address = local_address(&route_check_addr);
                let up = address.is_some();
                if online != Some(up) {
                    debug!("Link: {address:?}");
                    let event = if up {
                        NetworkEvent::GotAddress
                    } else {
                        NetworkEvent::Disconnected
                    };
                    if tx.send(NodeEvent::Network(event)).is_err() {
                        return;
                    }
                    online = Some(up);
                }
                std::thread::sleep(interval);
            }
        })?;
    Ok(())
}

/// MAC da primeira interface não-loopback, no formato `AA-BB-CC-DD-EE-FF`.
pub fn detect_mac(sys_class_net: &Path) -> Option<String> {
    let mut names: Vec<_> = std::fs::read_dir(sys_class_net)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name != "lo")
        .collect();
    names.sort();

    names.into_iter().find_map(|name| {
        let raw = std::fs::read_to_string(sys_class_net.join(&name).join("address")).ok()?;
        format_mac(raw.trim())
    })
}

/// `aa:bb:cc:dd:ee:ff` → `AA-BB-CC-DD-EE-FF`; rejeita o MAC nulo.
pub fn format_mac(raw: &str) -> Option<String> {
    let octets: Vec<&str> = raw.split(':').collect();
    let valid = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    if !valid || octets.iter().all(|o| *o == "00") {
        return None;
    }
    Some(octets.join("-").to_ascii_uppercase())
}
