//! Serial port listing.

use anyhow::Result;
use console::style;
use lpddrtest::list_ports;
use serde_json::json;

/// List available serial ports as a table or JSON.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let ports = list_ports()?;

    if json {
        let entries: Vec<serde_json::Value> = ports
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "vid": p.vid,
                    "pid": p.pid,
                    "manufacturer": p.manufacturer,
                    "product": p.product,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if ports.is_empty() {
        eprintln!("{} no serial ports found", style("\u{2139}").blue());
        return Ok(());
    }

    for port in &ports {
        let usb = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" ({vid:04X}:{pid:04X})")
        } else {
            String::new()
        };
        let product = port
            .product
            .as_ref()
            .map(|p| format!(" - {p}"))
            .unwrap_or_default();
        println!("{}{usb}{product}", style(&port.name).bold());
    }

    Ok(())
}
