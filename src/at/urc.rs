//! URC Parsing
//!
//! Unsolicited Response Codes are lines the modem emits on its own, always
//! starting with `+`. Recognized forms:
//!
//! ```text
//! +NNMI:<SRC_HEX>,<DST_HEX>,<RSSI_DEC>,<LEN_DEC>,<PAYLOAD_HEX>
//! +SEND:<SN_DEC>,<RESULT_TOKEN>
//! +ROUTE:CREATE ADDR[0xHHHH]   or   +ROUTE:DELETE ADDR[0xHHHH]
//! +ACK:<SRC_HEX>,<RSSI_DEC>,<SN_DEC>
//! +BOOT
//! +READY
//! ```
//!
//! Anything else with a `+` prefix is ignored by the driver.

use crate::util::hex_to_bytes;

/// A parsed unsolicited response code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Urc {
    /// Inbound mesh datagram.
    Nnmi {
        /// Sender mesh address.
        src: u16,
        /// Destination mesh address.
        dest: u16,
        /// Reception signal strength in dBm.
        rssi: i8,
        /// Decoded datagram payload.
        payload: Vec<u8>,
    },
    /// Progress or outcome of a previously queued send.
    Send {
        /// Serial number assigned by the modem.
        sn: u32,
        /// Result token, for example `SUCCESS` or `FAIL`.
        result: Option<String>,
    },
    /// A mesh route was created or deleted.
    Route {
        /// True for CREATE, false for DELETE.
        created: bool,
        /// Affected node address.
        addr: u16,
    },
    /// Delivery confirmation for acknowledged-mode sends.
    Ack {
        /// Confirming node address.
        src: u16,
        /// Signal strength in dBm.
        rssi: i8,
        /// Serial number of the confirmed send.
        sn: u32,
    },
    /// The modem rebooted.
    Boot,
    /// The modem's AT interpreter is ready.
    Ready,
}

/// Parse one `+`-prefixed line into a [`Urc`].
///
/// Returns `None` for unrecognized or malformed lines; the receive loop
/// drops those silently.
pub fn parse_urc(line: &str) -> Option<Urc> {
    if let Some(rest) = line.strip_prefix("+NNMI:") {
        return parse_nnmi(rest);
    }
    if let Some(rest) = line.strip_prefix("+SEND:") {
        return parse_send(rest);
    }
    if let Some(rest) = line.strip_prefix("+ROUTE:") {
        return parse_route(rest);
    }
    if let Some(rest) = line.strip_prefix("+ACK:") {
        return parse_ack(rest);
    }
    if line == "+BOOT" {
        return Some(Urc::Boot);
    }
    if line == "+READY" {
        return Some(Urc::Ready);
    }
    None
}

fn parse_nnmi(rest: &str) -> Option<Urc> {
    let mut parts = rest.splitn(5, ',');
    let src = u16::from_str_radix(parts.next()?, 16).ok()?;
    let dest = u16::from_str_radix(parts.next()?, 16).ok()?;
    let rssi = parse_rssi(parts.next()?)?;
    let len: usize = parts.next()?.parse().ok()?;
    let payload = hex_to_bytes(parts.next()?).ok()?;

    if payload.len() < len {
        return None;
    }

    Some(Urc::Nnmi {
        src,
        dest,
        rssi,
        payload: payload[..len].to_vec(),
    })
}

fn parse_send(rest: &str) -> Option<Urc> {
    let mut parts = rest.splitn(2, ',');
    let sn: u32 = parts.next()?.parse().ok()?;
    let result = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);

    Some(Urc::Send { sn, result })
}

fn parse_route(rest: &str) -> Option<Urc> {
    let created = if rest.starts_with("CREATE") {
        true
    } else if rest.starts_with("DELETE") {
        false
    } else {
        return None;
    };

    let addr_start = rest.find("ADDR[0x")? + "ADDR[0x".len();
    let addr_end = rest[addr_start..].find(']')? + addr_start;
    let addr = u16::from_str_radix(&rest[addr_start..addr_end], 16).ok()?;

    Some(Urc::Route { created, addr })
}

fn parse_ack(rest: &str) -> Option<Urc> {
    let mut parts = rest.splitn(3, ',');
    let src = u16::from_str_radix(parts.next()?, 16).ok()?;
    let rssi = parse_rssi(parts.next()?)?;
    let sn: u32 = parts.next()?.parse().ok()?;

    Some(Urc::Ack { src, rssi, sn })
}

fn parse_rssi(text: &str) -> Option<i8> {
    let value: i32 = text.parse().ok()?;
    Some(value.clamp(i8::MIN as i32, i8::MAX as i32) as i8)
}
