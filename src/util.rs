use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

const HUB_ADDR: &str = "LATENCY_HUB_ADDR";

const DEFAULT_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8000));

/// Address the query API binds to unless configured otherwise
pub fn get_default_addr() -> SocketAddr {
    let addr_from_env = std::env::var(HUB_ADDR);
    addr_from_env.map_or(DEFAULT_ADDR, |res| res.parse().unwrap_or(DEFAULT_ADDR))
}

const DEFAULT_INTERVAL: &str = "10s";

pub fn get_default_interval() -> String {
    DEFAULT_INTERVAL.to_string()
}

const DEFAULT_TIMEOUT: &str = "2s";

pub fn get_default_timeout() -> String {
    DEFAULT_TIMEOUT.to_string()
}

const DEFAULT_WORKERS: usize = 8;

pub fn get_default_workers() -> usize {
    DEFAULT_WORKERS
}

/// Convert nanoseconds to whole milliseconds for display
pub fn nanos_to_millis(nanos: i64) -> i64 {
    nanos / 1_000_000
}
