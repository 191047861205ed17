//! Listen port allocation for the consumer side of hubs

use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::{IpAddr, TcpListener};
use std::sync::Arc;
use tracing::debug;

use crate::models::{TranslatorError, TranslatorResult};

#[derive(Debug)]
struct PoolState {
    leased: HashSet<u16>,
    /// Offset of the next port to try, so released ports are not reused first
    cursor: u32,
}

#[derive(Debug)]
struct PortPool {
    bind_host: IpAddr,
    start: u16,
    end: u16,
    state: Mutex<PoolState>,
}

impl PortPool {
    fn release(&self, port: u16) {
        self.state.lock().leased.remove(&port);
        debug!(port, "Listen port released");
    }
}

/// Hands out listen ports from an inclusive range.
///
/// A lease carries the socket already bound to its port, so two hubs can
/// never be given the same port and nothing else can grab it in between.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    pool: Arc<PortPool>,
}

impl PortAllocator {
    pub fn new(bind_host: IpAddr, start: u16, end: u16) -> TranslatorResult<Self> {
        if start == 0 || start > end {
            return Err(TranslatorError::Config(format!(
                "invalid listen port range {}-{}",
                start, end
            )));
        }

        Ok(Self {
            pool: Arc::new(PortPool {
                bind_host,
                start,
                end,
                state: Mutex::new(PoolState {
                    leased: HashSet::new(),
                    cursor: 0,
                }),
            }),
        })
    }

    /// Lease the next free port of the range
    pub fn allocate(&self) -> TranslatorResult<PortLease> {
        let pool = &self.pool;
        let span = u32::from(pool.end - pool.start) + 1;
        let mut state = pool.state.lock();

        for step in 0..span {
            let offset = (state.cursor + step) % span;
            let port = pool.start + offset as u16;
            if state.leased.contains(&port) {
                continue;
            }

            match TcpListener::bind((pool.bind_host, port)) {
                Ok(listener) => {
                    state.leased.insert(port);
                    state.cursor = (offset + 1) % span;
                    debug!(port, "Listen port leased");
                    return Ok(PortLease {
                        port,
                        listener: Some(listener),
                        pool: Arc::clone(pool),
                    });
                }
                Err(e) => debug!(port, error = %e, "Listen port unavailable"),
            }
        }

        Err(TranslatorError::PortExhaustion {
            start: pool.start,
            end: pool.end,
        })
    }

    pub fn leased_count(&self) -> usize {
        self.pool.state.lock().leased.len()
    }

    pub fn range(&self) -> (u16, u16) {
        (self.pool.start, self.pool.end)
    }
}

/// An allocated port; released back to the allocator on drop
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    listener: Option<TcpListener>,
    pool: Arc<PortPool>,
}

impl PortLease {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Take the bound listener; the port stays leased until the lease drops
    pub fn take_listener(&mut self) -> Option<TcpListener> {
        self.listener.take()
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.pool.release(self.port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    /// A port the OS just considered free
    fn free_port() -> u16 {
        TcpListener::bind((LOCALHOST, 0)).unwrap().local_addr().unwrap().port()
    }

    #[test]
    fn test_invalid_range() {
        assert!(PortAllocator::new(LOCALHOST, 5000, 4000).is_err());
        assert!(PortAllocator::new(LOCALHOST, 0, 10).is_err());
    }

    #[test]
    fn test_leases_are_distinct() {
        let start = free_port().min(65_000);
        let allocator = PortAllocator::new(LOCALHOST, start, start + 16).unwrap();

        let a = allocator.allocate().unwrap();
        let b = allocator.allocate().unwrap();
        assert_ne!(a.port(), b.port());
        assert_eq!(allocator.leased_count(), 2);
    }

    #[test]
    fn test_exhaustion_and_release() {
        let port = free_port();
        let allocator = PortAllocator::new(LOCALHOST, port, port).unwrap();

        let lease = allocator.allocate().unwrap();
        assert_eq!(lease.port(), port);
        assert!(matches!(
            allocator.allocate(),
            Err(TranslatorError::PortExhaustion { .. })
        ));

        drop(lease);
        assert_eq!(allocator.leased_count(), 0);
        assert_eq!(allocator.allocate().unwrap().port(), port);
    }

    #[test]
    fn test_skips_ports_bound_elsewhere() {
        let busy = TcpListener::bind((LOCALHOST, 0)).unwrap();
        let port = busy.local_addr().unwrap().port();
        let allocator = PortAllocator::new(LOCALHOST, port, port).unwrap();

        assert!(matches!(
            allocator.allocate(),
            Err(TranslatorError::PortExhaustion { .. })
        ));
        drop(busy);
    }

    #[test]
    fn test_take_listener_keeps_lease() {
        let port = free_port();
        let allocator = PortAllocator::new(LOCALHOST, port, port).unwrap();

        let mut lease = allocator.allocate().unwrap();
        let listener = lease.take_listener().unwrap();
        assert_eq!(listener.local_addr().unwrap().port(), port);
        assert!(lease.take_listener().is_none());
        assert_eq!(allocator.leased_count(), 1);
    }
}
