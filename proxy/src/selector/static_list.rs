use super::ServerSelector;
use crate::backend::BackendAddr;
use crate::error::Error;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// A fixed list of backends, indexed by `crc32(key) % len`.
///
/// Adding or removing a backend remaps most keys, and dead backends are
/// never skipped.
#[derive(Debug, Default)]
pub struct ServerList {
    addrs: RwLock<Vec<BackendAddr>>,
}

impl ServerList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from address strings.
    pub fn with_servers<S: AsRef<str>>(servers: &[S]) -> Result<Self, Error> {
        let list = Self::new();
        list.set_servers(servers)?;
        Ok(list)
    }

    /// Replace the list.
    ///
    /// Every address is resolved first; if any fails the list is unchanged.
    pub fn set_servers<S: AsRef<str>>(&self, servers: &[S]) -> Result<(), Error> {
        let addrs = servers
            .iter()
            .map(|s| BackendAddr::parse(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        *self.addrs.write() = addrs;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.addrs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.read().is_empty()
    }
}

impl ServerSelector for ServerList {
    fn pick_server(&self, key: &[u8]) -> Result<BackendAddr, Error> {
        let addrs = self.addrs.read();
        if addrs.is_empty() {
            return Err(Error::NoServers);
        }

        let checksum = crc32fast::hash(key);
        Ok(addrs[checksum as usize % addrs.len()].clone())
    }

    fn monitor(&self, _shutdown: Arc<AtomicBool>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_has_no_servers() {
        let list = ServerList::new();
        assert!(matches!(list.pick_server(b"key"), Err(Error::NoServers)));
    }

    #[test]
    fn single_server_gets_every_key() {
        let list = ServerList::with_servers(&["127.0.0.1:11211"]).unwrap();
        let expected = BackendAddr::parse("127.0.0.1:11211").unwrap();
        for i in 0..100 {
            let key = format!("key-{i}");
            assert_eq!(list.pick_server(key.as_bytes()).unwrap(), expected);
        }
    }

    #[test]
    fn index_is_crc32_modulo() {
        let servers = ["127.0.0.1:11211", "127.0.0.1:11212", "127.0.0.1:11213"];
        let list = ServerList::with_servers(&servers).unwrap();

        // crc32("foo") = 0x8c736521
        let idx = 0x8c73_6521_u32 as usize % 3;
        assert_eq!(
            list.pick_server(b"foo").unwrap(),
            BackendAddr::parse(servers[idx]).unwrap()
        );
    }

    #[test]
    fn keys_spread_across_servers() {
        let servers = ["127.0.0.1:1", "127.0.0.1:2", "127.0.0.1:3", "127.0.0.1:4"];
        let list = ServerList::with_servers(&servers).unwrap();

        let mut counts = std::collections::HashMap::new();
        for i in 0..1000 {
            let addr = list.pick_server(format!("key-{i}").as_bytes()).unwrap();
            *counts.entry(addr).or_insert(0) += 1;
        }
        assert_eq!(counts.len(), 4);
        for count in counts.values() {
            assert!(*count > 100, "poor distribution: {counts:?}");
        }
    }

    #[test]
    fn bad_address_leaves_list_unchanged() {
        let list = ServerList::with_servers(&["127.0.0.1:11211"]).unwrap();
        assert!(list.set_servers(&["127.0.0.1:11212", "nonsense"]).is_err());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn unix_paths_are_accepted() {
        let list = ServerList::with_servers(&["/tmp/memcached.sock"]).unwrap();
        assert!(matches!(
            list.pick_server(b"key").unwrap(),
            BackendAddr::Unix(_)
        ));
    }
}
