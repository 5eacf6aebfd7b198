//! Forwarding database
//!
//! Concurrent table mapping learned hardware addresses to the interface
//! they were last seen on. All operations serialize through one
//! reader/writer lock: lookups take the shared form, mutations the
//! exclusive form. The lock is never held across an await and never held
//! together with the bridge's link-table lock.
//!
//! Mutations emit a change event — the full table snapshot, one
//! `<MAC>\t<interface-name>` line per entry — through the logging sink.
//! `add` emits only when a value actually changed; `remove`, `clear`, and
//! `flush` emit unconditionally.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::info;

use crate::eth::Mac;
use crate::iface::Interface;

/// One learned entry: the address, and a non-owning reference to the
/// interface it maps to. The database never owns interface lifetime.
struct FdbEntry {
    mac: Mac,
    iface: Weak<dyn Interface>,
    iface_index: u32,
    iface_name: String,
}

/// The forwarding database.
///
/// Keys are the 48-bit integer projection of the address
/// ([`Mac::to_u64`]). The zero and broadcast addresses are never stored.
#[derive(Default)]
pub struct Fdb {
    entries: RwLock<HashMap<u64, FdbEntry>>,
}

impl Fdb {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Learns a batch of addresses as residing behind `iface`.
    ///
    /// The batch is all-or-nothing: if any address is zero or broadcast,
    /// the whole call aborts and the table is left untouched. Otherwise
    /// each address is upserted in order, and a change event is emitted
    /// after the batch if any value actually changed.
    pub fn add(&self, iface: &Arc<dyn Interface>, addrs: &[Mac]) {
        if addrs.iter().any(|mac| mac.is_zero() || mac.is_broadcast()) {
            return;
        }

        let mut entries = self.entries.write();
        let mut changed = false;
        for &mac in addrs {
            let entry = FdbEntry {
                mac,
                iface: Arc::downgrade(iface),
                iface_index: iface.index(),
                iface_name: iface.name().to_string(),
            };
            match entries.insert(mac.to_u64(), entry) {
                Some(old) if old.iface_index == iface.index() => {}
                _ => changed = true,
            }
        }
        if changed {
            let snapshot = render(&entries);
            drop(entries);
            info!("fdb changed (add):\n{snapshot}");
        }
    }

    /// Looks up the interface an address was last seen on. `None` when
    /// the address was never learned or its interface is gone.
    #[must_use]
    pub fn get(&self, mac: Mac) -> Option<Arc<dyn Interface>> {
        let entries = self.entries.read();
        entries.get(&mac.to_u64()).and_then(|e| e.iface.upgrade())
    }

    /// Forgets one address. Emits a change event whether or not the
    /// address was present.
    pub fn remove(&self, mac: Mac) {
        let mut entries = self.entries.write();
        entries.remove(&mac.to_u64());
        let snapshot = render(&entries);
        drop(entries);
        info!("fdb changed (remove):\n{snapshot}");
    }

    /// Forgets every address learned behind `iface`. Invoked when an
    /// interface is unlinked from a bridge. Always emits a change event.
    pub fn clear(&self, iface: &dyn Interface) {
        let index = iface.index();
        let mut entries = self.entries.write();
        entries.retain(|_, e| e.iface_index != index);
        let snapshot = render(&entries);
        drop(entries);
        info!("fdb changed (clear):\n{snapshot}");
    }

    /// Forgets everything. Always emits a change event.
    pub fn flush(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        let snapshot = render(&entries);
        drop(entries);
        info!("fdb changed (flush):\n{snapshot}");
    }

    /// Number of learned entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing has been learned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// The current table as display lines, one `<MAC>\t<name>` per
    /// entry, ordered by address.
    #[must_use]
    pub fn snapshot(&self) -> String {
        render(&self.entries.read())
    }
}

/// Renders the table under the lock, ordered by address so output is
/// stable.
fn render(entries: &HashMap<u64, FdbEntry>) -> String {
    let mut rows: Vec<&FdbEntry> = entries.values().collect();
    rows.sort_by_key(|e| e.mac.to_u64());

    let mut out = String::new();
    for entry in rows {
        let _ = writeln!(out, "{}\t{}", entry.mac, entry.iface_name);
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::iface::pair::{pair, EndpointSpec};

    fn iface(name: &str, index: u32) -> Arc<dyn Interface> {
        let mac = Mac::new([0x02, 0, 0, 0, 0, index as u8]);
        let peer = Mac::new([0x02, 0, 0, 0, 0x99, index as u8]);
        let (end, _other) = pair(
            EndpointSpec::new(name, index, mac),
            EndpointSpec::new(format!("{name}-peer"), index + 100, peer),
        );
        end
    }

    fn mac(last: u8) -> Mac {
        Mac::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, last])
    }

    #[test]
    fn add_then_get() {
        let fdb = Fdb::new();
        let a = iface("a0", 1);

        fdb.add(&a, &[mac(1), mac(2)]);

        assert_eq!(fdb.len(), 2);
        let hit = fdb.get(mac(1)).unwrap();
        assert_eq!(hit.index(), 1);
        assert!(fdb.get(mac(3)).is_none());
    }

    #[test]
    fn relearning_moves_an_address() {
        let fdb = Fdb::new();
        let a = iface("a0", 1);
        let b = iface("b0", 2);

        fdb.add(&a, &[mac(1)]);
        fdb.add(&b, &[mac(1)]);

        assert_eq!(fdb.len(), 1);
        assert_eq!(fdb.get(mac(1)).unwrap().index(), 2);
    }

    #[test]
    fn zero_address_aborts_the_whole_batch() {
        let fdb = Fdb::new();
        let a = iface("a0", 1);

        fdb.add(&a, &[mac(1), Mac::ZERO, mac(2)]);

        // Nothing from the batch was applied, not even the addresses
        // preceding the zero one
        assert!(fdb.is_empty());
        assert!(fdb.get(mac(1)).is_none());
        assert!(fdb.get(mac(2)).is_none());
    }

    #[test]
    fn broadcast_address_aborts_the_whole_batch() {
        let fdb = Fdb::new();
        let a = iface("a0", 1);

        fdb.add(&a, &[Mac::BROADCAST, mac(1)]);

        assert!(fdb.is_empty());
    }

    #[test]
    fn remove_forgets_one_address() {
        let fdb = Fdb::new();
        let a = iface("a0", 1);

        fdb.add(&a, &[mac(1), mac(2)]);
        fdb.remove(mac(1));

        assert!(fdb.get(mac(1)).is_none());
        assert!(fdb.get(mac(2)).is_some());

        // Removing an unknown address is not an error
        fdb.remove(mac(9));
        assert_eq!(fdb.len(), 1);
    }

    #[test]
    fn clear_purges_only_one_interface() {
        let fdb = Fdb::new();
        let a = iface("a0", 1);
        let b = iface("b0", 2);

        fdb.add(&a, &[mac(1), mac(2)]);
        fdb.add(&b, &[mac(3)]);

        fdb.clear(a.as_ref());

        assert!(fdb.get(mac(1)).is_none());
        assert!(fdb.get(mac(2)).is_none());
        assert_eq!(fdb.get(mac(3)).unwrap().index(), 2);
    }

    #[test]
    fn flush_forgets_everything() {
        let fdb = Fdb::new();
        let a = iface("a0", 1);

        fdb.add(&a, &[mac(1), mac(2)]);
        fdb.flush();

        assert!(fdb.is_empty());
        assert_eq!(fdb.snapshot(), "");
    }

    #[test]
    fn lookup_of_a_dropped_interface_misses() {
        let fdb = Fdb::new();
        let a = iface("a0", 1);

        fdb.add(&a, &[mac(1)]);
        drop(a);

        assert!(fdb.get(mac(1)).is_none());
    }

    #[test]
    fn snapshot_lines_are_tab_separated_and_ordered() {
        let fdb = Fdb::new();
        let a = iface("a0", 1);

        fdb.add(&a, &[Mac::new([2, 0, 0, 0, 0, 0x02]), Mac::new([1, 0, 0, 0, 0, 0x01])]);

        assert_eq!(
            fdb.snapshot(),
            "01:00:00:00:00:01\ta0\n02:00:00:00:00:02\ta0\n"
        );
    }
}
