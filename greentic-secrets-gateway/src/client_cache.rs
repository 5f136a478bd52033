use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug)]
struct Slots<C> {
    clients: Vec<C>,
    index: HashMap<String, usize>,
}

/// Regions cached before new regions stop being remembered.
pub const DEFAULT_REGION_LIMIT: usize = 64;

/// Region-keyed cache of store clients.
///
/// Clients live in an append-only arena with a region index beside it. An
/// entry is never replaced or mutated once inserted, so each cached region
/// builds its client at most once for the lifetime of the cache. Once `limit`
/// regions are cached, other regions get a fresh, uncached client per call.
#[derive(Debug)]
pub struct RegionClients<C> {
    slots: RwLock<Slots<C>>,
    limit: usize,
}

impl<C> Default for RegionClients<C> {
    fn default() -> Self {
        Self::with_limit(DEFAULT_REGION_LIMIT)
    }
}

impl<C> RegionClients<C> {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            slots: RwLock::new(Slots {
                clients: Vec::new(),
                index: HashMap::new(),
            }),
            limit,
        }
    }
}

impl<C: Clone> RegionClients<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, region: &str) -> Option<C> {
        let slots = self.slots.read();
        slots
            .index
            .get(region)
            .map(|&slot| slots.clients[slot].clone())
    }

    /// Cached client for `region`, building it with `build` on first use.
    /// A failed build caches nothing.
    pub fn get_or_try_insert_with<E, F>(&self, region: &str, build: F) -> Result<C, E>
    where
        F: FnOnce() -> Result<C, E>,
    {
        if let Some(client) = self.get(region) {
            return Ok(client);
        }
        let mut slots = self.slots.write();
        if let Some(&slot) = slots.index.get(region) {
            return Ok(slots.clients[slot].clone());
        }
        let client = build()?;
        if slots.clients.len() >= self.limit {
            return Ok(client);
        }
        let slot = slots.clients.len();
        slots.clients.push(client.clone());
        slots.index.insert(region.to_string(), slot);
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.slots.read().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = self.slots.read().index.keys().cloned().collect();
        regions.sort();
        regions
    }
}
