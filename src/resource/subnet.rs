//! CIDR block allocation within a parent address space.
//!
//! Allocated blocks are kept in a `BTreeMap` keyed by their network address,
//! so the gaps between them form the free list. Search is first-fit by
//! ascending address, which also makes released space reusable
//! smallest-address-first.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Mask covering the host part of a block with `host_bits` host bits.
fn host_mask(host_bits: u32) -> u128 {
    if host_bits == 0 {
        0
    } else {
        u128::MAX >> (128 - host_bits)
    }
}

/// Round `addr` up to the next multiple of `mask + 1`.
fn align_up(addr: u128, mask: u128) -> Option<u128> {
    addr.checked_add(mask).map(|a| a & !mask)
}

/// Free-space tracker for one subnet pool.
#[derive(Debug, Clone)]
pub struct SubnetSpace {
    address_space: IpNet,
    /// Network address (as integer) -> prefix length of the allocated block
    blocks: BTreeMap<u128, u8>,
}

impl SubnetSpace {
    pub fn new(address_space: IpNet) -> Self {
        Self {
            address_space: address_space.trunc(),
            blocks: BTreeMap::new(),
        }
    }

    pub fn address_space(&self) -> IpNet {
        self.address_space
    }

    fn bits(&self) -> u8 {
        self.address_space.max_prefix_len()
    }

    fn to_int(addr: &IpNet) -> u128 {
        match addr {
            IpNet::V4(net) => u128::from(u32::from(net.network())),
            IpNet::V6(net) => u128::from(net.network()),
        }
    }

    fn to_net(&self, start: u128, prefix: u8) -> Option<IpNet> {
        match self.address_space {
            IpNet::V4(_) => {
                let addr = Ipv4Addr::from(u32::try_from(start).ok()?);
                Ipv4Net::new(addr, prefix).ok().map(IpNet::V4)
            }
            IpNet::V6(_) => Ipv6Net::new(Ipv6Addr::from(start), prefix)
                .ok()
                .map(IpNet::V6),
        }
    }

    fn block_mask(&self, prefix: u8) -> u128 {
        host_mask(u32::from(self.bits().saturating_sub(prefix)))
    }

    fn space_bounds(&self) -> (u128, u128) {
        let start = Self::to_int(&self.address_space);
        (start, start | self.block_mask(self.address_space.prefix_len()))
    }

    /// Check that a prefix length can be carved from this space.
    pub fn check_prefix(&self, prefix: u8) -> Result<(), String> {
        if prefix < self.address_space.prefix_len() {
            return Err(format!(
                "prefix /{} is larger than the pool address space {}",
                prefix, self.address_space
            ));
        }
        if prefix > self.bits() {
            return Err(format!(
                "prefix /{} exceeds the address length /{}",
                prefix,
                self.bits()
            ));
        }
        Ok(())
    }

    /// Find the lowest aligned block of `prefix` length that does not
    /// intersect any allocated block.
    fn find_gap(&self, prefix: u8) -> Option<u128> {
        let mask = self.block_mask(prefix);
        let (space_start, space_end) = self.space_bounds();
        let mut cursor = space_start;

        for (&start, &block_prefix) in &self.blocks {
            let candidate = align_up(cursor, mask)?;
            if candidate < start && candidate.checked_add(mask).is_some_and(|end| end < start) {
                return Some(candidate);
            }
            let block_end = start | self.block_mask(block_prefix);
            cursor = cursor.max(block_end.checked_add(1)?);
        }

        let candidate = align_up(cursor, mask)?;
        let end = candidate.checked_add(mask)?;
        (end <= space_end).then_some(candidate)
    }

    /// Reserve the first free block of the given prefix length.
    ///
    /// Returns `None` when no block fits.
    pub fn allocate(&mut self, prefix: u8) -> Option<IpNet> {
        let start = self.find_gap(prefix)?;
        let net = self.to_net(start, prefix)?;
        self.blocks.insert(start, prefix);
        Some(net)
    }

    /// Reserve a specific block. Returns false if it lies outside the space
    /// or overlaps an existing block.
    pub fn insert(&mut self, net: IpNet) -> bool {
        let net = net.trunc();
        if !self.address_space.contains(&net) || self.overlaps(&net) {
            return false;
        }
        self.blocks.insert(Self::to_int(&net), net.prefix_len());
        true
    }

    /// Return a block to the free space.
    pub fn remove(&mut self, net: &IpNet) -> bool {
        let start = Self::to_int(&net.trunc());
        match self.blocks.get(&start) {
            Some(&prefix) if prefix == net.prefix_len() => {
                self.blocks.remove(&start);
                true
            }
            _ => false,
        }
    }

    /// Whether `net` intersects any allocated block.
    pub fn overlaps(&self, net: &IpNet) -> bool {
        let start = Self::to_int(net);
        let end = start | self.block_mask(net.prefix_len());

        // The only candidates are the last block starting at or before `end`
        // and anything starting inside [start, end].
        self.blocks.range(..=end).next_back().is_some_and(|(&b_start, &b_prefix)| {
            let b_end = b_start | self.block_mask(b_prefix);
            b_end >= start
        })
    }

    /// Total number of addresses in the space.
    pub fn capacity(&self) -> u128 {
        let (start, end) = self.space_bounds();
        (end - start).saturating_add(1)
    }

    /// Number of addresses covered by allocated blocks.
    pub fn used(&self) -> u128 {
        self.blocks
            .values()
            .map(|&prefix| self.block_mask(prefix).saturating_add(1))
            .fold(0u128, u128::saturating_add)
    }
}
