//! A single named, scoped resource pool.

use super::error::ResourceError;
use super::id::IdSpace;
use super::subnet::SubnetSpace;
use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a pool: (name, scope).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolId {
    pub name: String,
    pub scope: String,
}

impl PoolId {
    pub fn new(name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
        }
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.scope)
    }
}

/// The space a pool allocates from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoolSpace {
    /// Subnets carved out of one address space
    Subnet { address_space: IpNet },
    /// Numeric identifiers in `start..=end`
    Id { start: u64, end: u64 },
}

impl PoolSpace {
    pub fn kind(&self) -> PoolKind {
        match self {
            PoolSpace::Subnet { .. } => PoolKind::Subnet,
            PoolSpace::Id { .. } => PoolKind::Id,
        }
    }

    /// Address spaces are compared on their network, so `10.0.0.1/24` and
    /// `10.0.0.0/24` declare the same pool.
    fn normalized(&self) -> PoolSpace {
        match self {
            PoolSpace::Subnet { address_space } => PoolSpace::Subnet {
                address_space: address_space.trunc(),
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for PoolSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolSpace::Subnet { address_space } => write!(f, "subnet pool {}", address_space),
            PoolSpace::Id { start, end } => write!(f, "id pool {}..={}", start, end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Subnet,
    Id,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Subnet => write!(f, "subnet"),
            PoolKind::Id => write!(f, "id"),
        }
    }
}

/// Size of a requested block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSpec {
    /// A subnet of this prefix length
    Prefix(u8),
    /// A single numeric identifier
    Single,
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeSpec::Prefix(len) => write!(f, "/{}", len),
            SizeSpec::Single => write!(f, "one id"),
        }
    }
}

/// A value handed out by a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceValue {
    Subnet(IpNet),
    Id(u64),
}

impl ResourceValue {
    pub fn as_subnet(&self) -> Option<IpNet> {
        match self {
            ResourceValue::Subnet(net) => Some(*net),
            ResourceValue::Id(_) => None,
        }
    }

    pub fn as_id(&self) -> Option<u64> {
        match self {
            ResourceValue::Id(id) => Some(*id),
            ResourceValue::Subnet(_) => None,
        }
    }
}

impl fmt::Display for ResourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceValue::Subnet(net) => write!(f, "{}", net),
            ResourceValue::Id(id) => write!(f, "{}", id),
        }
    }
}

/// A (key → value) binding held until released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub key: String,
    pub value: ResourceValue,
    /// Free-form owner tag supplied by the caller (typically the intent type)
    pub tag: String,
    pub allocated_at: DateTime<Utc>,
}

/// Occupancy figures for one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolUsage {
    pub pool: PoolId,
    pub kind: PoolKind,
    pub description: String,
    /// Addresses (subnet pools) or identifiers (id pools)
    pub total: u128,
    pub used: u128,
    pub allocations: usize,
}

impl PoolUsage {
    pub fn available(&self) -> u128 {
        self.total.saturating_sub(self.used)
    }
}

/// Serializable state of one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub pool: PoolId,
    pub space: PoolSpace,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
}

#[derive(Debug, Clone)]
enum Allocator {
    Subnet(SubnetSpace),
    Id(IdSpace),
}

/// Allocation state for one pool.
///
/// Not synchronized on its own; `ResourceAdmin` wraps every pool in a lock.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    id: PoolId,
    space: PoolSpace,
    description: String,
    tag: String,
    allocator: Allocator,
    allocations: BTreeMap<String, Allocation>,
}

impl ResourcePool {
    /// Create an empty pool.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::InvalidRequest` for an id range with `start > end`.
    pub fn new(
        id: PoolId,
        space: PoolSpace,
        description: impl Into<String>,
        tag: impl Into<String>,
    ) -> Result<Self, ResourceError> {
        let space = space.normalized();
        let allocator = match &space {
            PoolSpace::Subnet { address_space } => {
                Allocator::Subnet(SubnetSpace::new(*address_space))
            }
            PoolSpace::Id { start, end } => {
                if start > end {
                    return Err(ResourceError::InvalidRequest {
                        pool: id.to_string(),
                        message: format!("id range start {} is above end {}", start, end),
                    });
                }
                Allocator::Id(IdSpace::new(*start, *end))
            }
        };

        Ok(Self {
            id,
            space,
            description: description.into(),
            tag: tag.into(),
            allocator,
            allocations: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> &PoolId {
        &self.id
    }

    pub fn space(&self) -> &PoolSpace {
        &self.space
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether a redeclaration with `space` describes this same pool.
    pub fn is_compatible(&self, space: &PoolSpace) -> bool {
        self.space == space.normalized()
    }

    /// Return the value bound to `key`, allocating the first free block if
    /// there is none yet. The flag is `true` when this call made the binding.
    ///
    /// # Errors
    ///
    /// - `ResourceError::InvalidRequest` if `size` does not match the pool kind
    /// - `ResourceError::Exhausted` if no free block fits
    pub fn obtain(
        &mut self,
        size: SizeSpec,
        tag: &str,
        key: &str,
    ) -> Result<(ResourceValue, bool), ResourceError> {
        if let Some(existing) = self.allocations.get(key) {
            return Ok((existing.value, false));
        }

        let value = match (&mut self.allocator, size) {
            (Allocator::Subnet(space), SizeSpec::Prefix(prefix)) => {
                space
                    .check_prefix(prefix)
                    .map_err(|message| ResourceError::InvalidRequest {
                        pool: self.id.to_string(),
                        message,
                    })?;
                space.allocate(prefix).map(ResourceValue::Subnet)
            }
            (Allocator::Id(space), SizeSpec::Single) => space.allocate().map(ResourceValue::Id),
            (_, size) => {
                return Err(ResourceError::InvalidRequest {
                    pool: self.id.to_string(),
                    message: format!("cannot request {} from a {}", size, self.space),
                })
            }
        };

        let value = value.ok_or_else(|| ResourceError::Exhausted {
            pool: self.id.to_string(),
            size: size.to_string(),
        })?;

        self.allocations.insert(
            key.to_string(),
            Allocation {
                key: key.to_string(),
                value,
                tag: tag.to_string(),
                allocated_at: Utc::now(),
            },
        );
        Ok((value, true))
    }

    /// Look up the allocation bound to `key`.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::NotFound` if the key holds nothing.
    pub fn get(&self, key: &str) -> Result<&Allocation, ResourceError> {
        self.allocations
            .get(key)
            .ok_or_else(|| ResourceError::NotFound {
                pool: self.id.to_string(),
                key: key.to_string(),
            })
    }

    /// Release the allocation bound to `key`. Unknown keys are a no-op.
    pub fn release(&mut self, key: &str) -> Option<Allocation> {
        let allocation = self.allocations.remove(key)?;
        match (&mut self.allocator, allocation.value) {
            (Allocator::Subnet(space), ResourceValue::Subnet(net)) => {
                space.remove(&net);
            }
            (Allocator::Id(space), ResourceValue::Id(id)) => {
                space.remove(id);
            }
            _ => {}
        }
        Some(allocation)
    }

    /// Re-bind a previously held allocation, e.g. when restoring state.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Conflict` if the key is already bound or the
    /// value collides with a live allocation.
    pub fn restore(&mut self, allocation: Allocation) -> Result<(), ResourceError> {
        let inserted = !self.allocations.contains_key(&allocation.key)
            && match (&mut self.allocator, allocation.value) {
                (Allocator::Subnet(space), ResourceValue::Subnet(net)) => space.insert(net),
                (Allocator::Id(space), ResourceValue::Id(id)) => space.insert(id),
                _ => false,
            };

        if !inserted {
            return Err(ResourceError::Conflict {
                pool: self.id.to_string(),
                existing: self.space.to_string(),
                requested: format!("allocation {} for key '{}'", allocation.value, allocation.key),
            });
        }
        self.allocations.insert(allocation.key.clone(), allocation);
        Ok(())
    }

    /// Live allocations ordered by key.
    pub fn allocations(&self) -> impl Iterator<Item = &Allocation> {
        self.allocations.values()
    }

    pub fn usage(&self) -> PoolUsage {
        let (total, used) = match &self.allocator {
            Allocator::Subnet(space) => (space.capacity(), space.used()),
            Allocator::Id(space) => (space.capacity(), space.used()),
        };
        PoolUsage {
            pool: self.id.clone(),
            kind: self.space.kind(),
            description: self.description.clone(),
            total,
            used,
            allocations: self.allocations.len(),
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            pool: self.id.clone(),
            space: self.space.clone(),
            description: self.description.clone(),
            tag: self.tag.clone(),
            allocations: self.allocations.values().cloned().collect(),
        }
    }

    /// Rebuild a pool from a snapshot.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot's space is invalid or its allocations collide.
    pub fn from_snapshot(snapshot: PoolSnapshot) -> Result<Self, ResourceError> {
        let mut pool = Self::new(
            snapshot.pool,
            snapshot.space,
            snapshot.description,
            snapshot.tag,
        )?;
        for allocation in snapshot.allocations {
            pool.restore(allocation)?;
        }
        Ok(pool)
    }
}
