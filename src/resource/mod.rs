//! Shared resource pools.
//!
//! Pools of subnets or numeric identifiers, addressed by (name, scope) and
//! shared by every intent the engine reconciles. All state lives in one
//! [`ResourceAdmin`] that the platform creates at start-up and injects
//! wherever allocation is needed.

mod error;
mod id;
mod pool;
mod subnet;

pub use error::*;
pub use id::IdSpace;
pub use pool::*;
pub use subnet::SubnetSpace;

use crate::config::PoolConfig;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// One resource to reserve as part of [`ResourceAdmin::obtain_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObtainRequest {
    pub pool: String,
    pub scope: String,
    pub size: SizeSpec,
    pub tag: String,
    pub key: String,
}

impl ObtainRequest {
    pub fn new(
        pool: impl Into<String>,
        scope: impl Into<String>,
        size: SizeSpec,
        tag: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            pool: pool.into(),
            scope: scope.into(),
            size,
            tag: tag.into(),
            key: key.into(),
        }
    }
}

/// Serializable state of every pool, for persistence across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSnapshot {
    pub pools: Vec<PoolSnapshot>,
}

type SharedPool = Arc<RwLock<ResourcePool>>;

/// Routes obtain/get/release calls to the pool addressed by (name, scope).
///
/// Each pool sits behind its own `RwLock`: mutations on one pool are
/// serialized, reads share the lock, and separate pools never contend.
///
/// # Examples
///
/// ```
/// use netweave::resource::{PoolSpace, ResourceAdmin, SizeSpec};
///
/// let admin = ResourceAdmin::new();
/// admin
///     .create_pool(
///         "ip-pool",
///         "global",
///         PoolSpace::Subnet { address_space: "10.0.0.0/18".parse().unwrap() },
///         "link addressing",
///         "infra",
///     )
///     .unwrap();
///
/// let first = admin.obtain("ip-pool", "global", SizeSpec::Prefix(31), "svc", "link-42").unwrap();
/// let again = admin.obtain("ip-pool", "global", SizeSpec::Prefix(31), "svc", "link-42").unwrap();
/// assert_eq!(first, again);
/// assert_eq!(first.to_string(), "10.0.0.0/31");
/// ```
#[derive(Default)]
pub struct ResourceAdmin {
    pools: DashMap<PoolId, SharedPool>,
}

impl ResourceAdmin {
    /// Create an admin with no pools.
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    /// Declare a pool. Declaring the same pool again is a no-op.
    ///
    /// # Errors
    ///
    /// - `ResourceError::Conflict` if (name, scope) exists with a different space
    /// - `ResourceError::InvalidRequest` if the space itself is malformed
    pub fn create_pool(
        &self,
        name: &str,
        scope: &str,
        space: PoolSpace,
        description: &str,
        tag: &str,
    ) -> Result<(), ResourceError> {
        let id = PoolId::new(name, scope);

        match self.pools.entry(id.clone()) {
            Entry::Occupied(entry) => {
                let pool = entry.get().read().unwrap_or_else(PoisonError::into_inner);
                if pool.is_compatible(&space) {
                    tracing::debug!(pool = %id, "Pool already declared");
                    Ok(())
                } else {
                    Err(ResourceError::Conflict {
                        pool: id.to_string(),
                        existing: pool.space().to_string(),
                        requested: space.to_string(),
                    })
                }
            }
            Entry::Vacant(entry) => {
                let pool = ResourcePool::new(id.clone(), space, description, tag)?;
                tracing::info!(pool = %id, space = %pool.space(), "Declared resource pool");
                entry.insert(Arc::new(RwLock::new(pool)));
                Ok(())
            }
        }
    }

    /// Declare every pool listed in configuration.
    ///
    /// # Errors
    ///
    /// Stops at the first declaration that fails.
    pub fn declare_pools(&self, pools: &[PoolConfig]) -> Result<(), ResourceError> {
        for pool in pools {
            self.create_pool(
                &pool.name,
                &pool.scope,
                pool.space.clone(),
                &pool.description,
                &pool.tag,
            )?;
        }
        Ok(())
    }

    fn pool(&self, name: &str, scope: &str) -> Result<SharedPool, ResourceError> {
        let id = PoolId::new(name, scope);
        self.pools
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ResourceError::PoolNotFound(id.to_string()))
    }

    /// Return the value bound to `key`, allocating it on first use.
    ///
    /// # Errors
    ///
    /// - `ResourceError::PoolNotFound` if the pool was never declared
    /// - `ResourceError::Exhausted` if no free block fits
    /// - `ResourceError::InvalidRequest` if `size` does not match the pool kind
    pub fn obtain(
        &self,
        name: &str,
        scope: &str,
        size: SizeSpec,
        tag: &str,
        key: &str,
    ) -> Result<ResourceValue, ResourceError> {
        self.obtain_tracked(name, scope, size, tag, key)
            .map(|(value, _)| value)
    }

    /// `obtain`, also reporting whether the binding was made by this call.
    /// Both are decided under the pool's write lock.
    fn obtain_tracked(
        &self,
        name: &str,
        scope: &str,
        size: SizeSpec,
        tag: &str,
        key: &str,
    ) -> Result<(ResourceValue, bool), ResourceError> {
        let pool = self.pool(name, scope)?;
        let mut pool = pool.write().unwrap_or_else(PoisonError::into_inner);

        match pool.obtain(size, tag, key) {
            Ok((value, fresh)) => {
                if fresh {
                    metrics::counter!("netweave_allocations_total", "pool" => name.to_string())
                        .increment(1);
                    tracing::debug!(pool = %pool.id(), key, %value, "Allocated resource");
                }
                Ok((value, fresh))
            }
            Err(e) => {
                if matches!(e, ResourceError::Exhausted { .. }) {
                    metrics::counter!("netweave_pool_exhausted_total", "pool" => name.to_string())
                        .increment(1);
                    tracing::warn!(pool = %pool.id(), key, %size, "Resource pool exhausted");
                }
                Err(e)
            }
        }
    }

    /// Obtain several resources as one unit.
    ///
    /// Either every request succeeds, or the allocations made by this call
    /// are released again and the first error is returned. Keys that were
    /// already bound before the call are left untouched.
    ///
    /// # Errors
    ///
    /// Returns the error of the first request that failed.
    pub fn obtain_batch(
        &self,
        requests: &[ObtainRequest],
    ) -> Result<Vec<ResourceValue>, ResourceError> {
        let mut values = Vec::with_capacity(requests.len());
        let mut made: Vec<&ObtainRequest> = Vec::new();

        for request in requests {
            match self.obtain_tracked(
                &request.pool,
                &request.scope,
                request.size,
                &request.tag,
                &request.key,
            ) {
                Ok((value, fresh)) => {
                    if fresh {
                        made.push(request);
                    }
                    values.push(value);
                }
                Err(e) => {
                    for done in made.iter().rev() {
                        if let Err(release_err) = self.release(&done.pool, &done.scope, &done.key)
                        {
                            tracing::error!(
                                pool = %done.pool,
                                key = %done.key,
                                error = %release_err,
                                "Failed to roll back allocation"
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }

        Ok(values)
    }

    /// Read-only lookup.
    ///
    /// # Errors
    ///
    /// - `ResourceError::PoolNotFound` if the pool was never declared
    /// - `ResourceError::NotFound` if the key holds nothing
    pub fn get(&self, name: &str, scope: &str, key: &str) -> Result<ResourceValue, ResourceError> {
        let pool = self.pool(name, scope)?;
        let pool = pool.read().unwrap_or_else(PoisonError::into_inner);
        pool.get(key).map(|allocation| allocation.value)
    }

    /// Full allocation record for `key`, including tag and timestamp.
    pub fn get_allocation(
        &self,
        name: &str,
        scope: &str,
        key: &str,
    ) -> Result<Allocation, ResourceError> {
        let pool = self.pool(name, scope)?;
        let pool = pool.read().unwrap_or_else(PoisonError::into_inner);
        pool.get(key).cloned()
    }

    /// Release the allocation bound to `key`.
    ///
    /// Returns the released value, or `None` if the key held nothing.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::PoolNotFound` if the pool was never declared.
    pub fn release(
        &self,
        name: &str,
        scope: &str,
        key: &str,
    ) -> Result<Option<ResourceValue>, ResourceError> {
        let pool = self.pool(name, scope)?;
        let mut pool = pool.write().unwrap_or_else(PoisonError::into_inner);
        let released = pool.release(key).map(|allocation| allocation.value);
        if let Some(value) = &released {
            tracing::debug!(pool = %pool.id(), key, %value, "Released resource");
        }
        Ok(released)
    }

    /// Live allocations of one pool, ordered by key.
    pub fn allocations(&self, name: &str, scope: &str) -> Result<Vec<Allocation>, ResourceError> {
        let pool = self.pool(name, scope)?;
        let pool = pool.read().unwrap_or_else(PoisonError::into_inner);
        Ok(pool.allocations().cloned().collect())
    }

    pub fn usage(&self, name: &str, scope: &str) -> Result<PoolUsage, ResourceError> {
        let pool = self.pool(name, scope)?;
        let pool = pool.read().unwrap_or_else(PoisonError::into_inner);
        Ok(pool.usage())
    }

    /// Usage of every pool, ordered by (name, scope).
    pub fn list_pools(&self) -> Vec<PoolUsage> {
        // Clone the handles first so no map shard is held while pools are read
        let pools: Vec<SharedPool> =
            self.pools.iter().map(|entry| Arc::clone(entry.value())).collect();
        let mut usage: Vec<PoolUsage> = pools
            .iter()
            .map(|pool| pool.read().unwrap_or_else(PoisonError::into_inner).usage())
            .collect();
        usage.sort_by(|a, b| a.pool.cmp(&b.pool));
        usage
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Capture the state of every pool.
    pub fn snapshot(&self) -> AdminSnapshot {
        let handles: Vec<SharedPool> =
            self.pools.iter().map(|entry| Arc::clone(entry.value())).collect();
        let mut pools: Vec<PoolSnapshot> = handles
            .iter()
            .map(|pool| pool.read().unwrap_or_else(PoisonError::into_inner).snapshot())
            .collect();
        pools.sort_by(|a, b| a.pool.cmp(&b.pool));
        AdminSnapshot { pools }
    }

    /// Rebuild an admin from a snapshot.
    ///
    /// # Errors
    ///
    /// Fails on duplicate pools or colliding allocations.
    pub fn restore(snapshot: AdminSnapshot) -> Result<Self, ResourceError> {
        let admin = Self::new();
        for pool in snapshot.pools {
            let id = pool.pool.clone();
            let pool = ResourcePool::from_snapshot(pool)?;
            match admin.pools.entry(id.clone()) {
                Entry::Occupied(_) => {
                    return Err(ResourceError::Conflict {
                        pool: id.to_string(),
                        existing: "declared".to_string(),
                        requested: "duplicate snapshot entry".to_string(),
                    })
                }
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(RwLock::new(pool)));
                }
            }
        }
        tracing::info!(pools = admin.pool_count(), "Restored resource pools");
        Ok(admin)
    }
}
