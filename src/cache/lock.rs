use std::sync::{LockResult, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn recover<G>(result: LockResult<G>, region: &str, lock_kind: &'static str, op: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            op,
            region,
            lock_kind,
            result = "poisoned_recovered",
            hint = "region contents may be stale after panic in another thread",
            "Recovered from poisoned cache region lock"
        );
        poisoned.into_inner()
    })
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    region: &str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), region, "rwlock.read", op)
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    region: &str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), region, "rwlock.write", op)
}
