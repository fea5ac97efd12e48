use chainlb_core::scheduler::spawn_periodic;
use chainlb_core::SynchronisationSettings;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

const SLOW_ACQUIRE_THRESHOLD: Duration = Duration::from_millis(100);

/// 锁的持有者
#[derive(Debug, Clone, Copy)]
struct Holder {
    stamp: u64,
    /// 通过 `before` 获取，需由 `after` 释放
    manual: bool,
}

/// 单个键的互斥锁
struct ClientLock {
    semaphore: Semaphore,
    created_at: Instant,
    holder: Mutex<Option<Holder>>,
}

impl ClientLock {
    fn new() -> Self {
        Self {
            semaphore: Semaphore::new(1),
            created_at: Instant::now(),
            holder: Mutex::new(None),
        }
    }

    fn is_locked(&self) -> bool {
        self.semaphore.available_permits() == 0
    }

    /// 仅当 `stamp` 仍是当前持有者时释放
    fn release(&self, stamp: u64) -> bool {
        let mut holder = self.holder.lock();
        match *holder {
            Some(current) if current.stamp == stamp => {
                *holder = None;
                self.semaphore.add_permits(1);
                true
            }
            _ => false,
        }
    }

    /// 释放由 `before` 获取的锁
    fn release_manual(&self) -> Result<(), &'static str> {
        let mut holder = self.holder.lock();
        match *holder {
            Some(current) if current.manual => {
                *holder = None;
                self.semaphore.add_permits(1);
                Ok(())
            }
            Some(_) => Err("lock is held by a guard"),
            None => Err("lock is not held"),
        }
    }

    /// 无条件释放，返回原持有者
    fn force_release(&self) -> Option<Holder> {
        let taken = self.holder.lock().take();
        if taken.is_some() {
            self.semaphore.add_permits(1);
        }
        taken
    }
}

/// 按键互斥的锁注册表
///
/// `before(key)` 获取键对应的排他锁，`after(key)` 释放。
/// 锁从创建起超过 `lifetime` 后会被清理任务强制释放并移除，用于从遗漏 `after` 的死锁中恢复。
///
/// 每次获取都带有递增的标记，守卫只释放自己获取的那把锁。被强制释放的手动锁记入
/// `orphans`，原持有者迟到的 `after` 会被吸收，不会释放同一键下新创建的锁。
pub struct LockRegistry<K> {
    lifetime: Duration,
    locks: RwLock<HashMap<K, Arc<ClientLock>>>,
    /// 键 -> 被强制释放的时间
    orphans: Mutex<HashMap<K, Vec<Instant>>>,
    next_stamp: AtomicU64,
}

impl<K> LockRegistry<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
{
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            locks: RwLock::new(HashMap::new()),
            orphans: Mutex::new(HashMap::new()),
            next_stamp: AtomicU64::new(1),
        }
    }

    /// 从配置创建，`disabled` 时返回 `None`
    pub fn from_settings(settings: &SynchronisationSettings) -> Option<Self> {
        if settings.disabled {
            debug!("Synchronisation is disabled");
            return None;
        }
        Some(Self::new(settings.lock_lifetime()))
    }

    fn get_lock(&self, key: &K) -> Arc<ClientLock> {
        if let Some(lock) = self.locks.read().get(key) {
            return lock.clone();
        }

        self.locks
            .write()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(ClientLock::new()))
            .clone()
    }

    /// 等待并占用锁，返回锁、本次标记以及获取前是否已被占用
    async fn acquire(&self, key: &K, manual: bool) -> (Arc<ClientLock>, Option<u64>, bool) {
        info!("Lock for {:?} set", key);
        let started = Instant::now();

        let lock = self.get_lock(key);
        let locked = lock.is_locked();

        let acquired = lock.semaphore.acquire().await.map(|permit| permit.forget());
        if let Err(e) = acquired {
            error!("Error acquiring lock {:?}: {}", key, e);
            return (lock, None, locked);
        }
        let stamp = self.next_stamp.fetch_add(1, Ordering::Relaxed);
        *lock.holder.lock() = Some(Holder { stamp, manual });

        let took = started.elapsed();
        trace!(
            "Lock {:?} is locked : {}. Lock took {} ms",
            key,
            locked,
            took.as_millis()
        );
        if took > SLOW_ACQUIRE_THRESHOLD {
            error!("Lock took more then 100ms {} {:?}", took.as_millis(), key);
        }
        (lock, Some(stamp), locked)
    }

    /// 获取锁，返回获取前该锁是否已被占用
    pub async fn before(&self, key: K) -> bool {
        let (_, _, locked) = self.acquire(&key, true).await;
        locked
    }

    /// 释放由 `before` 获取的锁
    pub fn after(&self, key: &K) {
        if self.take_orphan(key) {
            warn!("Lock {:?} was force released before after, ignoring", key);
            return;
        }

        let lock = self.locks.read().get(key).cloned();
        match lock {
            Some(lock) => match lock.release_manual() {
                Ok(()) => trace!("Lock for {:?} released", key),
                Err(reason) => warn!("Error unlocking lock {:?}: {}", key, reason),
            },
            None => error!("No lock for {:?}", key),
        }
    }

    fn take_orphan(&self, key: &K) -> bool {
        let mut orphans = self.orphans.lock();
        let Some(released) = orphans.get_mut(key) else {
            return false;
        };
        released.pop();
        if released.is_empty() {
            orphans.remove(key);
        }
        true
    }

    /// 获取锁并返回守卫，守卫销毁时自动释放
    pub async fn lock(&self, key: K) -> LockGuard<K> {
        let (lock, stamp, _) = self.acquire(&key, false).await;
        LockGuard { key, lock, stamp }
    }

    /// 在持有锁期间执行 `task`
    pub async fn synchronize<F, T>(&self, key: K, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.lock(key).await;
        task.await
    }

    /// 强制释放并移除超过生命周期的锁，返回移除数量
    pub fn clear(&self) -> usize {
        let now = Instant::now();
        let mut locks = self.locks.write();

        let old: Vec<K> = locks
            .iter()
            .filter(|(_, lock)| now.saturating_duration_since(lock.created_at) > self.lifetime)
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = Vec::with_capacity(old.len());
        for key in old {
            if let Some(lock) = locks.remove(&key) {
                if lock.is_locked() {
                    error!(
                        "Lock has been blocked before clear: {:?}. Took {}ms",
                        key,
                        now.saturating_duration_since(lock.created_at).as_millis()
                    );
                    if let Some(Holder { manual: true, .. }) = lock.force_release() {
                        self.orphans.lock().entry(key.clone()).or_default().push(now);
                    }
                }
                removed.push(format!("{:?}", key));
            }
        }
        drop(locks);

        // 超过一个生命周期仍未到来的 after 不再等待
        self.orphans.lock().retain(|_, released| {
            released.retain(|at| now.saturating_duration_since(*at) <= self.lifetime);
            !released.is_empty()
        });

        if !removed.is_empty() {
            trace!("Lock for {} removed", removed.join(";"));
        }
        removed.len()
    }

    /// 启动定时清理
    pub fn start_reaper(self: &Arc<Self>, clear_delay: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        spawn_periodic("ClearLocks", clear_delay, clear_delay, move || {
            let registry = registry.clone();
            async move {
                registry.clear();
                Ok(())
            }
        })
    }

    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.read().is_empty()
    }
}

/// 持有锁期间存在的守卫
///
/// 只释放自己获取的锁；锁已被清理任务强制释放时销毁不产生任何效果。
pub struct LockGuard<K: Debug> {
    key: K,
    lock: Arc<ClientLock>,
    stamp: Option<u64>,
}

impl<K: Debug> Drop for LockGuard<K> {
    fn drop(&mut self) {
        let Some(stamp) = self.stamp else {
            return;
        };
        if self.lock.release(stamp) {
            trace!("Lock for {:?} released", self.key);
        } else {
            warn!("Lock {:?} was force released before guard drop", self.key);
        }
    }
}
