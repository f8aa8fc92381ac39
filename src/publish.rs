//! Latest-value handoff between two threads.
//!
//! The producer overwrites, the consumer reads the newest complete value.
//! Nothing is ever queued: a value that nobody read before the next
//! publish is dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

struct Slot<T> {
    value: Mutex<Option<Arc<T>>>,
    generation: AtomicU64,
    closed: AtomicBool,
    changed: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // 保持している値は常に完全な Arc なので、poison されても使える
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 書き込み側。スロットへは弱参照しか持たない
pub struct Publisher<T> {
    slot: Weak<Slot<T>>,
}

/// 読み取り側。全ての Subscriber が drop されると publish は no-op になる
pub struct Subscriber<T> {
    slot: Arc<Slot<T>>,
}

/// 空のスロットを作り、書き込み側と読み取り側を返す
pub fn latest<T>() -> (Publisher<T>, Subscriber<T>) {
    let slot = Arc::new(Slot {
        value: Mutex::new(None),
        generation: AtomicU64::new(0),
        closed: AtomicBool::new(false),
        changed: Condvar::new(),
    });
    let publisher = Publisher {
        slot: Arc::downgrade(&slot),
    };
    (publisher, Subscriber { slot })
}

impl<T> Publisher<T> {
    /// 値を差し替える。読み取り側が無ければ false を返して値を捨てる
    ///
    /// ロック区間は Arc の入れ替えだけなので、読み取り側の頻度に関係なく
    /// 一定時間で戻る。
    pub fn publish(&self, value: T) -> bool {
        let Some(slot) = self.slot.upgrade() else {
            return false;
        };
        if slot.closed.load(Ordering::Acquire) {
            return false;
        }

        let value = Arc::new(value);
        let previous = {
            let mut guard = lock(&slot.value);
            let previous = guard.replace(value);
            slot.generation.fetch_add(1, Ordering::AcqRel);
            previous
        };
        slot.changed.notify_all();
        // 古い値の解放はロック外で
        drop(previous);
        true
    }

    /// 読み取り側が閉じられた、または全て drop されたか
    pub fn is_closed(&self) -> bool {
        match self.slot.upgrade() {
            Some(slot) => slot.closed.load(Ordering::Acquire),
            None => true,
        }
    }
}

impl<T> Subscriber<T> {
    /// これまでの publish 回数。新しい値が来るたびに増える
    pub fn generation(&self) -> u64 {
        self.slot.generation.load(Ordering::Acquire)
    }

    /// 最新値とその世代。まだ何も publish されていなければ None
    pub fn snapshot(&self) -> Option<(u64, Arc<T>)> {
        let guard = lock(&self.slot.value);
        let generation = self.slot.generation.load(Ordering::Acquire);
        guard.as_ref().map(|v| (generation, Arc::clone(v)))
    }

    /// 最新値のみ
    pub fn latest(&self) -> Option<Arc<T>> {
        lock(&self.slot.value).as_ref().map(Arc::clone)
    }

    /// `last_seen` より新しい世代が来るまで最大 `timeout` 待つ
    pub fn wait_newer(&self, last_seen: u64, timeout: Duration) -> Option<(u64, Arc<T>)> {
        let guard = lock(&self.slot.value);
        let (guard, _) = self
            .slot
            .changed
            .wait_timeout_while(guard, timeout, |_| {
                self.slot.generation.load(Ordering::Acquire) <= last_seen
                    && !self.slot.closed.load(Ordering::Acquire)
            })
            .unwrap_or_else(PoisonError::into_inner);

        let generation = self.slot.generation.load(Ordering::Acquire);
        if generation <= last_seen {
            return None;
        }
        guard.as_ref().map(|v| (generation, Arc::clone(v)))
    }

    /// 書き込み側がまだ生きているか
    pub fn has_publisher(&self) -> bool {
        Arc::weak_count(&self.slot) > 0
    }

    /// 以後の publish を no-op にし、待機中のスレッドを起こす
    pub fn close(&self) {
        self.slot.closed.store(true, Ordering::Release);
        self.slot.changed.notify_all();
    }
}

// 読み取りはスナップショットを取るだけなので複数スレッドから共有できる
impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_empty_slot() {
        let (_publisher, subscriber) = latest::<Vec<u32>>();
        assert_eq!(subscriber.generation(), 0);
        assert!(subscriber.snapshot().is_none());
        assert!(subscriber.latest().is_none());
    }

    #[test]
    fn test_latest_wins() {
        let (publisher, subscriber) = latest();
        assert!(publisher.publish(vec![1, 1, 1]));
        assert!(publisher.publish(vec![2, 2]));

        let (generation, value) = subscriber.snapshot().unwrap();
        assert_eq!(generation, 2);
        assert_eq!(*value, vec![2, 2]);
    }

    #[test]
    fn test_snapshot_is_not_consumed() {
        let (publisher, subscriber) = latest();
        publisher.publish(7u32);
        assert_eq!(*subscriber.latest().unwrap(), 7);
        assert_eq!(*subscriber.latest().unwrap(), 7);
    }

    #[test]
    fn test_publish_after_subscriber_dropped() {
        let (publisher, subscriber) = latest();
        drop(subscriber);
        assert!(!publisher.publish(1u8));
        assert!(publisher.is_closed());
    }

    #[test]
    fn test_publish_after_close() {
        let (publisher, subscriber) = latest();
        assert!(publisher.publish(1u8));
        subscriber.close();
        assert!(!publisher.publish(2u8));
        assert_eq!(*subscriber.latest().unwrap(), 1);
        assert_eq!(subscriber.generation(), 1);
    }

    #[test]
    fn test_has_publisher() {
        let (publisher, subscriber) = latest::<u8>();
        assert!(subscriber.has_publisher());
        drop(publisher);
        assert!(!subscriber.has_publisher());
    }

    #[test]
    fn test_publisher_never_blocks_without_reader() {
        let (publisher, _subscriber) = latest();
        let start = Instant::now();
        for i in 0..100_000u32 {
            assert!(publisher.publish(vec![i; 12]));
        }
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_wait_newer_timeout() {
        let (_publisher, subscriber) = latest::<u8>();
        let start = Instant::now();
        assert!(subscriber.wait_newer(0, Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_newer_wakes_on_publish() {
        let (publisher, subscriber) = latest();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            publisher.publish(42u32);
        });

        let (generation, value) = subscriber
            .wait_newer(0, Duration::from_secs(5))
            .unwrap();
        assert_eq!(generation, 1);
        assert_eq!(*value, 42);
        handle.join().unwrap();
    }

    #[test]
    fn test_reader_never_sees_mixed_sets() {
        let (publisher, subscriber) = latest();
        let writer = thread::spawn(move || {
            for i in 0..10_000u32 {
                publisher.publish(vec![i; 16]);
            }
        });

        let mut last = 0;
        while !writer.is_finished() {
            if let Some((generation, set)) = subscriber.snapshot() {
                assert!(generation >= last);
                last = generation;
                assert!(set.iter().all(|v| *v == set[0]));
            }
        }
        writer.join().unwrap();
        assert_eq!(subscriber.generation(), 10_000);
    }
}
