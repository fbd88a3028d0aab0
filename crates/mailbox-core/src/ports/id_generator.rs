//! IdGenerator port - ID 生成の抽象化
//!
//! タイムスタンプの分解能だけに頼ると、同じミリ秒内に post された
//! メッセージの ID が衝突する。そこでカウンタを組み合わせる。
//!
//! # 実装
//! - **TimestampIdGenerator**: `<YYYYMMDDHHMMSSmmm>_<counter>`

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::domain::MessageId;

/// IdGenerator はメッセージ ID を生成
///
/// `now` is the instant the queue stamps as `posted_at`, so the id and the
/// record agree on the post time.
pub trait IdGenerator: Send + Sync {
    fn generate(&self, now: DateTime<Utc>) -> MessageId;
}

/// Millisecond timestamp plus a strictly increasing counter.
///
/// The counter starts at 1 and never resets, so ids are unique for the
/// lifetime of the generator even if the clock stalls or goes backwards.
#[derive(Debug, Default)]
pub struct TimestampIdGenerator {
    last: AtomicU64,
}

impl TimestampIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for TimestampIdGenerator {
    fn generate(&self, now: DateTime<Utc>) -> MessageId {
        let n = self.last.fetch_add(1, Ordering::Relaxed) + 1;
        MessageId::new(format!("{}_{n}", now.format("%Y%m%d%H%M%S%3f")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use std::collections::HashSet;

    #[test]
    fn id_is_timestamp_and_counter() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + TimeDelta::milliseconds(42);
        let id_gen = TimestampIdGenerator::new();

        assert_eq!(id_gen.generate(now).as_str(), "20240101120000042_1");
        assert_eq!(id_gen.generate(now).as_str(), "20240101120000042_2");
    }

    #[test]
    fn same_instant_still_yields_unique_ids() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = TimestampIdGenerator::new();

        let ids: HashSet<_> = (0..1000).map(|_| id_gen.generate(now)).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn concurrent_generation_is_unique() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = std::sync::Arc::new(TimestampIdGenerator::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let id_gen = id_gen.clone();
                std::thread::spawn(move || (0..250).map(|_| id_gen.generate(now)).collect::<Vec<_>>())
            })
            .collect();

        let mut ids = HashSet::new();
        for h in handles {
            ids.extend(h.join().unwrap());
        }
        assert_eq!(ids.len(), 1000);
    }
}
