//! 排队号分配器
//!
//! 按(租户, 科室)维护单调递增的排队号。并发调用方永远不会拿到
//! 相同的号：递增发生在DashMap分片写锁内，读-增-写不可分割。
//! 排队号一经发出不再复用。

use dashmap::DashMap;
use uuid::Uuid;

/// 排队号分配器
#[derive(Debug, Default)]
pub struct TokenAllocator {
    counters: DashMap<(Uuid, String), i64>,
}

impl TokenAllocator {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// 为(租户, 科室)分配下一个排队号，从1开始
    pub fn next(&self, hospital_id: Uuid, department: &str) -> i64 {
        let mut counter = self
            .counters
            .entry((hospital_id, department.to_string()))
            .or_insert(0);
        *counter += 1;
        *counter
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_tokens_are_sequential_per_key() {
        let allocator = TokenAllocator::new();
        let hospital = Uuid::new_v4();

        assert_eq!(allocator.next(hospital, "General"), 1);
        assert_eq!(allocator.next(hospital, "General"), 2);
        // 不同科室各自独立计数
        assert_eq!(allocator.next(hospital, "Cardiology"), 1);
        // 不同租户各自独立计数
        assert_eq!(allocator.next(Uuid::new_v4(), "General"), 1);
    }

    #[test]
    fn test_concurrent_allocations_are_unique_and_gapless() {
        let allocator = Arc::new(TokenAllocator::new());
        let hospital = Uuid::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = allocator.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| allocator.next(hospital, "General"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut tokens: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        tokens.sort_unstable();

        // 200次并发分配：无重复、无空洞
        let expected: Vec<i64> = (1..=200).collect();
        assert_eq!(tokens, expected);
    }
}
