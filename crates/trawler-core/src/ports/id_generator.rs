//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use ulid::Ulid;

use crate::domain::{RunId, TaskId};
use crate::ports::Clock;

/// IdGenerator はタスクと実行単位の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数ワーカーから同時に呼ばれる）
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;

    fn generate_run_id(&self) -> RunId;
}

/// Clock の時刻を timestamp 部に使う ULID 生成器。
///
/// FixedClock を渡すと timestamp 部が固定される（ランダム部は毎回異なる）。
pub struct UlidGenerator<K> {
    clock: K,
}

impl<K: Clock> UlidGenerator<K> {
    pub fn new(clock: K) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<K: Clock> IdGenerator for UlidGenerator<K> {
    fn generate_task_id(&self) -> TaskId {
        TaskId::from(self.next_ulid())
    }

    fn generate_run_id(&self) -> RunId {
        RunId::from(self.next_ulid())
    }
}
