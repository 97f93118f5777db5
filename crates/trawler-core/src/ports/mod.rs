//! Ports - 抽象化レイヤー
//!
//! 実行時に差し替える外部依存（クライアント、シード、イベント記録、時刻、ID 生成）
//! をここで trait として定義します。
//!
//! # 設計原則
//! - コアは具体的な I/O を知らない（HTTP もブラウザもここには無い）
//! - テストでは FixedClock / NoopSink / `()` クライアントに差し替える

pub mod client;
pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod seeder;

pub use self::client::{Client, DirectClient};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{EventSink, NoopSink, TracingSink};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::seeder::{ArgsSeeder, Seeder};
