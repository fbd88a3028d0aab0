//! Ports - 抽象化レイヤー
//!
//! キューが外部に依存するもの（時刻、ID 生成）を trait として切り出す。
//! テストでは FixedClock を差し込んで時間経過を決定的にシミュレートする。

pub mod clock;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, TimestampIdGenerator};
