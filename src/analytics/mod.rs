//! 点击计数缓冲与事件存储抽象

pub mod manager;
pub mod sink;

pub use manager::ClickManager;
pub use sink::{ClickSink, EventStore};
