//! 通知模块
//!
//! 事务提交后的事件派发：服务层收集事件，派发器在提交后异步投递。

pub mod dispatcher;
pub mod sink;

pub use dispatcher::EffectDispatcher;
pub use sink::{LoggingSink, NotificationSink};
