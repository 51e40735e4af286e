//! # MedFlow广播模块
//!
//! 面向看板的实时事件扇出，包括：
//! - 类型化主题：{租户, 角色}键，杜绝字符串拼接带来的跨租户泄漏
//! - 订阅管理器：连接与主题的瞬态映射，断线即清理
//! - 广播路由器：尽力而为、至多一次、无回放的事件投递

pub mod events;
pub mod router;
pub mod subscriptions;
pub mod topic;

pub use events::QueueEvent;
pub use router::BroadcastRouter;
pub use subscriptions::SubscriptionManager;
pub use topic::{ConnectionId, Topic};
