//! # MedFlow Web模块
//!
//! 对外服务面：面向看板的WebSocket事件协议与REST查询接口。

pub mod handlers;
pub mod server;
pub mod socket;

pub use server::{AppState, WebServer};
