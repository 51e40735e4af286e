//! # MedFlow排队模块
//!
//! 提供完整的门诊排队工作流管理功能，包括：
//! - 排队状态机：管理患者从候诊到完成的完整生命周期
//! - 医生名册：按租户维护的科室名册与自动分诊
//! - 排队引擎：把租户校验、分诊、发号、持久化与广播
//!   串成逐步显式传播错误的原子操作单元

pub mod directory;
pub mod engine;
pub mod state_machine;

// 重新导出主要类型
pub use directory::{DoctorDirectory, InMemoryDoctorDirectory, NewDoctor, DEFAULT_ROSTER};
pub use engine::{EngineConfig, MoveRequest, QueueEngine, QueueStats};
pub use state_machine::QueueStateMachine;
