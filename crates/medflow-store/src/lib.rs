//! # MedFlow存储模块
//!
//! 提供租户与患者数据的并发安全存储，包括：
//! - 租户注册表：医院身份与订阅状态校验
//! - 排队号分配器：按(租户, 科室)原子递增
//! - 患者记录存储：按租户隔离的插入/查询/乐观更新

pub mod patients;
pub mod registry;
pub mod tokens;

pub use patients::{MemoryPatientStore, PatientStore};
pub use registry::TenantRegistry;
pub use tokens::TokenAllocator;
