//! 引擎对外发布的事件目录
//!
//! 投递语义：尽力而为、至多一次、无回放。事件发布后才加入的连接
//! 收不到历史事件，需要通过查询接口获取当前状态。

use medflow_core::Patient;
use serde::Serialize;

/// 排队引擎发布的看板事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum QueueEvent {
    /// 新患者登记完成，发往租户的reception与doctor子主题
    PatientRegistered(Patient),
    /// 患者记录变更后的完整快照，发往租户主题
    PatientUpdated(Patient),
    /// 队列变化，发往租户主题及各角色子主题
    QueueUpdated { patient: Patient },
    /// 处方更新，发往doctor与reception子主题
    PrescriptionUpdated(Patient),
    /// 登记失败，仅发往发起连接
    PatientRegistrationError { code: String, message: String },
    /// 移动/更新失败，仅发往发起连接
    QueueError {
        action: String,
        code: String,
        message: String,
    },
}

impl QueueEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PatientRegistered(_) => "patient-registered",
            Self::PatientUpdated(_) => "patient-updated",
            Self::QueueUpdated { .. } => "queue-updated",
            Self::PrescriptionUpdated(_) => "prescription-updated",
            Self::PatientRegistrationError { .. } => "patient-registration-error",
            Self::QueueError { .. } => "queue-error",
        }
    }
}
