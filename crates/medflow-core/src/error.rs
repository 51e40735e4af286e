//! 错误定义模块

use thiserror::Error;
use uuid::Uuid;

/// MedFlow系统统一错误类型
#[derive(Error, Debug)]
pub enum MedflowError {
    #[error("租户不存在: {0}")]
    UnknownTenant(Uuid),

    #[error("租户订阅已失效: {0}")]
    SubscriptionInactive(Uuid),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效状态转换: 从 {from} 到 {to}")]
    InvalidTransition { from: String, to: String },

    #[error("并发写入冲突: {0}")]
    Conflict(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("存储错误: {0}")]
    Persistence(String),

    #[error("操作超时: {0}")]
    Timeout(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl MedflowError {
    /// 对外暴露的稳定错误码，用于网络协议层，避免泄露内部消息
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownTenant(_) => "UNKNOWN_TENANT",
            Self::SubscriptionInactive(_) => "SUBSCRIPTION_INACTIVE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// MedFlow系统统一结果类型
pub type Result<T> = std::result::Result<T, MedflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let err = MedflowError::UnknownTenant(Uuid::nil());
        assert_eq!(err.code(), "UNKNOWN_TENANT");

        let err = MedflowError::InvalidTransition {
            from: "completed".to_string(),
            to: "waiting".to_string(),
        };
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }
}
