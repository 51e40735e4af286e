//! 核心数据模型定义
//!
//! 网络协议层字段名沿用看板前端的camelCase约定。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 科室列表（静态数据）
pub const DEPARTMENTS: [&str; 8] = [
    "General",
    "Orthopedics",
    "Gynecology",
    "Pediatrics",
    "ENT",
    "Dermatology",
    "Cardiology",
    "Medicine",
];

/// 医院（租户）订阅状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Suspended,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Suspended => "suspended",
        }
    }
}

/// 医院（租户）信息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hospital {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub subscription_expiry: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// 医院注册请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHospital {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// 医生可用状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Busy,
    Offline,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Busy => "busy",
            Self::Offline => "offline",
        }
    }
}

/// 医生信息（每个租户独立的名册）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub name: String,
    pub department: String,
    pub availability: Availability,
}

/// 患者排队状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum QueueStatus {
    Waiting,
    WithDoctor,
    Pharmacy,
    Completed,
    Cancelled,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::WithDoctor => "with-doctor",
            Self::Pharmacy => "pharmacy",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// 终态不允许再转出
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// 药房子状态（仅当status=pharmacy时在看板上展示）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PharmacyState {
    Pending,
    Preparing,
    Ready,
    Delivered,
}

impl PharmacyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
        }
    }
}

/// 门诊/住院类别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdmissionClass {
    #[serde(rename = "OPD")]
    Opd,
    #[serde(rename = "IPD")]
    Ipd,
}

impl Default for AdmissionClass {
    fn default() -> Self {
        Self::Opd
    }
}

/// 看板角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reception,
    Doctor,
    Pharmacy,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reception => "reception",
            Self::Doctor => "doctor",
            Self::Pharmacy => "pharmacy",
        }
    }

    pub fn all() -> [Role; 3] {
        [Self::Reception, Self::Doctor, Self::Pharmacy]
    }
}

impl TryFrom<&str> for Role {
    type Error = crate::MedflowError;

    fn try_from(value: &str) -> crate::Result<Self> {
        match value {
            "reception" => Ok(Self::Reception),
            "doctor" => Ok(Self::Doctor),
            "pharmacy" => Ok(Self::Pharmacy),
            _ => Err(crate::MedflowError::Validation(format!(
                "unknown role: {value}"
            ))),
        }
    }
}

/// 患者记录
///
/// 不变量：所有读写都必须按hospital_id隔离；token在(hospital_id, department)
/// 内唯一且不复用。记录只会被终态化（completed/cancelled），不会删除。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub token: i64,
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub patient_type: String,
    #[serde(rename = "opdIpd")]
    pub admission_class: AdmissionClass,
    pub department: String,
    pub doctor_id: Option<Uuid>,
    pub reason: Option<String>,
    pub status: QueueStatus,
    pub pharmacy_state: Option<PharmacyState>,
    pub prescription: Option<String>,
    pub cost: f64,
    pub registered_at: DateTime<Utc>,
    pub reports: Vec<String>,
    /// 乐观并发版本号，每次成功更新递增
    pub version: u64,
}

/// 患者登记请求（报告文件由外部上传组件先行保存，这里只接收引用）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub patient_type: Option<String>,
    #[serde(default, rename = "opdIpd")]
    pub admission_class: Option<AdmissionClass>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub reports: Vec<String>,
}

/// 待插入的患者记录（token由存储层分配）
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub hospital_id: Uuid,
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub patient_type: String,
    pub admission_class: AdmissionClass,
    pub department: String,
    pub doctor_id: Option<Uuid>,
    pub reason: Option<String>,
    pub cost: f64,
    pub reports: Vec<String>,
}

/// 显式的部分更新：None表示调用方不打算修改该字段，
/// 引擎绝不会从旧记录推断意图。
#[derive(Debug, Clone, Default)]
pub struct PatientUpdate {
    pub status: Option<QueueStatus>,
    pub doctor_id: Option<Uuid>,
    pub pharmacy_state: Option<PharmacyState>,
    pub prescription: Option<String>,
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.doctor_id.is_none()
            && self.pharmacy_state.is_none()
            && self.prescription.is_none()
    }
}

/// 患者列表过滤器
#[derive(Debug, Clone, Default)]
pub struct PatientFilter {
    pub phone: Option<String>,
}
