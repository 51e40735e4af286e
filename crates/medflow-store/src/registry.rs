//! 租户注册表
//!
//! 维护医院（租户）档案与订阅状态。所有核心操作在执行前都要先
//! 通过`validate`确认租户存在且订阅有效，失败的操作不产生任何副作用。

use chrono::{Duration, Utc};
use medflow_core::{Hospital, MedflowError, NewHospital, Result, SubscriptionStatus};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// 新租户的试用期天数
const TRIAL_DAYS: i64 = 30;

/// 租户注册表
#[derive(Debug, Default)]
pub struct TenantRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    hospitals: HashMap<Uuid, Hospital>,
    // email -> hospital id，保证邮箱唯一
    by_email: HashMap<String, Uuid>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册新医院，订阅从30天试用期开始
    pub async fn register(&self, req: NewHospital) -> Result<Hospital> {
        if req.name.trim().is_empty() {
            return Err(MedflowError::Validation("hospital name is required".into()));
        }
        let email = req.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(MedflowError::Validation("valid email is required".into()));
        }

        let mut inner = self.inner.write().await;
        if inner.by_email.contains_key(&email) {
            return Err(MedflowError::Validation(
                "hospital email already registered".into(),
            ));
        }

        let now = Utc::now();
        let hospital = Hospital {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            email: email.clone(),
            phone: req.phone,
            address: req.address,
            subscription_status: SubscriptionStatus::Active,
            subscription_expiry: now + Duration::days(TRIAL_DAYS),
            created_at: now,
            last_login: None,
        };

        inner.by_email.insert(email, hospital.id);
        inner.hospitals.insert(hospital.id, hospital.clone());

        info!("Registered hospital {} ({})", hospital.name, hospital.id);
        Ok(hospital)
    }

    /// 校验租户存在且订阅有效
    ///
    /// 订阅状态不是active，或到期时间已过，均视为失效。
    pub async fn validate(&self, hospital_id: Uuid) -> Result<Hospital> {
        let inner = self.inner.read().await;
        let hospital = inner
            .hospitals
            .get(&hospital_id)
            .ok_or(MedflowError::UnknownTenant(hospital_id))?;

        if hospital.subscription_status != SubscriptionStatus::Active
            || hospital.subscription_expiry < Utc::now()
        {
            warn!(
                "Rejected operation for hospital {} with inactive subscription",
                hospital_id
            );
            return Err(MedflowError::SubscriptionInactive(hospital_id));
        }

        Ok(hospital.clone())
    }

    /// 仅按id查找，不校验订阅（管理面使用）
    pub async fn get(&self, hospital_id: Uuid) -> Result<Hospital> {
        let inner = self.inner.read().await;
        inner
            .hospitals
            .get(&hospital_id)
            .cloned()
            .ok_or(MedflowError::UnknownTenant(hospital_id))
    }

    /// 续费：重新激活并延长到期时间
    pub async fn renew(&self, hospital_id: Uuid, days: i64) -> Result<Hospital> {
        if days <= 0 {
            return Err(MedflowError::Validation(
                "renewal days must be positive".into(),
            ));
        }

        let mut inner = self.inner.write().await;
        let hospital = inner
            .hospitals
            .get_mut(&hospital_id)
            .ok_or(MedflowError::UnknownTenant(hospital_id))?;

        let now = Utc::now();
        let base = hospital.subscription_expiry.max(now);
        hospital.subscription_expiry = base + Duration::days(days);
        hospital.subscription_status = SubscriptionStatus::Active;

        info!("Renewed hospital {} for {} days", hospital_id, days);
        Ok(hospital.clone())
    }

    /// 管理面设置订阅状态（如暂停欠费租户）
    pub async fn set_status(&self, hospital_id: Uuid, status: SubscriptionStatus) -> Result<Hospital> {
        let mut inner = self.inner.write().await;
        let hospital = inner
            .hospitals
            .get_mut(&hospital_id)
            .ok_or(MedflowError::UnknownTenant(hospital_id))?;

        hospital.subscription_status = status;
        Ok(hospital.clone())
    }

    /// 记录登录时间（凭证校验由外部认证组件完成）
    pub async fn record_login(&self, hospital_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        let hospital = inner
            .hospitals
            .get_mut(&hospital_id)
            .ok_or(MedflowError::UnknownTenant(hospital_id))?;

        hospital.last_login = Some(Utc::now());
        Ok(())
    }

    /// 所有订阅有效的医院，按名称排序
    pub async fn list_active(&self) -> Vec<Hospital> {
        let inner = self.inner.read().await;
        let now = Utc::now();
        let mut hospitals: Vec<Hospital> = inner
            .hospitals
            .values()
            .filter(|h| {
                h.subscription_status == SubscriptionStatus::Active && h.subscription_expiry >= now
            })
            .cloned()
            .collect();
        hospitals.sort_by(|a, b| a.name.cmp(&b.name));
        hospitals
    }
}
