//! 患者记录存储
//!
//! 所有方法都以hospital_id作为强制隔离参数：属于其他租户的id与
//! 不存在的id表现完全一致（NotFound），绝不泄露存在性。更新走
//! 乐观版本检查，过期写入返回Conflict由调用方重试。

use crate::tokens::TokenAllocator;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use medflow_core::{
    MedflowError, NewPatient, Patient, PatientFilter, PatientUpdate, QueueStatus, Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// 患者记录存储接口
///
/// 以trait形式暴露，部署方可以换成任意后端实现。
#[async_trait]
pub trait PatientStore: Send + Sync {
    /// 插入新患者：排队号在插入的同一临界区内分配，
    /// 登记被拒绝时不会消耗排队号。
    async fn insert(&self, draft: NewPatient) -> Result<Patient>;

    /// 按租户读取单个患者
    async fn get(&self, hospital_id: Uuid, id: Uuid) -> Result<Patient>;

    /// 乐观更新：expected_version与当前版本不一致时返回Conflict，
    /// 不产生任何修改。成功时返回完整的更新后记录。
    async fn update(
        &self,
        hospital_id: Uuid,
        id: Uuid,
        expected_version: u64,
        changes: PatientUpdate,
    ) -> Result<Patient>;

    /// 租户内患者列表，最新登记在前
    async fn list(&self, hospital_id: Uuid, filter: PatientFilter) -> Result<Vec<Patient>>;

    /// 处方流转中的患者：有处方、或在药房、或已有药房子状态，
    /// 按排队号升序
    async fn list_prescriptions(&self, hospital_id: Uuid) -> Result<Vec<Patient>>;
}

/// 内存实现：每个租户一个分片，租户之间互不阻塞
#[derive(Debug, Default)]
pub struct MemoryPatientStore {
    shards: DashMap<Uuid, Arc<RwLock<TenantShard>>>,
    tokens: TokenAllocator,
}

#[derive(Debug, Default)]
struct TenantShard {
    patients: HashMap<Uuid, Patient>,
    // 插入顺序，列表查询时反向输出
    order: Vec<Uuid>,
}

impl MemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, hospital_id: Uuid) -> Arc<RwLock<TenantShard>> {
        self.shards
            .entry(hospital_id)
            .or_default()
            .clone()
    }

    fn existing_shard(&self, hospital_id: Uuid) -> Option<Arc<RwLock<TenantShard>>> {
        self.shards.get(&hospital_id).map(|s| s.value().clone())
    }

    fn not_found(id: Uuid) -> MedflowError {
        MedflowError::NotFound(format!("patient {id}"))
    }
}

#[async_trait]
impl PatientStore for MemoryPatientStore {
    async fn insert(&self, draft: NewPatient) -> Result<Patient> {
        let shard = self.shard(draft.hospital_id);
        let mut shard = shard.write().await;

        // 排队号分配与插入在同一写临界区内，构成一个原子单元
        let token = self.tokens.next(draft.hospital_id, &draft.department);
        let patient = Patient {
            id: Uuid::new_v4(),
            hospital_id: draft.hospital_id,
            token,
            name: draft.name,
            age: draft.age,
            gender: draft.gender,
            phone: draft.phone,
            address: draft.address,
            patient_type: draft.patient_type,
            admission_class: draft.admission_class,
            department: draft.department,
            doctor_id: draft.doctor_id,
            reason: draft.reason,
            status: QueueStatus::Waiting,
            pharmacy_state: None,
            prescription: None,
            cost: draft.cost,
            registered_at: Utc::now(),
            reports: draft.reports,
            version: 1,
        };

        shard.order.push(patient.id);
        shard.patients.insert(patient.id, patient.clone());

        info!(
            "Registered patient {} token {} in department {} for hospital {}",
            patient.id, patient.token, patient.department, patient.hospital_id
        );
        Ok(patient)
    }

    async fn get(&self, hospital_id: Uuid, id: Uuid) -> Result<Patient> {
        let shard = self
            .existing_shard(hospital_id)
            .ok_or_else(|| Self::not_found(id))?;
        let shard = shard.read().await;
        shard
            .patients
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn update(
        &self,
        hospital_id: Uuid,
        id: Uuid,
        expected_version: u64,
        changes: PatientUpdate,
    ) -> Result<Patient> {
        let shard = self
            .existing_shard(hospital_id)
            .ok_or_else(|| Self::not_found(id))?;
        let mut shard = shard.write().await;
        let patient = shard
            .patients
            .get_mut(&id)
            .ok_or_else(|| Self::not_found(id))?;

        if patient.version != expected_version {
            debug!(
                "Stale write rejected for patient {}: expected v{}, current v{}",
                id, expected_version, patient.version
            );
            return Err(MedflowError::Conflict(format!(
                "patient {id} was modified concurrently"
            )));
        }

        if let Some(status) = changes.status {
            patient.status = status;
        }
        if let Some(doctor_id) = changes.doctor_id {
            patient.doctor_id = Some(doctor_id);
        }
        if let Some(state) = changes.pharmacy_state {
            patient.pharmacy_state = Some(state);
        }
        if let Some(prescription) = changes.prescription {
            patient.prescription = Some(prescription);
        }
        patient.version += 1;

        Ok(patient.clone())
    }

    async fn list(&self, hospital_id: Uuid, filter: PatientFilter) -> Result<Vec<Patient>> {
        let Some(shard) = self.existing_shard(hospital_id) else {
            return Ok(Vec::new());
        };
        let shard = shard.read().await;

        let patients = shard
            .order
            .iter()
            .rev()
            .filter_map(|id| shard.patients.get(id))
            .filter(|p| match &filter.phone {
                Some(phone) => p.phone.as_deref() == Some(phone.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        Ok(patients)
    }

    async fn list_prescriptions(&self, hospital_id: Uuid) -> Result<Vec<Patient>> {
        let Some(shard) = self.existing_shard(hospital_id) else {
            return Ok(Vec::new());
        };
        let shard = shard.read().await;

        let mut patients: Vec<Patient> = shard
            .patients
            .values()
            .filter(|p| {
                p.prescription.as_deref().is_some_and(|rx| !rx.is_empty())
                    || p.status == QueueStatus::Pharmacy
                    || p.pharmacy_state.is_some()
            })
            .cloned()
            .collect();
        patients.sort_by_key(|p| p.token);
        Ok(patients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medflow_core::AdmissionClass;

    fn draft(hospital_id: Uuid, name: &str, department: &str) -> NewPatient {
        NewPatient {
            hospital_id,
            name: name.to_string(),
            age: Some(30),
            gender: None,
            phone: None,
            address: None,
            patient_type: "New".to_string(),
            admission_class: AdmissionClass::Opd,
            department: department.to_string(),
            doctor_id: None,
            reason: None,
            cost: 0.0,
            reports: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_tokens_per_department() {
        let store = MemoryPatientStore::new();
        let hospital = Uuid::new_v4();

        let a = store.insert(draft(hospital, "Asha", "General")).await.unwrap();
        let b = store.insert(draft(hospital, "Ravi", "General")).await.unwrap();
        let c = store
            .insert(draft(hospital, "Meera", "Cardiology"))
            .await
            .unwrap();

        assert_eq!(a.token, 1);
        assert_eq!(b.token, 2);
        assert_eq!(c.token, 1);
        assert_eq!(a.status, QueueStatus::Waiting);
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let store = MemoryPatientStore::new();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();

        let patient = store.insert(draft(tenant_a, "Asha", "General")).await.unwrap();

        // 其他租户读不到、改不了，表现与不存在的id一致
        let err = store.get(tenant_b, patient.id).await.unwrap_err();
        assert!(matches!(err, MedflowError::NotFound(_)));

        let err = store
            .update(tenant_b, patient.id, patient.version, PatientUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MedflowError::NotFound(_)));

        assert!(store
            .list(tenant_b, PatientFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_stale_write_is_rejected() {
        let store = MemoryPatientStore::new();
        let hospital = Uuid::new_v4();
        let patient = store.insert(draft(hospital, "Asha", "General")).await.unwrap();

        let changes = PatientUpdate {
            status: Some(QueueStatus::WithDoctor),
            ..Default::default()
        };
        let updated = store
            .update(hospital, patient.id, patient.version, changes.clone())
            .await
            .unwrap();
        assert_eq!(updated.version, patient.version + 1);

        // 基于旧版本的写入被拒绝，记录保持不变
        let err = store
            .update(hospital, patient.id, patient.version, changes)
            .await
            .unwrap_err();
        assert!(matches!(err, MedflowError::Conflict(_)));

        let current = store.get(hospital, patient.id).await.unwrap();
        assert_eq!(current.version, updated.version);
        assert_eq!(current.status, QueueStatus::WithDoctor);
    }

    #[tokio::test]
    async fn test_list_newest_first_with_phone_filter() {
        let store = MemoryPatientStore::new();
        let hospital = Uuid::new_v4();

        let mut first = draft(hospital, "Asha", "General");
        first.phone = Some("9876543210".to_string());
        store.insert(first).await.unwrap();
        store.insert(draft(hospital, "Ravi", "General")).await.unwrap();

        let all = store.list(hospital, PatientFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Ravi");

        let filtered = store
            .list(
                hospital,
                PatientFilter {
                    phone: Some("9876543210".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "Asha");
    }

    #[tokio::test]
    async fn test_list_prescriptions_orders_by_token() {
        let store = MemoryPatientStore::new();
        let hospital = Uuid::new_v4();

        let a = store.insert(draft(hospital, "Asha", "General")).await.unwrap();
        let b = store.insert(draft(hospital, "Ravi", "General")).await.unwrap();
        // 没有处方也不在药房的患者不应出现
        store.insert(draft(hospital, "Meera", "General")).await.unwrap();

        store
            .update(
                hospital,
                b.id,
                b.version,
                PatientUpdate {
                    prescription: Some("Paracetamol 500mg".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .update(
                hospital,
                a.id,
                a.version,
                PatientUpdate {
                    status: Some(QueueStatus::Pharmacy),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let rx = store.list_prescriptions(hospital).await.unwrap();
        let tokens: Vec<i64> = rx.iter().map(|p| p.token).collect();
        assert_eq!(tokens, vec![1, 2]);
    }
}
