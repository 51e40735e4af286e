//! 排队引擎
//!
//! 协调租户校验、自动分诊、发号、持久化与广播的核心引擎。
//! 每个操作都是一个显式传播错误的读-校验-写-广播单元：校验失败的
//! 操作不产生任何副作用，被拒绝的登记不消耗排队号，被拒绝的转换
//! 不改变看板状态。

use crate::directory::DoctorDirectory;
use crate::state_machine::QueueStateMachine;
use medflow_broadcast::{BroadcastRouter, QueueEvent, Topic};
use medflow_core::utils::{is_known_department, is_valid_phone, normalize_department};
use medflow_core::{
    MedflowError, NewPatient, Patient, PatientFilter, PatientUpdate, PharmacyState, QueueStatus,
    RegistrationRequest, Result, Role, DEPARTMENTS,
};
use medflow_store::{PatientStore, TenantRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 单个持久化操作的时限，超时返回Timeout且不留下可观察的半成品状态
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// 移动患者请求：None表示调用方不修改该字段
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    #[serde(default)]
    pub status: Option<QueueStatus>,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub pharmacy_state: Option<PharmacyState>,
}

/// 租户队列统计
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total: u64,
    pub waiting: u64,
    pub with_doctor: u64,
    pub pharmacy: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub waiting_by_department: HashMap<String, u64>,
}

/// 排队引擎
pub struct QueueEngine {
    registry: Arc<TenantRegistry>,
    directory: Arc<dyn DoctorDirectory>,
    store: Arc<dyn PatientStore>,
    router: Arc<BroadcastRouter>,
    state_machine: QueueStateMachine,
    config: EngineConfig,
}

impl QueueEngine {
    pub fn new(
        registry: Arc<TenantRegistry>,
        directory: Arc<dyn DoctorDirectory>,
        store: Arc<dyn PatientStore>,
        router: Arc<BroadcastRouter>,
    ) -> Self {
        Self::with_config(registry, directory, store, router, EngineConfig::default())
    }

    pub fn with_config(
        registry: Arc<TenantRegistry>,
        directory: Arc<dyn DoctorDirectory>,
        store: Arc<dyn PatientStore>,
        router: Arc<BroadcastRouter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            directory,
            store,
            router,
            state_machine: QueueStateMachine::new(),
            config,
        }
    }

    /// 登记新患者
    ///
    /// 校验全部通过后才发号，发号与插入在存储层同一临界区内完成，
    /// 因此被拒绝的登记不会留下号洞。
    pub async fn register_patient(
        &self,
        hospital_id: Uuid,
        req: RegistrationRequest,
    ) -> Result<Patient> {
        self.registry.validate(hospital_id).await?;
        Self::validate_registration(&req)?;

        let department = normalize_department(req.department.as_deref());
        if !is_known_department(&department) {
            warn!("Registering patient into non-standard department {department}");
        }

        let doctor_id = match req.doctor_id {
            Some(doctor_id) => {
                // 显式指定的医生必须在本租户的名册内
                self.directory.get(hospital_id, doctor_id).await?;
                Some(doctor_id)
            }
            None => self.directory.auto_assign(hospital_id, &department).await?,
        };

        let draft = NewPatient {
            hospital_id,
            name: req.name.trim().to_string(),
            age: req.age,
            gender: req.gender.filter(|g| !g.trim().is_empty()),
            phone: req.phone.filter(|p| !p.trim().is_empty()),
            address: req.address.filter(|a| !a.trim().is_empty()),
            patient_type: req.patient_type.unwrap_or_else(|| "New".to_string()),
            admission_class: req.admission_class.unwrap_or_default(),
            department,
            doctor_id,
            reason: req.reason.filter(|r| !r.trim().is_empty()),
            cost: req.cost.unwrap_or(0.0),
            reports: req.reports,
        };

        let patient = self
            .with_timeout("register-patient", self.store.insert(draft))
            .await?;

        if let Some(doctor_id) = patient.doctor_id {
            self.directory.note_assigned(hospital_id, doctor_id).await?;
        }

        let registered = QueueEvent::PatientRegistered(patient.clone());
        self.router.publish_all(
            &[
                Topic::role(hospital_id, Role::Reception),
                Topic::role(hospital_id, Role::Doctor),
            ],
            &registered,
        );
        self.router.publish(
            Topic::tenant(hospital_id),
            &QueueEvent::QueueUpdated {
                patient: patient.clone(),
            },
        );

        Ok(patient)
    }

    /// 在队列中移动患者
    ///
    /// 状态转换按状态机校验；携带的医生与记录上已有医生不一致时
    /// 拒绝（改派必须走显式的reassign操作）；进入with-doctor且
    /// 尚无医生时自动分诊。
    pub async fn move_patient(
        &self,
        hospital_id: Uuid,
        patient_id: Uuid,
        req: MoveRequest,
    ) -> Result<Patient> {
        self.registry.validate(hospital_id).await?;
        let current = self
            .with_timeout("load-patient", self.store.get(hospital_id, patient_id))
            .await?;

        let mut status = match req.status {
            Some(target) => Some(self.state_machine.transition(current.status, target)?),
            None => None,
        };

        let mut doctor_id = req.doctor_id;
        if let Some(requested) = doctor_id {
            self.directory.get(hospital_id, requested).await?;
            if let Some(existing) = current.doctor_id {
                if existing != requested {
                    return Err(MedflowError::Validation(
                        "patient already has a doctor; use the reassign operation".into(),
                    ));
                }
            }
        }

        // 进入with-doctor且无医生时自动分诊；没有可用医生则保持未分配
        if status == Some(QueueStatus::WithDoctor)
            && current.doctor_id.is_none()
            && doctor_id.is_none()
        {
            doctor_id = self
                .directory
                .auto_assign(hospital_id, &current.department)
                .await?;
        }

        // 药房送达意味着整个流程结束
        if req.pharmacy_state == Some(PharmacyState::Delivered)
            && status.unwrap_or(current.status) == QueueStatus::Pharmacy
        {
            status = Some(QueueStatus::Completed);
        }

        let changes = PatientUpdate {
            status,
            doctor_id,
            pharmacy_state: req.pharmacy_state,
            prescription: None,
        };
        if changes.is_empty() {
            return Ok(current);
        }

        let updated = self
            .with_timeout(
                "move-patient",
                self.store
                    .update(hospital_id, patient_id, current.version, changes),
            )
            .await?;

        // 接诊计数：新挂上的医生加一，流程终结时减一
        if current.doctor_id.is_none() {
            if let Some(doctor_id) = updated.doctor_id {
                self.directory.note_assigned(hospital_id, doctor_id).await?;
            }
        }
        if updated.status.is_terminal() && !current.status.is_terminal() {
            if let Some(doctor_id) = updated.doctor_id {
                self.directory.note_released(hospital_id, doctor_id).await?;
            }
        }

        info!(
            "Moved patient {} from {} to {} in hospital {}",
            patient_id,
            current.status.as_str(),
            updated.status.as_str(),
            hospital_id
        );
        self.publish_queue_change(hospital_id, &updated);
        Ok(updated)
    }

    /// 显式改派医生
    pub async fn reassign_doctor(
        &self,
        hospital_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<Patient> {
        self.registry.validate(hospital_id).await?;
        self.directory.get(hospital_id, doctor_id).await?;

        let current = self
            .with_timeout("load-patient", self.store.get(hospital_id, patient_id))
            .await?;
        if current.status.is_terminal() {
            return Err(MedflowError::Validation(
                "cannot reassign a finished patient".into(),
            ));
        }
        if current.doctor_id == Some(doctor_id) {
            return Ok(current);
        }

        let updated = self
            .with_timeout(
                "reassign-doctor",
                self.store.update(
                    hospital_id,
                    patient_id,
                    current.version,
                    PatientUpdate {
                        doctor_id: Some(doctor_id),
                        ..Default::default()
                    },
                ),
            )
            .await?;

        if let Some(previous) = current.doctor_id {
            self.directory.note_released(hospital_id, previous).await?;
        }
        self.directory.note_assigned(hospital_id, doctor_id).await?;

        info!(
            "Reassigned patient {} to doctor {} in hospital {}",
            patient_id, doctor_id, hospital_id
        );
        self.publish_queue_change(hospital_id, &updated);
        Ok(updated)
    }

    /// 更新处方
    pub async fn update_prescription(
        &self,
        hospital_id: Uuid,
        patient_id: Uuid,
        prescription: String,
    ) -> Result<Patient> {
        self.registry.validate(hospital_id).await?;
        let current = self
            .with_timeout("load-patient", self.store.get(hospital_id, patient_id))
            .await?;

        let updated = self
            .with_timeout(
                "update-prescription",
                self.store.update(
                    hospital_id,
                    patient_id,
                    current.version,
                    PatientUpdate {
                        prescription: Some(prescription),
                        ..Default::default()
                    },
                ),
            )
            .await?;

        let event = QueueEvent::PrescriptionUpdated(updated.clone());
        self.router.publish_all(
            &[
                Topic::role(hospital_id, Role::Doctor),
                Topic::role(hospital_id, Role::Reception),
            ],
            &event,
        );
        Ok(updated)
    }

    /// 租户内患者列表
    pub async fn list_patients(
        &self,
        hospital_id: Uuid,
        filter: PatientFilter,
    ) -> Result<Vec<Patient>> {
        self.registry.validate(hospital_id).await?;
        self.store.list(hospital_id, filter).await
    }

    /// 按id读取患者
    pub async fn get_patient(&self, hospital_id: Uuid, patient_id: Uuid) -> Result<Patient> {
        self.registry.validate(hospital_id).await?;
        self.store.get(hospital_id, patient_id).await
    }

    /// 处方流转中的患者
    pub async fn list_prescriptions(&self, hospital_id: Uuid) -> Result<Vec<Patient>> {
        self.registry.validate(hospital_id).await?;
        self.store.list_prescriptions(hospital_id).await
    }

    /// 科室列表（静态数据，不做租户校验）
    pub fn list_departments(&self) -> &'static [&'static str] {
        &DEPARTMENTS
    }

    /// 租户名册，可按科室过滤
    pub async fn list_doctors(
        &self,
        hospital_id: Uuid,
        department: Option<&str>,
    ) -> Result<Vec<medflow_core::Doctor>> {
        self.registry.validate(hospital_id).await?;
        self.directory.list(hospital_id, department).await
    }

    /// 租户队列统计
    pub async fn queue_stats(&self, hospital_id: Uuid) -> Result<QueueStats> {
        self.registry.validate(hospital_id).await?;
        let patients = self.store.list(hospital_id, PatientFilter::default()).await?;

        let mut stats = QueueStats::default();
        for patient in &patients {
            stats.total += 1;
            match patient.status {
                QueueStatus::Waiting => {
                    stats.waiting += 1;
                    *stats
                        .waiting_by_department
                        .entry(patient.department.clone())
                        .or_insert(0) += 1;
                }
                QueueStatus::WithDoctor => stats.with_doctor += 1,
                QueueStatus::Pharmacy => stats.pharmacy += 1,
                QueueStatus::Completed => stats.completed += 1,
                QueueStatus::Cancelled => stats.cancelled += 1,
            }
        }
        Ok(stats)
    }

    fn validate_registration(req: &RegistrationRequest) -> Result<()> {
        if req.name.trim().is_empty() {
            return Err(MedflowError::Validation("patient name is required".into()));
        }
        if let Some(age) = req.age {
            if !(0..=130).contains(&age) {
                return Err(MedflowError::Validation(format!("invalid age: {age}")));
            }
        }
        if let Some(phone) = req.phone.as_deref() {
            if !phone.trim().is_empty() && !is_valid_phone(phone.trim()) {
                return Err(MedflowError::Validation(format!("invalid phone: {phone}")));
            }
        }
        Ok(())
    }

    /// 队列变更的统一扇出：完整快照到租户主题，queue-updated到各角色子主题
    fn publish_queue_change(&self, hospital_id: Uuid, patient: &Patient) {
        self.router.publish(
            Topic::tenant(hospital_id),
            &QueueEvent::PatientUpdated(patient.clone()),
        );
        let queue_event = QueueEvent::QueueUpdated {
            patient: patient.clone(),
        };
        for role in Role::all() {
            self.router
                .publish(Topic::role(hospital_id, role), &queue_event);
        }
    }

    async fn with_timeout<T, F>(&self, action: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Operation {} timed out", action);
                Err(MedflowError::Timeout(action.to_string()))
            }
        }
    }
}
