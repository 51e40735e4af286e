//! 医生名册
//!
//! 按租户维护科室医生名册并执行自动分诊。分诊策略：名册插入顺序中
//! 第一位科室匹配且状态为available的医生；没有则返回None，患者
//! 留待人工分配。
//!
//! 容量模式（可选）：为每位医生设定接诊中的患者数上限，达到上限时
//! 状态自动变为busy，低于上限后恢复available。手动置为offline的
//! 医生不受计数影响。

use async_trait::async_trait;
use dashmap::DashMap;
use medflow_core::{Availability, Doctor, MedflowError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// 新租户的默认演示名册
pub const DEFAULT_ROSTER: [(&str, &str); 4] = [
    ("Dr. Asha Patel", "General"),
    ("Dr. Rajesh Singh", "Orthopedics"),
    ("Dr. Nisha Rao", "Gynecology"),
    ("Dr. Vikram Shah", "Cardiology"),
];

/// 待加入名册的医生
#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub name: String,
    pub department: String,
}

/// 医生名册接口
///
/// 以trait形式暴露，部署方可以注入任意后端实现。
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    /// 加入名册，保持插入顺序
    async fn add(&self, hospital_id: Uuid, doctor: NewDoctor) -> Result<Doctor>;

    /// 按租户读取单个医生
    async fn get(&self, hospital_id: Uuid, doctor_id: Uuid) -> Result<Doctor>;

    /// 名册列表，稳定顺序为插入顺序，可按科室过滤
    async fn list(&self, hospital_id: Uuid, department: Option<&str>) -> Result<Vec<Doctor>>;

    /// 自动分诊：返回第一位科室匹配且available的医生
    async fn auto_assign(&self, hospital_id: Uuid, department: &str) -> Result<Option<Uuid>>;

    /// 手动设置可用状态
    async fn set_availability(
        &self,
        hospital_id: Uuid,
        doctor_id: Uuid,
        availability: Availability,
    ) -> Result<Doctor>;

    /// 引擎上报：医生接诊了一位患者（容量计数加一）
    async fn note_assigned(&self, hospital_id: Uuid, doctor_id: Uuid) -> Result<()>;

    /// 引擎上报：医生名下一位患者离开流程（容量计数减一）
    async fn note_released(&self, hospital_id: Uuid, doctor_id: Uuid) -> Result<()>;
}

/// 内存实现：每个租户一份名册
#[derive(Debug, Default)]
pub struct InMemoryDoctorDirectory {
    rosters: DashMap<Uuid, Arc<RwLock<Roster>>>,
    /// 每位医生的接诊上限，None表示不启用容量模式
    capacity: Option<u32>,
}

#[derive(Debug, Default)]
struct Roster {
    // 插入顺序即分诊顺序
    doctors: Vec<Doctor>,
    active: HashMap<Uuid, u32>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用容量模式
    pub fn with_capacity(max_active: u32) -> Self {
        Self {
            rosters: DashMap::new(),
            capacity: Some(max_active),
        }
    }

    /// 为新租户播种默认名册
    pub async fn seed_defaults(&self, hospital_id: Uuid) -> Result<()> {
        for (name, department) in DEFAULT_ROSTER {
            self.add(
                hospital_id,
                NewDoctor {
                    name: name.to_string(),
                    department: department.to_string(),
                },
            )
            .await?;
        }
        Ok(())
    }

    fn roster(&self, hospital_id: Uuid) -> Arc<RwLock<Roster>> {
        self.rosters.entry(hospital_id).or_default().clone()
    }

    fn not_found(doctor_id: Uuid) -> MedflowError {
        MedflowError::NotFound(format!("doctor {doctor_id}"))
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorDirectory {
    async fn add(&self, hospital_id: Uuid, doctor: NewDoctor) -> Result<Doctor> {
        if doctor.name.trim().is_empty() {
            return Err(MedflowError::Validation("doctor name is required".into()));
        }

        let roster = self.roster(hospital_id);
        let mut roster = roster.write().await;

        let doctor = Doctor {
            id: Uuid::new_v4(),
            hospital_id,
            name: doctor.name.trim().to_string(),
            department: doctor.department,
            availability: Availability::Available,
        };
        roster.active.insert(doctor.id, 0);
        roster.doctors.push(doctor.clone());

        info!(
            "Added doctor {} ({}) to hospital {}",
            doctor.name, doctor.department, hospital_id
        );
        Ok(doctor)
    }

    async fn get(&self, hospital_id: Uuid, doctor_id: Uuid) -> Result<Doctor> {
        let roster = self.roster(hospital_id);
        let roster = roster.read().await;
        roster
            .doctors
            .iter()
            .find(|d| d.id == doctor_id)
            .cloned()
            .ok_or_else(|| Self::not_found(doctor_id))
    }

    async fn list(&self, hospital_id: Uuid, department: Option<&str>) -> Result<Vec<Doctor>> {
        let roster = self.roster(hospital_id);
        let roster = roster.read().await;
        Ok(roster
            .doctors
            .iter()
            .filter(|d| department.map_or(true, |dept| d.department == dept))
            .cloned()
            .collect())
    }

    async fn auto_assign(&self, hospital_id: Uuid, department: &str) -> Result<Option<Uuid>> {
        let roster = self.roster(hospital_id);
        let roster = roster.read().await;
        let assigned = roster
            .doctors
            .iter()
            .find(|d| d.department == department && d.availability == Availability::Available)
            .map(|d| d.id);

        match assigned {
            Some(id) => debug!(
                "Auto-assigned doctor {} for department {} in hospital {}",
                id, department, hospital_id
            ),
            None => debug!(
                "No available doctor for department {} in hospital {}",
                department, hospital_id
            ),
        }
        Ok(assigned)
    }

    async fn set_availability(
        &self,
        hospital_id: Uuid,
        doctor_id: Uuid,
        availability: Availability,
    ) -> Result<Doctor> {
        let roster = self.roster(hospital_id);
        let mut roster = roster.write().await;
        let doctor = roster
            .doctors
            .iter_mut()
            .find(|d| d.id == doctor_id)
            .ok_or_else(|| Self::not_found(doctor_id))?;

        doctor.availability = availability;
        Ok(doctor.clone())
    }

    async fn note_assigned(&self, hospital_id: Uuid, doctor_id: Uuid) -> Result<()> {
        let roster = self.roster(hospital_id);
        let mut roster = roster.write().await;

        let count = roster
            .active
            .get(&doctor_id)
            .copied()
            .ok_or_else(|| Self::not_found(doctor_id))?
            + 1;
        roster.active.insert(doctor_id, count);

        if let Some(max_active) = self.capacity {
            if count >= max_active {
                if let Some(doctor) = roster
                    .doctors
                    .iter_mut()
                    .find(|d| d.id == doctor_id && d.availability == Availability::Available)
                {
                    doctor.availability = Availability::Busy;
                    debug!("Doctor {} reached capacity, now busy", doctor_id);
                }
            }
        }
        Ok(())
    }

    async fn note_released(&self, hospital_id: Uuid, doctor_id: Uuid) -> Result<()> {
        let roster = self.roster(hospital_id);
        let mut roster = roster.write().await;

        let count = roster
            .active
            .get(&doctor_id)
            .copied()
            .ok_or_else(|| Self::not_found(doctor_id))?
            .saturating_sub(1);
        roster.active.insert(doctor_id, count);

        if let Some(max_active) = self.capacity {
            if count < max_active {
                if let Some(doctor) = roster
                    .doctors
                    .iter_mut()
                    .find(|d| d.id == doctor_id && d.availability == Availability::Busy)
                {
                    doctor.availability = Availability::Available;
                    debug!("Doctor {} below capacity, available again", doctor_id);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doctor(name: &str, department: &str) -> NewDoctor {
        NewDoctor {
            name: name.to_string(),
            department: department.to_string(),
        }
    }

    #[tokio::test]
    async fn test_auto_assign_first_available_in_roster_order() {
        let directory = InMemoryDoctorDirectory::new();
        let hospital = Uuid::new_v4();

        let first = directory
            .add(hospital, doctor("Dr. Asha Patel", "General"))
            .await
            .unwrap();
        directory
            .add(hospital, doctor("Dr. Kiran Rao", "General"))
            .await
            .unwrap();

        let assigned = directory.auto_assign(hospital, "General").await.unwrap();
        assert_eq!(assigned, Some(first.id));

        // 第一位离线后顺延到下一位
        directory
            .set_availability(hospital, first.id, Availability::Offline)
            .await
            .unwrap();
        let assigned = directory.auto_assign(hospital, "General").await.unwrap();
        assert_ne!(assigned, Some(first.id));
        assert!(assigned.is_some());
    }

    #[tokio::test]
    async fn test_auto_assign_none_when_department_uncovered() {
        let directory = InMemoryDoctorDirectory::new();
        let hospital = Uuid::new_v4();
        directory.seed_defaults(hospital).await.unwrap();

        let assigned = directory.auto_assign(hospital, "Dermatology").await.unwrap();
        assert_eq!(assigned, None);
    }

    #[tokio::test]
    async fn test_rosters_are_per_tenant() {
        let directory = InMemoryDoctorDirectory::new();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();

        let doc = directory
            .add(tenant_a, doctor("Dr. Asha Patel", "General"))
            .await
            .unwrap();

        assert!(directory.list(tenant_b, None).await.unwrap().is_empty());
        let err = directory.get(tenant_b, doc.id).await.unwrap_err();
        assert!(matches!(err, MedflowError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_capacity_mode_flips_availability() {
        let directory = InMemoryDoctorDirectory::with_capacity(2);
        let hospital = Uuid::new_v4();
        let doc = directory
            .add(hospital, doctor("Dr. Asha Patel", "General"))
            .await
            .unwrap();

        directory.note_assigned(hospital, doc.id).await.unwrap();
        let current = directory.get(hospital, doc.id).await.unwrap();
        assert_eq!(current.availability, Availability::Available);

        directory.note_assigned(hospital, doc.id).await.unwrap();
        let current = directory.get(hospital, doc.id).await.unwrap();
        assert_eq!(current.availability, Availability::Busy);

        directory.note_released(hospital, doc.id).await.unwrap();
        let current = directory.get(hospital, doc.id).await.unwrap();
        assert_eq!(current.availability, Availability::Available);
    }

    #[tokio::test]
    async fn test_counter_does_not_override_manual_offline() {
        let directory = InMemoryDoctorDirectory::with_capacity(1);
        let hospital = Uuid::new_v4();
        let doc = directory
            .add(hospital, doctor("Dr. Asha Patel", "General"))
            .await
            .unwrap();

        directory
            .set_availability(hospital, doc.id, Availability::Offline)
            .await
            .unwrap();
        directory.note_assigned(hospital, doc.id).await.unwrap();
        directory.note_released(hospital, doc.id).await.unwrap();

        let current = directory.get(hospital, doc.id).await.unwrap();
        assert_eq!(current.availability, Availability::Offline);
    }
}
