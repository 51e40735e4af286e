//! HTTP处理器
//!
//! 认证是外部协作组件，这里的租户范围通过显式的hospitalId参数传入。

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use medflow_core::{
    Hospital, MedflowError, NewHospital, Patient, PatientFilter, RegistrationRequest,
};
use medflow_queue::DEFAULT_ROSTER;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::server::AppState;

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "MedFlow Queue API",
        "version": "1.0.0",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "api": "/api",
            "realtime": "/ws"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": "1.0.0"
    }))
}

/// 错误包装：把统一错误映射为结构化HTTP响应
pub struct ApiError(MedflowError);

impl From<MedflowError> for ApiError {
    fn from(err: MedflowError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MedflowError::UnknownTenant(_) | MedflowError::SubscriptionInactive(_) => {
                StatusCode::FORBIDDEN
            }
            MedflowError::NotFound(_) => StatusCode::NOT_FOUND,
            MedflowError::Validation(_) => StatusCode::BAD_REQUEST,
            MedflowError::InvalidTransition { .. } | MedflowError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            MedflowError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": true,
            "code": self.0.code(),
            "message": self.0.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// 租户范围查询参数
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantQuery {
    pub hospital_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientsQuery {
    pub hospital_id: Uuid,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorsQuery {
    pub hospital_id: Uuid,
    pub dept: Option<String>,
}

/// 注册新医院并播种默认名册
pub async fn register_hospital(
    State(state): State<AppState>,
    Json(body): Json<NewHospital>,
) -> ApiResult<Json<Hospital>> {
    let hospital = state.registry.register(body).await?;

    for (name, department) in DEFAULT_ROSTER {
        state
            .directory
            .add(
                hospital.id,
                medflow_queue::NewDoctor {
                    name: name.to_string(),
                    department: department.to_string(),
                },
            )
            .await?;
    }

    info!("Hospital {} onboarded with default roster", hospital.id);
    Ok(Json(hospital))
}

/// 订阅有效的医院列表（登录下拉框数据源）
pub async fn list_hospitals(State(state): State<AppState>) -> ApiResult<Json<Vec<Hospital>>> {
    Ok(Json(state.registry.list_active().await))
}

#[derive(Debug, Deserialize)]
pub struct RenewBody {
    #[serde(default = "default_renew_days")]
    pub days: i64,
}

fn default_renew_days() -> i64 {
    30
}

/// 续费
pub async fn renew_hospital(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RenewBody>,
) -> ApiResult<Json<Hospital>> {
    Ok(Json(state.registry.renew(id, body.days).await?))
}

/// 登录打点：凭证校验由外部认证组件完成，这里只确认订阅有效
/// 并记录登录时间
pub async fn login_hospital(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Hospital>> {
    let hospital = state.registry.validate(id).await?;
    state.registry.record_login(id).await?;
    Ok(Json(hospital))
}

/// 患者列表，可按电话精确过滤
pub async fn get_patients(
    State(state): State<AppState>,
    Query(query): Query<PatientsQuery>,
) -> ApiResult<Json<Vec<Patient>>> {
    let patients = state
        .engine
        .list_patients(
            query.hospital_id,
            PatientFilter { phone: query.phone },
        )
        .await?;
    Ok(Json(patients))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPatientBody {
    pub hospital_id: Uuid,
    #[serde(flatten)]
    pub registration: RegistrationRequest,
}

/// 通过REST登记患者（随诊报告先由外部上传组件保存，这里接收引用）
pub async fn register_patient(
    State(state): State<AppState>,
    Json(body): Json<RegisterPatientBody>,
) -> ApiResult<Json<Patient>> {
    let patient = state
        .engine
        .register_patient(body.hospital_id, body.registration)
        .await?;
    Ok(Json(patient))
}

/// 按id读取患者
pub async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(state.engine.get_patient(query.hospital_id, id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignBody {
    pub doctor_id: Uuid,
}

/// 显式改派医生
pub async fn reassign_doctor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<TenantQuery>,
    Json(body): Json<ReassignBody>,
) -> ApiResult<Json<Patient>> {
    let patient = state
        .engine
        .reassign_doctor(query.hospital_id, id, body.doctor_id)
        .await?;
    Ok(Json(patient))
}

/// 处方流转中的患者
pub async fn get_prescriptions(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<Vec<Patient>>> {
    Ok(Json(
        state.engine.list_prescriptions(query.hospital_id).await?,
    ))
}

/// 科室列表（静态数据）
pub async fn get_departments(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.list_departments())
}

/// 租户名册，可按科室过滤
pub async fn get_doctors(
    State(state): State<AppState>,
    Query(query): Query<DoctorsQuery>,
) -> ApiResult<Json<Vec<medflow_core::Doctor>>> {
    let doctors = state
        .engine
        .list_doctors(query.hospital_id, query.dept.as_deref())
        .await?;
    Ok(Json(doctors))
}

/// 租户队列统计
pub async fn queue_stats(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<medflow_queue::QueueStats>> {
    Ok(Json(state.engine.queue_stats(query.hospital_id).await?))
}
