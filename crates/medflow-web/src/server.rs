//! Web服务器

use axum::{
    routing::{get, post, put},
    Router,
};
use medflow_broadcast::{BroadcastRouter, SubscriptionManager};
use medflow_core::Result;
use medflow_queue::{DoctorDirectory, QueueEngine};
use medflow_store::TenantRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::{
    api_root, get_departments, get_doctors, get_patient, get_patients, get_prescriptions, health,
    list_hospitals, login_hospital, queue_stats, reassign_doctor, register_hospital,
    register_patient, renew_hospital,
};
use crate::socket::ws_handler;

/// 各处理器共享的应用状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueueEngine>,
    pub registry: Arc<TenantRegistry>,
    pub directory: Arc<dyn DoctorDirectory>,
    pub subscriptions: Arc<SubscriptionManager>,
    pub router: Arc<BroadcastRouter>,
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        let app = Self::create_app(state);
        Self { addr, app }
    }

    fn create_app(state: AppState) -> Router {
        Router::new()
            // 根路径
            .route("/", get(api_root))

            // 健康检查
            .route("/health", get(health))

            // 看板实时通道
            .route("/ws", get(ws_handler))

            // API路由
            .nest("/api", api_routes())

            // 全局中间件
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(
                        CorsLayer::new()
                            .allow_origin(Any)
                            .allow_methods(Any)
                            .allow_headers(Any),
                    ),
            )
            .with_state(state)
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app).await?;

        Ok(())
    }
}

/// API 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/hospitals", get(list_hospitals).post(register_hospital))
        .route("/hospitals/:id/login", post(login_hospital))
        .route("/hospitals/:id/renew", post(renew_hospital))
        .route("/patients", get(get_patients).post(register_patient))
        .route("/patients/:id", get(get_patient))
        .route("/patients/:id/doctor", put(reassign_doctor))
        .route("/prescriptions", get(get_prescriptions))
        .route("/departments", get(get_departments))
        .route("/doctors", get(get_doctors))
        .route("/queue/stats", get(queue_stats))
}
