//! 看板实时通道
//!
//! WebSocket双向协议，两个方向都是`{"event": ..., "data": ...}`的JSON帧。
//! 连接先发join声明角色与医院，之后才能发起登记/移动/处方操作。
//! 移动与处方失败会收到明确的queue-error回执，而不是静默丢弃。

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use medflow_broadcast::{ConnectionId, QueueEvent};
use medflow_core::{
    MedflowError, PharmacyState, QueueStatus, RegistrationRequest, Role,
};
use medflow_queue::MoveRequest;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::server::AppState;

/// 客户端发来的事件
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Join { role: Role, hospital_id: Uuid },
    RegisterPatient(RegistrationRequest),
    #[serde(rename_all = "camelCase")]
    MovePatient {
        id: Uuid,
        #[serde(default)]
        status: Option<QueueStatus>,
        #[serde(default)]
        doctor_id: Option<Uuid>,
        #[serde(default)]
        pharmacy_state: Option<PharmacyState>,
    },
    UpdatePrescription { id: Uuid, prescription: String },
}

/// 连接会话：join之后才有租户范围
#[derive(Debug, Default)]
struct Session {
    hospital_id: Option<Uuid>,
}

/// WebSocket升级入口
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let connection_id = ConnectionId::new();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    state.subscriptions.register(connection_id, event_tx);
    debug!("Dashboard connection {} established", connection_id);

    let (mut sink, mut stream) = socket.split();
    let mut session = Session::default();

    loop {
        tokio::select! {
            outbound = event_rx.recv() => {
                match outbound {
                    Some(event) => match serde_json::to_string(&event) {
                        Ok(frame) => {
                            if sink.send(Message::Text(frame)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => error!("Failed to serialize {}: {}", event.name(), e),
                    },
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(frame))) => {
                        handle_frame(&state, connection_id, &mut session, &frame).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Connection {} socket error: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    }

    state.subscriptions.leave(connection_id);
    debug!("Dashboard connection {} closed", connection_id);
}

async fn handle_frame(
    state: &AppState,
    connection_id: ConnectionId,
    session: &mut Session,
    frame: &str,
) {
    let message: ClientMessage = match serde_json::from_str(frame) {
        Ok(message) => message,
        Err(e) => {
            debug!("Connection {} sent malformed frame: {}", connection_id, e);
            emit_error(state, connection_id, "parse", &MedflowError::Validation(
                "malformed event frame".to_string(),
            ));
            return;
        }
    };

    match message {
        ClientMessage::Join { role, hospital_id } => {
            match state.subscriptions.join(connection_id, hospital_id, role).await {
                Ok(()) => {
                    session.hospital_id = Some(hospital_id);
                    info!(
                        "Connection {} joined hospital {} as {}",
                        connection_id,
                        hospital_id,
                        role.as_str()
                    );
                }
                Err(e) => emit_error(state, connection_id, "join", &e),
            }
        }

        ClientMessage::RegisterPatient(request) => {
            let Some(hospital_id) = session.hospital_id else {
                emit_registration_error(state, connection_id, &not_joined());
                return;
            };
            match state.engine.register_patient(hospital_id, request).await {
                // 登记回执直接发给发起连接，主题扇出由引擎完成
                Ok(patient) => {
                    state
                        .router
                        .emit_to(connection_id, QueueEvent::PatientRegistered(patient));
                }
                Err(e) => emit_registration_error(state, connection_id, &e),
            }
        }

        ClientMessage::MovePatient {
            id,
            status,
            doctor_id,
            pharmacy_state,
        } => {
            let Some(hospital_id) = session.hospital_id else {
                emit_error(state, connection_id, "move-patient", &not_joined());
                return;
            };
            let request = MoveRequest {
                status,
                doctor_id,
                pharmacy_state,
            };
            if let Err(e) = state.engine.move_patient(hospital_id, id, request).await {
                emit_error(state, connection_id, "move-patient", &e);
            }
        }

        ClientMessage::UpdatePrescription { id, prescription } => {
            let Some(hospital_id) = session.hospital_id else {
                emit_error(state, connection_id, "update-prescription", &not_joined());
                return;
            };
            match state
                .engine
                .update_prescription(hospital_id, id, prescription)
                .await
            {
                Ok(patient) => {
                    state
                        .router
                        .emit_to(connection_id, QueueEvent::PrescriptionUpdated(patient));
                }
                Err(e) => emit_error(state, connection_id, "update-prescription", &e),
            }
        }
    }
}

fn not_joined() -> MedflowError {
    MedflowError::Validation("connection has not joined a hospital".to_string())
}

fn emit_error(state: &AppState, connection_id: ConnectionId, action: &str, err: &MedflowError) {
    state.router.emit_to(
        connection_id,
        QueueEvent::QueueError {
            action: action.to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
        },
    );
}

fn emit_registration_error(state: &AppState, connection_id: ConnectionId, err: &MedflowError) {
    state.router.emit_to(
        connection_id,
        QueueEvent::PatientRegistrationError {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_frame_parses() {
        let hospital = Uuid::new_v4();
        let frame = format!(
            r#"{{"event":"join","data":{{"role":"reception","hospitalId":"{hospital}"}}}}"#
        );
        let message: ClientMessage = serde_json::from_str(&frame).unwrap();
        match message {
            ClientMessage::Join { role, hospital_id } => {
                assert_eq!(role, Role::Reception);
                assert_eq!(hospital_id, hospital);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_move_frame_allows_partial_fields() {
        let id = Uuid::new_v4();
        let frame = format!(
            r#"{{"event":"move-patient","data":{{"id":"{id}","status":"with-doctor"}}}}"#
        );
        let message: ClientMessage = serde_json::from_str(&frame).unwrap();
        match message {
            ClientMessage::MovePatient {
                status,
                doctor_id,
                pharmacy_state,
                ..
            } => {
                assert_eq!(status, Some(QueueStatus::WithDoctor));
                assert_eq!(doctor_id, None);
                assert_eq!(pharmacy_state, None);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_register_frame_parses_registration_fields() {
        let frame = r#"{
            "event": "register-patient",
            "data": {
                "name": "Asha",
                "age": 30,
                "department": "General",
                "opdIpd": "OPD"
            }
        }"#;
        let message: ClientMessage = serde_json::from_str(frame).unwrap();
        match message {
            ClientMessage::RegisterPatient(request) => {
                assert_eq!(request.name, "Asha");
                assert_eq!(request.age, Some(30));
                assert_eq!(request.department.as_deref(), Some("General"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
