//! 广播路由器
//!
//! 把类型化事件投递给主题的当前成员。投递失败只影响该连接
//! （连接随即被清理），不会中断对其他成员的投递。

use crate::events::QueueEvent;
use crate::subscriptions::SubscriptionManager;
use crate::topic::{ConnectionId, Topic};
use std::sync::Arc;
use tracing::debug;

/// 广播路由器
pub struct BroadcastRouter {
    subscriptions: Arc<SubscriptionManager>,
}

impl BroadcastRouter {
    pub fn new(subscriptions: Arc<SubscriptionManager>) -> Self {
        Self { subscriptions }
    }

    /// 向主题所有成员投递事件，返回成功投递的连接数
    pub fn publish(&self, topic: Topic, event: &QueueEvent) -> usize {
        let members = self.subscriptions.members_of(topic);
        let mut delivered = 0;

        for connection_id in members {
            if self.emit_to(connection_id, event.clone()) {
                delivered += 1;
            }
        }

        debug!(
            "Published {} to {} ({} delivered)",
            event.name(),
            topic,
            delivered
        );
        delivered
    }

    /// 向多个主题投递同一事件
    pub fn publish_all(&self, topics: &[Topic], event: &QueueEvent) {
        for topic in topics {
            self.publish(*topic, event);
        }
    }

    /// 仅向单个连接投递（登记回执、错误事件）。
    /// 通道已关闭时清理该连接并返回false。
    pub fn emit_to(&self, connection_id: ConnectionId, event: QueueEvent) -> bool {
        match self.subscriptions.sender_of(connection_id) {
            Some(sender) => {
                if sender.send(event).is_err() {
                    debug!("Dropping dead connection {}", connection_id);
                    self.subscriptions.leave(connection_id);
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medflow_core::{NewHospital, Role};
    use medflow_store::TenantRegistry;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    async fn setup() -> (Arc<SubscriptionManager>, BroadcastRouter, Uuid) {
        let registry = Arc::new(TenantRegistry::new());
        let hospital = registry
            .register(NewHospital {
                name: "City Care".to_string(),
                email: "admin@citycare.in".to_string(),
                phone: None,
                address: None,
            })
            .await
            .unwrap();
        let subscriptions = Arc::new(SubscriptionManager::new(registry));
        let router = BroadcastRouter::new(subscriptions.clone());
        (subscriptions, router, hospital.id)
    }

    fn error_event() -> QueueEvent {
        QueueEvent::QueueError {
            action: "move-patient".to_string(),
            code: "NOT_FOUND".to_string(),
            message: "patient not found".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_topic_members_only() {
        let (subscriptions, router, hospital) = setup().await;

        let doctor_conn = ConnectionId::new();
        let (doctor_tx, mut doctor_rx) = mpsc::unbounded_channel();
        subscriptions.register(doctor_conn, doctor_tx);
        subscriptions
            .join(doctor_conn, hospital, Role::Doctor)
            .await
            .unwrap();

        let pharmacy_conn = ConnectionId::new();
        let (pharmacy_tx, mut pharmacy_rx) = mpsc::unbounded_channel();
        subscriptions.register(pharmacy_conn, pharmacy_tx);
        subscriptions
            .join(pharmacy_conn, hospital, Role::Pharmacy)
            .await
            .unwrap();

        let delivered = router.publish(Topic::role(hospital, Role::Doctor), &error_event());
        assert_eq!(delivered, 1);
        assert!(doctor_rx.try_recv().is_ok());
        assert!(pharmacy_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dead_connection_is_pruned() {
        let (subscriptions, router, hospital) = setup().await;

        let conn = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        subscriptions.register(conn, tx);
        subscriptions.join(conn, hospital, Role::Doctor).await.unwrap();
        drop(rx);

        let delivered = router.publish(Topic::tenant(hospital), &error_event());
        assert_eq!(delivered, 0);
        assert_eq!(subscriptions.connection_count(), 0);
    }
}
