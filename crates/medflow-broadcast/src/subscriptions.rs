//! 订阅管理器
//!
//! 维护连接与主题的瞬态映射：连接建立时登记发送通道，join时加入
//! 租户主题和{租户, 角色}子主题，断开时从所有主题移除。不做持久化，
//! 重连后需要重新join。

use crate::events::QueueEvent;
use crate::topic::{ConnectionId, Topic};
use dashmap::DashMap;
use medflow_core::{MedflowError, Result, Role};
use medflow_store::TenantRegistry;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};
use uuid::Uuid;

/// 订阅管理器
pub struct SubscriptionManager {
    registry: Arc<TenantRegistry>,
    topics: DashMap<Topic, HashSet<ConnectionId>>,
    connections: DashMap<ConnectionId, ConnectionEntry>,
}

struct ConnectionEntry {
    sender: UnboundedSender<QueueEvent>,
    topics: Vec<Topic>,
}

impl SubscriptionManager {
    pub fn new(registry: Arc<TenantRegistry>) -> Self {
        Self {
            registry,
            topics: DashMap::new(),
            connections: DashMap::new(),
        }
    }

    /// 连接建立时登记发送通道，此时尚未加入任何主题，
    /// 但已可接收仅发往本连接的错误事件。
    pub fn register(&self, connection_id: ConnectionId, sender: UnboundedSender<QueueEvent>) {
        self.connections.insert(
            connection_id,
            ConnectionEntry {
                sender,
                topics: Vec::new(),
            },
        );
        debug!("Connection {} registered", connection_id);
    }

    /// 加入租户主题与角色子主题；租户校验失败时不产生任何订阅。
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        hospital_id: Uuid,
        role: Role,
    ) -> Result<()> {
        self.registry.validate(hospital_id).await?;

        if !self.connections.contains_key(&connection_id) {
            return Err(MedflowError::Internal(format!(
                "connection {connection_id} not registered"
            )));
        }

        let joined = [Topic::tenant(hospital_id), Topic::role(hospital_id, role)];

        // 两张表不同时持锁，避免与发布路径（主题表 -> 连接表）相互等待
        for topic in joined {
            self.topics.entry(topic).or_default().insert(connection_id);
        }
        if let Some(mut entry) = self.connections.get_mut(&connection_id) {
            for topic in joined {
                if !entry.topics.contains(&topic) {
                    entry.topics.push(topic);
                }
            }
        }

        info!(
            "Connection {} joined hospital {} as {}",
            connection_id,
            hospital_id,
            role.as_str()
        );
        Ok(())
    }

    /// 断开连接：从所有主题移除并丢弃发送通道
    pub fn leave(&self, connection_id: ConnectionId) {
        if let Some((_, entry)) = self.connections.remove(&connection_id) {
            for topic in entry.topics {
                if let Some(mut members) = self.topics.get_mut(&topic) {
                    members.remove(&connection_id);
                }
            }
            debug!("Connection {} left all topics", connection_id);
        }
    }

    /// 主题当前成员
    pub fn members_of(&self, topic: Topic) -> Vec<ConnectionId> {
        self.topics
            .get(&topic)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 取得某连接的发送通道（仅发往单个连接的事件使用）
    pub fn sender_of(&self, connection_id: ConnectionId) -> Option<UnboundedSender<QueueEvent>> {
        self.connections
            .get(&connection_id)
            .map(|entry| entry.sender.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medflow_core::NewHospital;
    use tokio::sync::mpsc;

    async fn registry_with_hospital() -> (Arc<TenantRegistry>, Uuid) {
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
        (registry, hospital.id)
    }

    #[tokio::test]
    async fn test_join_adds_tenant_and_role_topics() {
        let (registry, hospital) = registry_with_hospital().await;
        let manager = SubscriptionManager::new(registry);

        let conn = ConnectionId::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        manager.register(conn, tx);
        manager.join(conn, hospital, Role::Doctor).await.unwrap();

        assert_eq!(manager.members_of(Topic::tenant(hospital)), vec![conn]);
        assert_eq!(
            manager.members_of(Topic::role(hospital, Role::Doctor)),
            vec![conn]
        );
        assert!(manager
            .members_of(Topic::role(hospital, Role::Pharmacy))
            .is_empty());
    }

    #[tokio::test]
    async fn test_join_unknown_tenant_subscribes_nothing() {
        let registry = Arc::new(TenantRegistry::new());
        let manager = SubscriptionManager::new(registry);

        let conn = ConnectionId::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        manager.register(conn, tx);

        let hospital = Uuid::new_v4();
        let err = manager.join(conn, hospital, Role::Doctor).await.unwrap_err();
        assert!(matches!(err, MedflowError::UnknownTenant(_)));
        assert!(manager.members_of(Topic::tenant(hospital)).is_empty());
    }

    #[tokio::test]
    async fn test_leave_removes_membership() {
        let (registry, hospital) = registry_with_hospital().await;
        let manager = SubscriptionManager::new(registry);

        let conn = ConnectionId::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        manager.register(conn, tx);
        manager.join(conn, hospital, Role::Reception).await.unwrap();

        manager.leave(conn);
        assert!(manager.members_of(Topic::tenant(hospital)).is_empty());
        assert!(manager
            .members_of(Topic::role(hospital, Role::Reception))
            .is_empty());
        assert!(manager.sender_of(conn).is_none());
    }
}
