//! 类型化广播主题
//!
//! 一个连接在join后同时加入租户主题与{租户, 角色}子主题。

use medflow_core::Role;
use std::fmt;
use uuid::Uuid;

/// 连接标识，每个接入的看板连接唯一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 广播主题键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Topic {
    pub hospital_id: Uuid,
    pub role: Option<Role>,
}

impl Topic {
    /// 租户全体连接的主题
    pub fn tenant(hospital_id: Uuid) -> Self {
        Self {
            hospital_id,
            role: None,
        }
    }

    /// 租户内某一角色的子主题
    pub fn role(hospital_id: Uuid, role: Role) -> Self {
        Self {
            hospital_id,
            role: Some(role),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Some(role) => write!(f, "hospital-{}-{}", self.hospital_id, role.as_str()),
            None => write!(f, "hospital-{}", self.hospital_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_keys_are_distinct() {
        let hospital = Uuid::new_v4();
        assert_ne!(Topic::tenant(hospital), Topic::role(hospital, Role::Doctor));
        assert_ne!(
            Topic::role(hospital, Role::Doctor),
            Topic::role(hospital, Role::Pharmacy)
        );
        assert_ne!(Topic::tenant(hospital), Topic::tenant(Uuid::new_v4()));
    }
}
