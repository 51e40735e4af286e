//! 排队状态机
//!
//! 管理患者排队状态的完整生命周期转换

use medflow_core::{MedflowError, QueueStatus, Result};
use std::collections::HashSet;

/// 排队状态机
#[derive(Debug)]
pub struct QueueStateMachine {
    transitions: HashSet<(QueueStatus, QueueStatus)>,
}

impl QueueStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        use QueueStatus::*;

        let mut transitions = HashSet::new();

        // 定义状态转换规则
        transitions.insert((Waiting, WithDoctor));
        transitions.insert((Waiting, Pharmacy));
        transitions.insert((Waiting, Cancelled));
        transitions.insert((WithDoctor, Pharmacy));
        transitions.insert((WithDoctor, Completed));
        transitions.insert((WithDoctor, Cancelled));
        transitions.insert((Pharmacy, Completed));
        transitions.insert((Pharmacy, Cancelled));
        // completed与cancelled为终态，无出边

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: QueueStatus, to: QueueStatus) -> bool {
        self.transitions.contains(&(from, to))
    }

    /// 执行状态转换
    pub fn transition(&self, from: QueueStatus, to: QueueStatus) -> Result<QueueStatus> {
        if self.can_transition(from, to) {
            Ok(to)
        } else {
            Err(MedflowError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    /// 获取某状态的所有可达目标状态
    pub fn allowed_targets(&self, from: QueueStatus) -> Vec<QueueStatus> {
        self.transitions
            .iter()
            .filter(|(source, _)| *source == from)
            .map(|(_, target)| *target)
            .collect()
    }
}

impl Default for QueueStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
