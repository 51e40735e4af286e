//! 服务配置
//!
//! 默认值 < 配置文件 < MEDFLOW_前缀环境变量，逐层覆盖。

use config::{Config, Environment, File};
use medflow_core::{MedflowError, Result};
use serde::Deserialize;

/// MedFlow服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 单个持久化操作的时限（秒）
    pub request_timeout_secs: u64,
    /// 医生接诊上限，缺省不启用容量模式
    #[serde(default)]
    pub doctor_capacity: Option<u32>,
    /// 启动时创建演示租户
    pub seed_demo: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_secs: 5,
            doctor_capacity: None,
            seed_demo: false,
        }
    }
}

impl ServerConfig {
    /// 从可选配置文件与环境变量加载
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default("host", defaults.host.clone())
            .and_then(|b| b.set_default("port", i64::from(defaults.port)))
            .and_then(|b| b.set_default("request_timeout_secs", defaults.request_timeout_secs as i64))
            .and_then(|b| b.set_default("seed_demo", defaults.seed_demo))
            .map_err(|e| MedflowError::Config(e.to_string()))?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix("MEDFLOW").try_parsing(true))
            .build()
            .map_err(|e| MedflowError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| MedflowError::Config(e.to_string()))
    }
}
