//! 配置系统
//! 从默认值和环境变量加载所有配置（前缀 CAMPUS_）

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty, compact
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// 停用单元时是否连同整个子树一起退出权限解析
    pub cascade_deactivation: bool,
    /// 启动时是否安装内置系统角色
    pub seed_system_roles: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// 是否启动后台过期扫描任务
    pub enabled: bool,
    /// 扫描间隔（秒）
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// 未指定时的默认分页大小
    pub default_page_size: usize,
    /// 允许的最大分页大小
    pub max_page_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// 是否缓存有效权限集
    pub cache_enabled: bool,
    /// 缓存条目上限，达到后整体清空
    pub max_cache_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub directory: DirectoryConfig,
    pub sweep: SweepConfig,
    pub search: SearchConfig,
    pub resolver: ResolverConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("directory.cascade_deactivation", true)?
            .set_default("directory.seed_system_roles", true)?
            .set_default("sweep.enabled", true)?
            .set_default("sweep.interval_secs", 300)?
            .set_default("search.default_page_size", 20)?
            .set_default("search.max_page_size", 100)?
            .set_default("resolver.cache_enabled", true)?
            .set_default("resolver.max_cache_entries", 10_000)?;

        // 从环境变量加载配置（前缀为 CAMPUS_）
        settings = settings.add_source(
            Environment::with_prefix("CAMPUS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty, compact",
                    self.logging.format
                )))
            }
        }

        if self.search.default_page_size == 0 {
            return Err(ConfigError::Message(
                "search.default_page_size must be >= 1".to_string(),
            ));
        }

        if self.search.max_page_size < self.search.default_page_size {
            return Err(ConfigError::Message(
                "search.max_page_size must be >= search.default_page_size".to_string(),
            ));
        }

        if self.resolver.cache_enabled && self.resolver.max_cache_entries == 0 {
            return Err(ConfigError::Message(
                "resolver.max_cache_entries must be >= 1 when the cache is enabled".to_string(),
            ));
        }

        if self.sweep.interval_secs == 0 || self.sweep.interval_secs > 86_400 {
            return Err(ConfigError::Message(
                "sweep.interval_secs must be between 1 and 86400".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:3000".to_string(),
                graceful_shutdown_timeout_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
            directory: DirectoryConfig {
                cascade_deactivation: true,
                seed_system_roles: true,
            },
            sweep: SweepConfig {
                enabled: true,
                interval_secs: 300,
            },
            search: SearchConfig {
                default_page_size: 20,
                max_page_size: 100,
            },
            resolver: ResolverConfig {
                cache_enabled: true,
                max_cache_entries: 10_000,
            },
        }
    }
}
