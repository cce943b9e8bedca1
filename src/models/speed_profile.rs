//! 速度档位
//!
//! 一个档位就是一组超时、间隔与并发参数，在吞吐量与被站点识别的风险之间取舍。
//! 每次运行只选择一次，选定后不再变化。

use std::time::Duration;

use phf::phf_map;
use serde::Serialize;

use crate::error::ConfigError;

/// 速度档位参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeedProfile {
    pub name: String,
    /// 页面加载超时
    pub page_load_timeout: Duration,
    /// 网络空闲等待超时
    pub network_idle_timeout: Duration,
    /// 等待测验内容渲染的超时
    pub quiz_wait_timeout: Duration,
    /// 同一任务两次请求之间的最小间隔
    pub min_delay: Duration,
    /// 随机抖动后的最大间隔
    pub max_delay: Duration,
    /// 所有任务合计的每分钟请求上限
    pub requests_per_minute: u32,
    /// 默认并发任务数
    pub default_concurrency: usize,
}

/// 档位模板（毫秒）
struct ProfileTemplate {
    page_load_ms: u64,
    network_idle_ms: u64,
    quiz_wait_ms: u64,
    min_delay_ms: u64,
    max_delay_ms: u64,
    requests_per_minute: u32,
    default_concurrency: usize,
}

static PROFILES: phf::Map<&'static str, ProfileTemplate> = phf_map! {
    "normal" => ProfileTemplate {
        page_load_ms: 30_000,
        network_idle_ms: 10_000,
        quiz_wait_ms: 10_000,
        min_delay_ms: 2_000,
        max_delay_ms: 5_000,
        requests_per_minute: 30,
        default_concurrency: 2,
    },
    "fast" => ProfileTemplate {
        page_load_ms: 20_000,
        network_idle_ms: 5_000,
        quiz_wait_ms: 6_000,
        min_delay_ms: 1_000,
        max_delay_ms: 3_000,
        requests_per_minute: 60,
        default_concurrency: 4,
    },
    "aggressive" => ProfileTemplate {
        page_load_ms: 15_000,
        network_idle_ms: 3_000,
        quiz_wait_ms: 4_000,
        min_delay_ms: 500,
        max_delay_ms: 1_500,
        requests_per_minute: 120,
        default_concurrency: 8,
    },
};

/// 用户显式指定的数值，优先于档位默认值
#[derive(Debug, Clone, Default)]
pub struct ProfileOverrides {
    pub concurrency: Option<usize>,
    pub requests_per_minute: Option<u32>,
    pub min_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub page_load_timeout: Option<Duration>,
}

impl SpeedProfile {
    /// 所有可用档位名称
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = PROFILES.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// 按名称解析档位，并应用覆盖值
    ///
    /// 每个覆盖值只替换对应的一个字段，其余字段保持档位默认值。
    pub fn resolve(name: &str, overrides: &ProfileOverrides) -> Result<Self, ConfigError> {
        let template = PROFILES
            .get(name)
            .ok_or_else(|| ConfigError::UnknownSpeedProfile {
                name: name.to_string(),
            })?;

        let profile = Self {
            name: name.to_string(),
            page_load_timeout: overrides
                .page_load_timeout
                .unwrap_or(Duration::from_millis(template.page_load_ms)),
            network_idle_timeout: Duration::from_millis(template.network_idle_ms),
            quiz_wait_timeout: Duration::from_millis(template.quiz_wait_ms),
            min_delay: overrides
                .min_delay
                .unwrap_or(Duration::from_millis(template.min_delay_ms)),
            max_delay: overrides
                .max_delay
                .unwrap_or(Duration::from_millis(template.max_delay_ms)),
            requests_per_minute: overrides
                .requests_per_minute
                .unwrap_or(template.requests_per_minute),
            default_concurrency: overrides.concurrency.unwrap_or(template.default_concurrency),
        };

        profile.validate()?;
        Ok(profile)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_delay > self.max_delay {
            return Err(ConfigError::invalid(
                "min_delay",
                format!("{:?} 大于 max_delay {:?}", self.min_delay, self.max_delay),
            ));
        }
        if self.requests_per_minute == 0 {
            return Err(ConfigError::invalid("requests_per_minute", "必须 >= 1"));
        }
        if self.default_concurrency == 0 {
            return Err(ConfigError::invalid("concurrency", "必须 >= 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_named_profile() {
        for name in ["normal", "fast", "aggressive"] {
            let profile = SpeedProfile::resolve(name, &ProfileOverrides::default()).unwrap();
            assert_eq!(profile.name, name);
            assert!(profile.min_delay <= profile.max_delay);
        }
        assert_eq!(SpeedProfile::names(), vec!["aggressive", "fast", "normal"]);
    }

    #[test]
    fn unknown_profile_is_config_error() {
        let err = SpeedProfile::resolve("turbo", &ProfileOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSpeedProfile { ref name } if name == "turbo"));
    }

    #[test]
    fn override_replaces_only_its_field() {
        let base = SpeedProfile::resolve("fast", &ProfileOverrides::default()).unwrap();
        let overrides = ProfileOverrides {
            concurrency: Some(11),
            ..Default::default()
        };
        let custom = SpeedProfile::resolve("fast", &overrides).unwrap();

        assert_eq!(custom.default_concurrency, 11);
        assert_eq!(custom.requests_per_minute, base.requests_per_minute);
        assert_eq!(custom.min_delay, base.min_delay);
        assert_eq!(custom.page_load_timeout, base.page_load_timeout);
    }

    #[test]
    fn rejects_inverted_delays() {
        let overrides = ProfileOverrides {
            min_delay: Some(Duration::from_secs(10)),
            ..Default::default()
        };
        assert!(SpeedProfile::resolve("normal", &overrides).is_err());
    }
}
