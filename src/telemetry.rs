//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了日志与链路追踪的初始化。

use crate::config::TelemetryConfig;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// 初始化日志与 OpenTelemetry 链路追踪
///
/// 安装由 `EnvFilter`、控制台输出层和 OpenTelemetry 层组成的全局订阅者。
/// 设置了 `RUST_LOG` 时优先使用它，否则使用 `filter`。
/// 应在进程启动时调用一次；重复调用返回 false 且不做任何修改。
///
/// # 参数
///
/// * `service_name` - 上报给追踪系统的服务名称
/// * `filter` - 默认日志过滤规则，例如 `"info"` 或 `"oxdeal=debug"`
pub fn init_tracing(service_name: &str, filter: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // 未配置导出器，span 只在进程内传播
    let provider = SdkTracerProvider::builder().build();
    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer(service_name.to_string());

    let subscriber = Registry::default()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(tracing_opentelemetry::layer().with_tracer(tracer));

    tracing::subscriber::set_global_default(subscriber).is_ok()
}

/// 按配置初始化
pub fn init_from_config(config: &TelemetryConfig) -> bool {
    init_tracing(&config.service_name, &config.log_filter)
}
