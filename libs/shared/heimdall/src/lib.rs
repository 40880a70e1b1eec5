//! Shared observability: structured tracing, a bounded log buffer for
//! `GET /logs`, a panic hook that logs instead of silently crashing, and the
//! Prometheus metric registry for `GET /metrics` (C10).

mod log_buffer;
mod metrics;

pub use log_buffer::{LogEntry, LogRingBuffer};
pub use metrics::{
    ApplicationErrorLabels, DbOperationLabel, DbOperationStatusLabels, DecisionLabels,
    EntryCategoryLabel, HttpErrorLabels, HttpRequestLabels, HttpRouteLabels, Metrics, Severity,
};

use std::panic;

use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber and installs the panic hook.
///
/// Production (release builds) emits flat JSON events; development emits a
/// compact, human-readable format. `RUST_LOG` overrides the default filter,
/// which otherwise sets `service_name` to debug (debug builds) or info
/// (release builds) and quiets `tower_http`, `hyper`, and `libsql`.
///
/// The returned [`LogRingBuffer`] should be installed as a layer by the
/// caller if `GET /logs` support is needed; `init_tracing` wires the default
/// filter and formatting layers only.
pub fn init_tracing(service_name: &str) -> LogRingBuffer {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cfg!(debug_assertions) { "debug" } else { "info" };
        format!("{service_name}={level},tower_http=warn,hyper=warn,libsql=error").into()
    });

    let log_buffer = LogRingBuffer::new();

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .with(log_buffer.clone())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .with(log_buffer.clone())
            .init();
    }

    install_panic_hook(service_name);

    info!(service = service_name, "tracing initialized");
    log_buffer
}

fn install_panic_hook(service_name: &str) {
    let service_name = service_name.to_string();
    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("no panic payload");

        error!(
            target: "panic",
            service = %service_name,
            location = %location,
            "thread panicked: {payload}"
        );
    }));
}
