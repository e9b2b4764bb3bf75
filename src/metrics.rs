// Prometheus metrics for the vault gateway
//
// Exposes metrics on the /metrics HTTP endpoint:
// - Commands executed, by outcome (counter)
// - Command durations (histogram)
// - Tree renders, by outcome (counter)
// - MCP tool calls, by tool (counter)
// - Process uptime (gauge)

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, Gauge, Histogram, Registry, TextEncoder};
use std::sync::{Arc, Once};
use std::time::Duration;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Gateway metrics
    pub static ref COMMANDS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("vault_commands_total", "Total number of commands handled by the gateway"),
        &["outcome"]
    ).expect("Failed to create commands total metric");

    pub static ref COMMAND_DURATION_SECONDS: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new("vault_command_duration_seconds", "Gateway call duration in seconds"),
    ).expect("Failed to create command duration metric");

    // Tree metrics
    pub static ref TREE_RENDERS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("vault_tree_renders_total", "Total number of tree renders"),
        &["outcome"]
    ).expect("Failed to create tree renders metric");

    // MCP metrics
    pub static ref MCP_TOOL_CALLS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("mcp_tool_calls_total", "Total number of MCP tool calls"),
        &["tool_name"]
    ).expect("Failed to create MCP tool calls metric");

    pub static ref UPTIME_SECONDS: Gauge = Gauge::new(
        "vaultgate_uptime_seconds",
        "Server uptime in seconds"
    ).expect("Failed to create uptime metric");
}

static INIT: Once = Once::new();

/// Register all metrics with the registry; later calls are no-ops
pub fn init() -> prometheus::Result<()> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = register_all();
    });
    result
}

fn register_all() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(COMMANDS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(COMMAND_DURATION_SECONDS.clone()))?;
    REGISTRY.register(Box::new(TREE_RENDERS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MCP_TOOL_CALLS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UPTIME_SECONDS.clone()))?;
    Ok(())
}

pub fn record_command(outcome: &str, elapsed: Duration) {
    COMMANDS_TOTAL.with_label_values(&[outcome]).inc();
    COMMAND_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}

pub fn record_tree(outcome: &str) {
    TREE_RENDERS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_tool_call(tool: &str) {
    MCP_TOOL_CALLS_TOTAL.with_label_values(&[tool]).inc();
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init().is_ok());
        assert!(init().is_ok());
    }

    #[test]
    fn test_command_metrics_exported() {
        init().unwrap();
        record_command("success", Duration::from_millis(20));
        record_tree("success");
        record_tool_call("execute_bash");

        let text = gather_metrics().unwrap();
        assert!(text.contains("vault_commands_total"));
        assert!(text.contains("vault_tree_renders_total"));
        assert!(text.contains("mcp_tool_calls_total"));
    }
}
