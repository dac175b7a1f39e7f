use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, IntCounterVec};

pub static DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "servegate_decisions_total",
        "Serve decisions by outcome and deciding check",
        &["kind", "check"]
    )
        .expect("register servegate_decisions_total")
});

pub static EXEC_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "servegate_exec_runs_total",
        "Verification script runs by result",
        &["result"]
    )
        .expect("register servegate_exec_runs_total")
});

pub static ROUTE_RELOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "servegate_route_reloads_total",
        "Routes file reload attempts",
        &["result"]
    )
        .expect("register servegate_route_reloads_total")
});

#[inline]
pub fn inc_decision(kind: &str, check: &str) {
    DECISIONS_TOTAL.with_label_values(&[kind, check]).inc();
}

#[inline]
pub fn inc_exec(result: &str) {
    EXEC_RUNS_TOTAL.with_label_values(&[result]).inc();
}

#[inline]
pub fn inc_route_reload(result: &str) {
    ROUTE_RELOADS_TOTAL.with_label_values(&[result]).inc();
}
