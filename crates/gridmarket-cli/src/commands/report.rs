//! Human-readable report formatting.

use gridmarket_clearing::{PeriodReport, UnsatisfiedReason};
use gridmarket_core::MarketConfig;
use gridmarket_pricing::PriceList;

fn price(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.4}")
    } else {
        "closed".to_string()
    }
}

fn reason(reason: UnsatisfiedReason) -> &'static str {
    match reason {
        UnsatisfiedReason::CapacityExhausted => "capacity exhausted",
        UnsatisfiedReason::MarketClosed => "market closed",
        UnsatisfiedReason::UnknownCluster => "unknown cluster",
    }
}

pub fn format_market(config: &MarketConfig) -> String {
    let gpm = config.gpus_per_machine();
    let mut out = String::new();

    out.push_str(&format!(
        "Market: {} clusters, {gpm} GPUs per machine\n\n",
        config.clusters.len()
    ));
    out.push_str(&format!(
        "  {:<16} {:>8} {:>10} {:>6} {:>10}\n",
        "CLUSTER", "MACHINES", "GUARANTEED", "SPOT", "SPOT GPUS"
    ));
    for c in &config.clusters {
        out.push_str(&format!(
            "  {:<16} {:>8} {:>10} {:>6} {:>10}\n",
            c.id,
            c.total_machines,
            c.guaranteed_machines,
            c.spot_machines(),
            c.spot_supply_gpus(gpm)
        ));
    }

    out.push_str("\nShapes:\n");
    for s in config.shapes.iter() {
        out.push_str(&format!("  • {} ({} GPU)\n", s.name, s.gpus));
    }
    out
}

pub fn format_prices(prices: &PriceList) -> String {
    let mut out = String::new();
    out.push_str(&format!("  {:<16} {:>12} {:>12}\n", "CLUSTER", "GUARANTEED", "SPOT"));
    for p in prices.iter() {
        out.push_str(&format!(
            "  {:<16} {:>12} {:>12}\n",
            p.cluster,
            price(p.guaranteed),
            price(p.spot)
        ));
    }
    out
}

pub fn format_period(report: &PeriodReport) -> String {
    let plan = &report.allocation_plan;
    let mut out = String::new();

    out.push_str("\n╔══════════════════════════════════════════╗\n");
    out.push_str(&format!("║  Period {:<33}║\n", report.period));
    out.push_str(&format!("║  Placed:     {:<28}║\n", plan.satisfied_instances()));
    out.push_str(&format!("║  Not placed: {:<28}║\n", plan.unsatisfied_instances()));
    out.push_str("╚══════════════════════════════════════════╝\n\n");

    out.push_str("Prices:\n");
    out.push_str(&format_prices(&report.price_list));
    out.push('\n');

    if !plan.satisfied_demand.is_empty() {
        out.push_str("✅ SATISFIED:\n\n");
        for e in &plan.satisfied_demand.pinned {
            out.push_str(&format!(
                "  #{} pinned {} × {} on {} ({}/{})\n",
                e.id, e.satisfied_quantity, e.shape, e.cluster, e.satisfied_quantity, e.requested_quantity
            ));
        }
        for e in &plan.satisfied_demand.floating {
            let spread: Vec<String> = e
                .allocations
                .iter()
                .map(|(cluster, n)| format!("{cluster}={n}"))
                .collect();
            out.push_str(&format!(
                "  #{} floating {} × {} → {} ({}/{})\n",
                e.id,
                e.satisfied_quantity,
                e.shape,
                spread.join(", "),
                e.satisfied_quantity,
                e.requested_quantity
            ));
        }
        out.push('\n');
    }

    if !plan.unsatisfied_demand.is_empty() {
        out.push_str("❌ UNSATISFIED:\n\n");
        for e in &plan.unsatisfied_demand.pinned {
            out.push_str(&format!(
                "  #{} pinned {} × {} on {}: {}\n",
                e.id,
                e.unsatisfied_quantity,
                e.shape,
                e.cluster,
                reason(e.reason)
            ));
        }
        for e in &plan.unsatisfied_demand.floating {
            out.push_str(&format!(
                "  #{} floating {} × {}: {}\n",
                e.id,
                e.unsatisfied_quantity,
                e.shape,
                reason(e.reason)
            ));
        }
        out.push('\n');
    }

    out.push_str("Clusters:\n");
    out.push_str(&format!(
        "  {:<16} {:>6} {:>8} {:>8} {:>6} {:>6}\n",
        "CLUSTER", "SUPPLY", "PINNED", "FLOATING", "USED", "FREE"
    ));
    for c in &report.clusters {
        out.push_str(&format!(
            "  {:<16} {:>6} {:>8} {:>8} {:>6} {:>6}\n",
            c.cluster, c.spot_supply_gpus, c.pinned_gpus, c.floating_gpus, c.used_gpus, c.free_gpus
        ));
    }

    let running: Vec<String> = report
        .capacity
        .iter()
        .filter(|u| !u.jobs_by_shape.is_empty())
        .map(|u| {
            let jobs: Vec<String> = u
                .jobs_by_shape
                .iter()
                .map(|(shape, n)| format!("{n} {shape}"))
                .collect();
            format!("  • {}: {}\n", u.cluster, jobs.join(", "))
        })
        .collect();
    if !running.is_empty() {
        out.push_str("\nRunning jobs:\n");
        for line in running {
            out.push_str(&line);
        }
    }

    out
}
