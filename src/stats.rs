//! Load-balance statistics collection for `--stats` output.
//!
//! Created when `--stats` is passed, threaded as `Option<&mut BalanceStats>`.
//! Zero cost when `None`.

/// Collects repartition counters and per-step imbalance figures.
#[derive(Debug, Default)]
pub struct BalanceStats {
    pub attempted: u32,
    pub accepted: u32,
    pub rejected: u32,
    imbalance_history: Vec<f64>,
}

impl BalanceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&mut self, accepted: bool) {
        self.attempted += 1;
        if accepted {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
    }

    /// Record the imbalance of the current step from the per-rank loads.
    pub fn record_loads(&mut self, loads: &[f64]) {
        self.imbalance_history.push(imbalance(loads));
    }

    /// Print the stats table to stderr.
    pub fn display(&self) {
        eprintln!();
        eprintln!("=== Cellflow Balance Stats ===");
        eprintln!("  Repartitions:   attempted={}  accepted={}  rejected={}",
            self.attempted, self.accepted, self.rejected);
        if let (Some(first), Some(last)) =
            (self.imbalance_history.first(), self.imbalance_history.last())
        {
            eprintln!("  Imbalance:      initial={first:.3}  final={last:.3}");
            let steps: Vec<String> = self
                .imbalance_history
                .iter()
                .map(|i| format!("{i:.3}"))
                .collect();
            eprintln!("    Per step:     {}", steps.join(" / "));
        }
    }
}

/// Maximum over mean of the per-rank loads; 1.0 is perfectly balanced.
pub fn imbalance(loads: &[f64]) -> f64 {
    if loads.is_empty() {
        return 1.0;
    }
    let max = loads.iter().cloned().fold(f64::MIN, f64::max);
    let mean = loads.iter().sum::<f64>() / loads.len() as f64;
    if mean > 0.0 {
        max / mean
    } else {
        1.0
    }
}
