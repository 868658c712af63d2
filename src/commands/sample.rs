//! Sample command implementation.
//!
//! Takes one sample of the process table and prints it.

use anyhow::Context;
use std::time::Instant;

use crate::config::Config;
use crate::process::{ProcSampler, ProcessSnapshot, Sampler};

/// Samples once and prints the busiest `limit` processes.
pub async fn command_sample(limit: usize, verbose: bool, config: &Config) -> anyhow::Result<()> {
    println!("🧪 Herakles Process Watch - Sample Mode");
    println!("========================================");

    let sampler = ProcSampler::new(config.proc_root(), config.sample_concurrency());
    let start = Instant::now();
    let set = sampler
        .sample()
        .await
        .with_context(|| format!("sampling {}", sampler.root().display()))?;
    let elapsed = start.elapsed();

    let mut processes: Vec<&ProcessSnapshot> = set.values().collect();
    processes.sort_by(|a, b| {
        b.cpu_percent
            .total_cmp(&a.cpu_percent)
            .then_with(|| a.pid.cmp(&b.pid))
    });

    println!(
        "   📁 Sampled {} processes in {:.2} ms (concurrency {})",
        set.len(),
        elapsed.as_secs_f64() * 1000.0,
        sampler.concurrency()
    );
    println!();

    for p in processes.iter().take(limit) {
        println!("   ├─ {} (PID: {})  CPU: {:.2}%", p.name, p.pid, p.cpu_percent);
        if verbose {
            println!("   │  ├─ Status: {}", p.status);
            println!("   │  ├─ Memory: {:.2}%", p.memory_percent);
            println!("   │  └─ Command: {}", p.command);
        }
    }
    if processes.len() > limit {
        println!("   └─ ... {} more", processes.len() - limit);
    }

    Ok(())
}
