//! Classify command implementation.
//!
//! Reads one process and prints the configured classifier's verdict, the
//! same text a `Started` event for it would carry.

use anyhow::{bail, Context};

use crate::classifier::{build_classifier, Classifier, ProcessDetails};
use crate::config::Config;
use crate::events::EnrichmentOutcome;
use crate::process::{ProcSampler, Sampler};

pub async fn command_classify(pid: u32, config: &Config) -> anyhow::Result<()> {
    let sampler = ProcSampler::new(config.proc_root(), config.sample_concurrency());
    let set = sampler
        .sample()
        .await
        .with_context(|| format!("sampling {}", sampler.root().display()))?;
    let Some(process) = set.get(&pid) else {
        bail!("no process with PID {} under {}", pid, sampler.root().display());
    };

    let classifier = build_classifier(&config.classifier).context("building classifier")?;
    let details = ProcessDetails::from(process);

    println!("🔍 {} (PID: {})", process.name, process.pid);
    println!("   Command: {}", process.command);
    println!("   Classifier: {}", classifier.name());

    let outcome = match classifier.classify(&details).await {
        Ok(verdict) => EnrichmentOutcome::Assessed {
            description: verdict.description,
            suspicious: verdict.malicious,
        },
        Err(e) => {
            eprintln!("⚠️  Classifier failed: {}", e);
            EnrichmentOutcome::Unavailable
        }
    };
    println!("   {}", outcome.event_description());

    Ok(())
}
