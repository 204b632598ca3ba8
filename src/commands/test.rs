//! Test command implementation.
//!
//! Runs one poll cycle against the upstream and displays the result.

use alertsite_exporter::Config;
use tokio_util::sync::CancellationToken;

use crate::cli::TestOutput;
use crate::state::build_components;

/// Runs exactly one poll cycle.
pub async fn command_test(format: TestOutput, config: &Config) -> anyhow::Result<()> {
    let components = build_components(config)?;
    let report = components
        .poller
        .run_cycle(&CancellationToken::new())
        .await;

    if let TestOutput::Exposition = format {
        print!("{}", components.snapshot.current()?.text());
        println!();
        return if report.refreshed {
            Ok(())
        } else {
            anyhow::bail!("poll cycle fetched no target data")
        };
    }

    println!("🧪 AlertSite Exporter - Test Mode");
    println!("==================================");
    println!(
        "\n🔑 Access token: {}",
        if report.token_obtained { "✅ obtained" } else { "❌ not obtained" }
    );
    if report.token_rejected {
        println!("   ⚠️  Upstream rejected the token once, refresh attempted");
    }

    println!("\n🌍 Regions:");
    for region in &report.regions_ok {
        println!("   ├─ ✅ {}", region);
    }
    for region in &report.regions_failed {
        println!("   ├─ ❌ {}", region);
    }

    println!(
        "\n   ⏱️  Cycle duration: {:.2}ms",
        report.duration.as_secs_f64() * 1000.0
    );
    println!("   📊 Targets exported: {}", report.targets);
    println!("   🚨 Unhealthy targets: {}", report.unhealthy);
    println!("   ❔ Unparseable values: {}", report.parse_failures);

    if report.refreshed {
        println!("\n✅ Test completed successfully");
        Ok(())
    } else {
        println!("\n❌ Cycle fetched no target data");
        std::process::exit(1);
    }
}
