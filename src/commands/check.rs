//! Check command implementation.
//!
//! Validates configuration and, optionally, upstream authentication.

use alertsite_exporter::config::validate_effective_config;
use alertsite_exporter::Config;

use crate::state::build_components;

/// Validates configuration and reports credential presence.
pub async fn command_check(auth: bool, config: &Config) -> anyhow::Result<()> {
    println!("🔍 AlertSite Exporter - Configuration Check");
    println!("============================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n🌍 Regions:");
    for (region, rc) in config.regions() {
        println!(
            "   ├─ {:<8} account {} ({} target patterns)",
            region.as_str(),
            rc.account_id,
            rc.targets.len()
        );
    }

    println!("\n🔑 Checking credentials...");
    let has_credentials = config.credentials().is_some();
    if has_credentials {
        println!("   ✅ Username and password configured");
    } else {
        println!("   ❌ Username/password missing (set them in the config file or ALERTSITE_USERNAME/ALERTSITE_PASSWORD)");
        all_ok = false;
    }

    if auth && has_credentials && all_ok {
        println!("\n🌐 Requesting access token from {}...", config.base_url());
        let components = build_components(config)?;
        match components.credentials.get_token().await {
            Ok(_) => println!("   ✅ Access token obtained"),
            Err(e) => {
                println!("   ❌ Token request failed: {}", e);
                all_ok = false;
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - exporter is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
