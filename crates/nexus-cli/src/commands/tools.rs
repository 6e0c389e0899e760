//! `nexus tools`: print the tool inventory.

use anyhow::Result;
use nexus_config::Config;
use nexus_gateway::ToolInventory;

/// Initialize modules and print every tool with its policy status.
pub(crate) fn run(config: &Config, json: bool) -> Result<()> {
    let dispatcher = super::build_dispatcher(config)?;
    let inventory = ToolInventory::collect(config, &dispatcher);
    if json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
    } else {
        print!("{}", inventory.render_text());
    }
    Ok(())
}
