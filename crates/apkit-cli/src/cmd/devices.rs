//! Devices command

use anyhow::Result;
use crossterm::style::Stylize;

use crate::context::Context;
use crate::ui;

/// List devices attached to adb
pub fn devices(ctx: &Context, json: bool) -> Result<()> {
    let bridge = ctx.bridge(None)?;
    let devices = bridge.devices()?;

    if json {
        return ui::print_json(&serde_json::to_value(&devices)?);
    }
    if devices.is_empty() {
        println!("No devices attached");
        return Ok(());
    }
    for device in &devices {
        let state = if device.is_ready() {
            device.state.as_str().green()
        } else {
            device.state.as_str().yellow()
        };
        println!("  {:<24}{}", device.serial, state);
    }
    Ok(())
}
