//! Uninstall command

use anyhow::{Result, bail};
use apkit_schema::PackageName;

use crate::context::Context;
use crate::ui;

/// Remove `package` from the target device
pub fn uninstall(ctx: &Context, package: &str, serial: Option<String>) -> Result<()> {
    let package = PackageName::new(package);
    let bridge = ctx.bridge(serial)?;
    if ctx.dry_run {
        println!("Would uninstall {package}");
        return Ok(());
    }
    let output = bridge.uninstall(&package)?;
    if !output.success {
        bail!("`{}` failed: {}", output.command, output.text);
    }
    ui::success(&format!("Uninstalled {package}"));
    Ok(())
}
