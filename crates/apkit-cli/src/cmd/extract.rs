//! Extract command

use std::path::Path;

use anyhow::{Context as _, Result};
use apkit_core::extract::{self, ExtractedFile};

use crate::context::{self, Context};
use crate::ui::{self, theme::format_size};

/// Unpack a bundle or an APK into `output`.
///
/// With `entries`, only those archive entries are unpacked. Bundles are
/// opened first so a zip without a bundle manifest is refused.
pub fn extract(ctx: &Context, file: &Path, output: &Path, entries: &[String]) -> Result<()> {
    if context::is_apk(file) {
        return extract_archive(ctx, file, output, entries);
    }

    let bundle = ctx.open_bundle(file, ctx.inspector(), false)?;
    if !entries.is_empty() {
        extract_archive(ctx, file, output, entries)?;
        bundle.close()?;
        return Ok(());
    }

    if ctx.dry_run {
        println!("Would extract {} to {}:", file.display(), output.display());
        for member in bundle.members() {
            println!("  {}", member.entry());
        }
        return Ok(());
    }

    let files = bundle.extract_all(output)?;
    report(&files, output);
    bundle.close()?;
    Ok(())
}

fn extract_archive(ctx: &Context, file: &Path, output: &Path, entries: &[String]) -> Result<()> {
    if ctx.dry_run {
        let names = if entries.is_empty() {
            extract::entry_names(file)
                .with_context(|| format!("Failed to read {}", file.display()))?
        } else {
            entries.to_vec()
        };
        println!("Would extract {} to {}:", file.display(), output.display());
        for name in &names {
            println!("  {name}");
        }
        return Ok(());
    }

    let files = if entries.is_empty() {
        extract::extract_zip(file, output)
            .with_context(|| format!("Failed to extract {}", file.display()))?
    } else {
        entries
            .iter()
            .map(|entry| {
                extract::extract_entry(file, entry, output)
                    .with_context(|| format!("Failed to extract {entry} from {}", file.display()))
            })
            .collect::<Result<Vec<_>>>()?
    };
    report(&files, output);
    Ok(())
}

fn report(files: &[ExtractedFile], output: &Path) {
    let total: u64 = files.iter().map(|f| f.size).sum();
    for extracted in files {
        println!("  {}", extracted.relative_path.display());
    }
    ui::success(&format!(
        "Extracted {} file(s), {} to {}",
        files.len(),
        format_size(total),
        output.display()
    ));
}
