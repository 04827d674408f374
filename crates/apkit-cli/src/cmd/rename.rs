//! Rename command

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde_json::{Map, Value};

use crate::context::{Context, Package};

/// Rename `file` after its own metadata
pub fn rename(ctx: &Context, file: &Path, template: &str) -> Result<()> {
    let mut fields = match ctx.open_package(file, false)? {
        Package::Apk(apk) => apk.metadata().to_map(),
        Package::Bundle(bundle) => {
            let map = bundle.aggregate()?.metadata.to_map();
            bundle.close()?;
            map
        }
    };
    if let Some(ext) = file.extension().and_then(|e| e.to_str()) {
        fields.insert("ext".to_string(), Value::String(ext.to_string()));
    }

    let name = render_template(template, &fields)?;
    let target = target_path(file, &name)?;
    if target == file {
        println!("{} already has that name", file.display());
        return Ok(());
    }
    if target.exists() {
        bail!("{} already exists", target.display());
    }

    if ctx.dry_run {
        println!("Would rename {} -> {}", file.display(), target.display());
        return Ok(());
    }
    std::fs::rename(file, &target)?;
    println!("{} -> {}", file.display(), target.display());
    Ok(())
}

/// Substitute `{field}` placeholders with metadata values.
///
/// `{{` and `}}` produce literal braces. Lists are joined with `,`.
pub fn render_template(template: &str, fields: &Map<String, Value>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => key.push(c),
                        None => bail!("unclosed '{{' in template"),
                    }
                }
                let Some(value) = fields.get(key.trim()) else {
                    bail!("unknown field '{key}'");
                };
                out.push_str(&render_value(&key, value)?);
            }
            '}' => bail!("unmatched '}}' in template"),
            c => out.push(c),
        }
    }
    Ok(out)
}

fn render_value(key: &str, value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => bail!("field '{key}' is not set for this package"),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| render_value(key, item))
            .collect::<Result<Vec<_>>>()?
            .join(","),
        Value::Object(_) => bail!("field '{key}' cannot be used in a file name"),
        other => other.to_string(),
    })
}

fn target_path(file: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        bail!("'{name}' is not a valid file name");
    }
    Ok(file.with_file_name(name))
}
