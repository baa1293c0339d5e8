//! Coloured tree view of a rendered form.

use colored::Colorize;
use schemaform::{FieldBody, FieldView};
use serde_json::Value;

pub fn print(view: &FieldView) {
    for line in lines(view, 0) {
        println!("{line}");
    }
}

fn lines(view: &FieldView, depth: usize) -> Vec<String> {
    let indent = "  ".repeat(depth);
    let label = view.label.as_deref().unwrap_or("");
    let mut head = format!("{indent}{}", label.bold());
    if view.required {
        head += &"*".red().to_string();
    }
    head += &format!(" {}", view.id.dimmed());
    head += &format!(" {}", summary(&view.body).cyan());
    if view.hidden {
        head += &" (hidden)".dimmed().to_string();
    }
    if view.readonly || view.disabled {
        head += &" (locked)".yellow().to_string();
    }

    let mut out = vec![head];
    for err in &view.errors {
        out.push(format!("{indent}  {} {}", "!".red().bold(), err.red()));
    }
    match &view.body {
        FieldBody::Object { properties } => {
            for child in properties.values() {
                out.extend(lines(child, depth + 1));
            }
        }
        FieldBody::Array(array) => {
            for item in &array.items {
                match &item.field {
                    Some(field) => out.extend(lines(field, depth + 1)),
                    None => out.push(format!("{indent}  [{}] {}", item.index, "inactive".dimmed())),
                }
            }
            if array.capabilities.can_add {
                out.push(format!("{indent}  {}", format!("+ {}", array.add_button_text).green()));
            }
        }
        FieldBody::Failed { error } => out.push(format!("{indent}  {}", error.red())),
        FieldBody::Unsupported { reason } => out.push(format!("{indent}  {}", reason.yellow())),
        _ => {}
    }
    out
}

fn summary(body: &FieldBody) -> String {
    match body {
        FieldBody::Placeholder => "placeholder".to_string(),
        FieldBody::Object { properties } => format!("object ({} fields)", properties.len()),
        FieldBody::Array(array) => {
            format!("array {:?} ({} items)", array.variant, array.items.len())
        }
        FieldBody::Control { widget, output } => match output.get("value") {
            Some(Value::Null) | None => widget.clone(),
            Some(value) => format!("{widget} = {value}"),
        },
        FieldBody::Custom { name, .. } => format!("custom:{name}"),
        FieldBody::Unsupported { .. } => "unsupported".to_string(),
        FieldBody::Failed { .. } => "failed".to_string(),
    }
}
