//! Static completion items

use serde_json::json;
use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind, Documentation};

pub fn items() -> Vec<CompletionItem> {
    vec![
        CompletionItem {
            label: "TypeScript".to_string(),
            kind: Some(CompletionItemKind::TEXT),
            data: Some(json!(1)),
            ..Default::default()
        },
        CompletionItem {
            label: "JavaScript".to_string(),
            kind: Some(CompletionItemKind::TEXT),
            data: Some(json!(2)),
            ..Default::default()
        },
    ]
}

/// Fill in detail and documentation for an item from [`items`]
pub fn resolve(mut item: CompletionItem) -> CompletionItem {
    let language = match item.data.as_ref().and_then(|d| d.as_i64()) {
        Some(1) => "TypeScript",
        Some(2) => "JavaScript",
        _ => return item,
    };
    item.detail = Some(format!("{} details", language));
    item.documentation = Some(Documentation::String(format!("{} documentation", language)));
    item
}
