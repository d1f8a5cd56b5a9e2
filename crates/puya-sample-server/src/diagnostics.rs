//! The `list(` check and its quick fix

use std::collections::HashMap;
use tower_lsp::lsp_types::{
    CodeAction, CodeActionKind, CodeActionOrCommand, Diagnostic, DiagnosticSeverity, Position,
    Range, TextEdit, Url, WorkspaceEdit,
};

/// Pattern flagged by the check
const LIST_CALL: &str = "list(";
pub const LIST_MESSAGE: &str = "Python list isn't supported in Algorand Python";
pub const SOURCE: &str = "ex";
pub const QUICK_FIX_TITLE: &str = "Replace 'list' with 'arc4.Array'";
const REPLACEMENT: &str = "arc4.Array(";

/// Byte offset to LSP position conversion.
///
/// Characters are counted in UTF-16 code units, as LSP requires.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    /// Byte offset of each line start
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, line_starts }
    }

    pub fn position(&self, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let start = self.line_starts[line];
        let character = self.text[start..offset]
            .chars()
            .map(char::len_utf16)
            .sum::<usize>();

        Position {
            line: line as u32,
            character: character as u32,
        }
    }
}

/// Diagnostics for every `list(` occurrence, at most `max_problems`
pub fn validate(text: &str, max_problems: u32) -> Vec<Diagnostic> {
    let index = LineIndex::new(text);
    text.match_indices(LIST_CALL)
        .take(max_problems as usize)
        .map(|(offset, matched)| Diagnostic {
            range: Range {
                start: index.position(offset),
                end: index.position(offset + matched.len()),
            },
            severity: Some(DiagnosticSeverity::ERROR),
            source: Some(SOURCE.to_string()),
            message: LIST_MESSAGE.to_string(),
            ..Default::default()
        })
        .collect()
}

/// One quick fix per `list(` diagnostic in `diagnostics`
pub fn quick_fixes(uri: &Url, diagnostics: &[Diagnostic]) -> Vec<CodeActionOrCommand> {
    diagnostics
        .iter()
        .filter(|d| d.message == LIST_MESSAGE)
        .map(|diagnostic| {
            let edit = TextEdit {
                range: diagnostic.range,
                new_text: REPLACEMENT.to_string(),
            };
            CodeActionOrCommand::CodeAction(CodeAction {
                title: QUICK_FIX_TITLE.to_string(),
                kind: Some(CodeActionKind::QUICKFIX),
                diagnostics: Some(vec![diagnostic.clone()]),
                edit: Some(WorkspaceEdit {
                    changes: Some(HashMap::from([(uri.clone(), vec![edit])])),
                    ..Default::default()
                }),
                ..Default::default()
            })
        })
        .collect()
}
