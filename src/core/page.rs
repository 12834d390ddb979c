//! Purpose: Model the pages submitted to the note service's import API.
//! Exports: `Page`, `ImportBatch`, `memo_batch`.
//! Role: Wire-shaped data model; serializes directly into the import payload.
//! Invariants: A page's title always equals its first line.
//! Invariants: A batch is never empty; this service builds one page per request.

use serde::Serialize;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Page {
    pub title: String,
    pub lines: Vec<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ImportBatch {
    pub pages: Vec<Page>,
}

/// Build a one-page batch: the title as the first line, then the input text
/// split on newlines, in order, empty lines preserved.
pub fn memo_batch(title: &str, text: &str) -> ImportBatch {
    let mut lines = Vec::with_capacity(1 + text.matches('\n').count() + 1);
    lines.push(title.to_string());
    lines.extend(text.split('\n').map(str::to_string));
    ImportBatch {
        pages: vec![Page {
            title: title.to_string(),
            lines,
        }],
    }
}
