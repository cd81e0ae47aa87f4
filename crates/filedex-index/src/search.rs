//! Path substring search over the index.

use std::sync::Arc;
use std::time::Instant;

use rusqlite::params_from_iter;
use tracing::{debug, info};

use filedex_core::FileRecord;

use crate::error::Result;
use crate::store::{record_from_row, IndexStore, RECORD_COLUMNS};

/// Shortest term the trigram index can answer.
const MIN_INDEXED_TERM: usize = 3;

/// A parsed query: terms routed to the full-text index or to `LIKE` filters.
///
/// Terms are lowercased here and matched against `path_folded`, which holds
/// the lowercased path, so neither route depends on SQLite's case folding.
#[derive(Debug, Default, PartialEq, Eq)]
struct QueryPlan {
    match_expr: Option<String>,
    like_patterns: Vec<String>,
}

impl QueryPlan {
    fn parse(query: &str) -> Self {
        let mut phrases = Vec::new();
        let mut like_patterns = Vec::new();

        for term in query.split_whitespace() {
            let term = term.to_lowercase();
            if term.chars().count() >= MIN_INDEXED_TERM {
                phrases.push(quote_phrase(&term));
            } else {
                like_patterns.push(format!("%{}%", escape_like(&term)));
            }
        }

        Self {
            match_expr: (!phrases.is_empty()).then(|| phrases.join(" ")),
            like_patterns,
        }
    }

    fn is_empty(&self) -> bool {
        self.match_expr.is_none() && self.like_patterns.is_empty()
    }

    fn to_sql(&self) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(expr) = &self.match_expr {
            clauses.push(format!("file_record_fts MATCH ?{}", values.len() + 1));
            values.push(expr.clone());
        }
        for pattern in &self.like_patterns {
            clauses.push(format!("file_record_fts.path_folded LIKE ?{} ESCAPE '\\'", values.len() + 1));
            values.push(pattern.clone());
        }

        let order = if self.match_expr.is_some() {
            "bm25(file_record_fts), r.id"
        } else {
            "r.id"
        };

        let sql = format!(
            "SELECT {RECORD_COLUMNS}
             FROM file_record_fts
             JOIN file_record r ON r.id = CAST(file_record_fts.record_id AS INTEGER)
             WHERE {}
             ORDER BY {order}",
            clauses.join(" AND ")
        );
        (sql, values)
    }
}

/// Wrap a term as an FTS5 phrase so operators inside it are literal.
fn quote_phrase(term: &str) -> String {
    format!("\"{}\"", term.replace('"', "\"\""))
}

/// Escape `LIKE` wildcards with a backslash.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Finds records whose path contains every query term.
///
/// Matching is case-insensitive. Hits whose record cannot be resolved in
/// the current generation are dropped.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    store: Arc<IndexStore>,
}

impl SearchEngine {
    /// Create an engine reading from `store`.
    pub fn new(store: Arc<IndexStore>) -> Self {
        Self { store }
    }

    /// Run `query` against the current generation.
    ///
    /// Results are ordered by relevance when any term went through the
    /// full-text index, then by insertion order. A blank query yields no
    /// results.
    pub fn search(&self, query: &str) -> Result<Vec<FileRecord>> {
        let plan = QueryPlan::parse(query);
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let (sql, values) = plan.to_sql();
        debug!("Search SQL: {}", sql);

        let results = self.store.with_reader(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), record_from_row)?;
            let mut results = Vec::new();
            for row in rows {
                results.push(row?);
            }
            Ok(results)
        })?;

        info!(
            "Search {:?} matched {} records in {:.1}ms",
            query,
            results.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::path::PathBuf;
    use tokio_util::sync::CancellationToken;

    fn engine_with(paths: &[&str]) -> SearchEngine {
        let at = DateTime::from_timestamp(0, 0).unwrap();
        let records: Vec<FileRecord> = paths.iter().map(|p| FileRecord::new(*p, 1, at, at)).collect();
        let store = IndexStore::open_in_memory().unwrap();
        store.rebuild(&records, &CancellationToken::new()).unwrap();
        SearchEngine::new(Arc::new(store))
    }

    fn paths(results: &[FileRecord]) -> Vec<PathBuf> {
        results.iter().map(|r| r.path.clone()).collect()
    }

    #[test]
    fn test_plan_routes_terms() {
        let plan = QueryPlan::parse("ab Report 5%");
        assert_eq!(plan.match_expr.as_deref(), Some("\"report\""));
        assert_eq!(plan.like_patterns, vec!["%ab%".to_string(), "%5\\%%".to_string()]);
    }

    #[test]
    fn test_plan_quotes_fts_syntax() {
        let plan = QueryPlan::parse("a\"b\"c NEAR(x");
        assert_eq!(
            plan.match_expr.as_deref(),
            Some("\"a\"\"b\"\"c\" \"near(x\"")
        );
    }

    #[test]
    fn test_substring_match_is_case_insensitive() {
        let engine = engine_with(&["/home/Docs/Report.PDF", "/home/docs/notes.txt"]);
        let results = engine.search("report").unwrap();
        assert_eq!(paths(&results), vec![PathBuf::from("/home/Docs/Report.PDF")]);

        let results = engine.search("DOCS").unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_short_non_ascii_terms_ignore_case() {
        let engine = engine_with(&["/data/Éa.txt", "/data/ÉTÉ/x", "/data/ea.txt"]);
        assert_eq!(paths(&engine.search("éa").unwrap()), vec![PathBuf::from("/data/Éa.txt")]);
        assert_eq!(paths(&engine.search("Éa").unwrap()), vec![PathBuf::from("/data/Éa.txt")]);
        assert_eq!(paths(&engine.search("été").unwrap()), vec![PathBuf::from("/data/ÉTÉ/x")]);
        assert_eq!(paths(&engine.search("tÉ").unwrap()), vec![PathBuf::from("/data/ÉTÉ/x")]);
    }

    #[test]
    fn test_short_terms_use_like() {
        let engine = engine_with(&["/a/x.txt", "/a/b/y.log", "/c/z.txt"]);
        assert_eq!(paths(&engine.search("z").unwrap()), vec![PathBuf::from("/c/z.txt")]);
        // Insertion order without an indexed term
        assert_eq!(
            paths(&engine.search("/a").unwrap()),
            vec![PathBuf::from("/a/x.txt"), PathBuf::from("/a/b/y.log")]
        );
    }

    #[test]
    fn test_all_terms_must_match() {
        let engine = engine_with(&["/music/live/song.mp3", "/music/studio/song.flac", "/live/set.txt"]);
        assert_eq!(
            paths(&engine.search("live song").unwrap()),
            vec![PathBuf::from("/music/live/song.mp3")]
        );
        assert_eq!(
            paths(&engine.search("mp3 li").unwrap()),
            vec![PathBuf::from("/music/live/song.mp3")]
        );
    }

    #[test]
    fn test_wildcards_are_literal() {
        let engine = engine_with(&["/data/100%/a.txt", "/data/1000/b.txt", "/x_y/c.txt", "/xzy/d.txt"]);
        assert_eq!(
            paths(&engine.search("0%").unwrap()),
            vec![PathBuf::from("/data/100%/a.txt")]
        );
        assert_eq!(paths(&engine.search("x_").unwrap()), vec![PathBuf::from("/x_y/c.txt")]);
    }

    #[test]
    fn test_blank_query_is_empty() {
        let engine = engine_with(&["/a/b.txt"]);
        assert!(engine.search("   ").unwrap().is_empty());
    }

    #[test]
    fn test_no_match() {
        let engine = engine_with(&["/a/b.txt"]);
        assert!(engine.search("nothing").unwrap().is_empty());
    }
}
