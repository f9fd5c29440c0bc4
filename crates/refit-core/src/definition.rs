//! Definition script retargeting.
//!
//! A definition script creates the desired schema inside a database it
//! attaches itself:
//!
//! ```sql
//! ATTACH "shop.db" AS "shop";
//! BEGIN;
//! CREATE TABLE "shop"."items"(id INTEGER PRIMARY KEY, label TEXT);
//! CREATE INDEX "shop"."items_label" ON "items"(label);
//! COMMIT;
//! ```
//!
//! Before running it, the `ATTACH` line is pointed at the temporary build
//! file, every `"<alias>".` qualifier is renamed to the target's base name,
//! and index creation is commented out so bulk loading is not slowed down.
//! The commented statements are kept for [`RewrittenDefinition::index_script`].

use std::sync::LazyLock;

use regex::{NoExpand, Regex};

use crate::error::{Result, SchemaError};
use crate::restore::quote_identifier;

static ATTACH_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"ATTACH "([^ "]+)" AS "([^ ";]+)""#).expect("Invalid ATTACH pattern regex")
});

static CREATE_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*CREATE\s+(?:UNIQUE\s+)?INDEX\b").expect("Invalid CREATE INDEX regex")
});

/// A definition script ready to run against the build file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenDefinition {
    /// The rewritten script, index creation commented out.
    pub sql: String,
    /// Alias the original `ATTACH` line used.
    pub previous_alias: String,
    /// Alias the script now uses.
    pub alias: String,
    /// Index statements that were commented out, in script order.
    pub deferred_indexes: Vec<String>,
}

impl RewrittenDefinition {
    /// A script that re-attaches `attach_path` under the alias and creates
    /// the deferred indexes, or `None` when there are none.
    #[must_use]
    pub fn index_script(&self, attach_path: &str) -> Option<String> {
        if self.deferred_indexes.is_empty() {
            return None;
        }
        let mut script = attach_directive(attach_path, &self.alias);
        script.push_str(";\n");
        for statement in &self.deferred_indexes {
            script.push_str(statement);
            script.push('\n');
        }
        Some(script)
    }
}

/// Builds an `ATTACH "<path>" AS "<alias>"` directive.
#[must_use]
pub fn attach_directive(path: &str, alias: &str) -> String {
    format!(
        "ATTACH {} AS {}",
        quote_identifier(path),
        quote_identifier(alias)
    )
}

/// Retargets `sql` to `build_path` under `alias` and defers index creation.
///
/// # Errors
///
/// Returns [`SchemaError::MissingAttachDirective`] when the script has no
/// `ATTACH "<path>" AS "<alias>"` line.
pub fn rewrite_definition(sql: &str, build_path: &str, alias: &str) -> Result<RewrittenDefinition> {
    let previous_alias = ATTACH_DIRECTIVE
        .captures(sql)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
        .ok_or(SchemaError::MissingAttachDirective)?;

    let directive = attach_directive(build_path, alias);
    let retargeted = ATTACH_DIRECTIVE.replace_all(sql, NoExpand(&directive));
    let requalified = retargeted.replace(
        &format!("{}.", quote_identifier(&previous_alias)),
        &format!("{}.", quote_identifier(alias)),
    );
    let (sql, deferred_indexes) = comment_out_indexes(&requalified);

    Ok(RewrittenDefinition {
        sql,
        previous_alias,
        alias: alias.to_string(),
        deferred_indexes,
    })
}

/// Comments out every `CREATE [UNIQUE] INDEX` statement, returning the new
/// script and the statements removed.
///
/// Lines are cut at `;` so statements sharing a line with an index keep
/// running; each commented piece starts on its own line.
fn comment_out_indexes(sql: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(sql.len());
    let mut deferred = Vec::new();
    let mut current: Option<String> = None;

    for line in sql.split_inclusive('\n') {
        let segments: Vec<&str> = line.split_inclusive(';').collect();
        for (i, segment) in segments.iter().enumerate() {
            if current.is_none() && CREATE_INDEX.is_match(segment) {
                current = Some(String::new());
            }
            let Some(statement) = current.as_mut() else {
                out.push_str(segment);
                continue;
            };

            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("-- ");
            out.push_str(segment);
            statement.push_str(segment);

            if segment.ends_with(';') {
                deferred.push(statement.trim().to_string());
                current = None;
                if segments[i + 1..].iter().any(|rest| !rest.trim().is_empty()) {
                    out.push('\n');
                }
            }
        }
    }

    if let Some(statement) = current {
        let mut text = statement.trim().to_string();
        text.push(';');
        deferred.push(text);
    }

    (out, deferred)
}
