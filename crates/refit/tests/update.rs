//! End-to-end runs of the schema updater against real database files.

mod common;
use common::*;

use refit::prelude::*;

const TWO_ROWS: &str = r"
CREATE TABLE t (a INT, b TEXT);
INSERT INTO t VALUES (1, 'x');
INSERT INTO t VALUES (2, 'y');
";

#[tokio::test]
async fn fresh_create() {
    let ws = Workspace::new();
    let script = definition(
        "shop",
        r#"CREATE TABLE "shop"."t" (a INT, b TEXT);"#,
    );

    let report = ws.update(&script).await.unwrap();

    assert!(!report.had_previous);
    assert!(!report.migrated);
    assert!(report.swapped);
    assert!(report.tables.is_empty());
    let paths = ws.paths();
    assert!(paths.definition.is_file());
    assert!(!paths.restore.exists());
    assert!(!paths.temp.exists());
    assert!(!paths.temp_journal().exists());

    let count: Vec<(i64,)> = fetch(&ws.target, "SELECT COUNT(*) FROM t").await;
    assert_eq!(count, vec![(0,)]);
}

#[tokio::test]
async fn identical_schema_round_trips() {
    let ws = Workspace::new();
    ws.seed(TWO_ROWS).await;
    let script = definition("shop", r#"CREATE TABLE "shop"."t" (a INT, b TEXT);"#);

    let report = ws.update(&script).await.unwrap();

    assert!(report.had_previous);
    assert!(report.migrated);
    assert!(report.warnings.is_empty());
    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].strategy, "ByPosition");
    assert_eq!(report.tables[0].rows, 2);
    assert!(ws.paths().restore.is_file());

    let rows: Vec<(i64, String)> = fetch(&ws.target, "SELECT a, b FROM t ORDER BY a").await;
    assert_eq!(rows, vec![(1, "x".to_string()), (2, "y".to_string())]);
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let ws = Workspace::new();
    ws.seed(TWO_ROWS).await;
    let script = definition(
        "shop",
        r#"CREATE TABLE "shop"."t" (a INT, b TEXT, c INT DEFAULT 3);"#,
    );

    ws.update(&script).await.unwrap();
    let first: Vec<(i64, String, i64)> = fetch(&ws.target, "SELECT a, b, c FROM t ORDER BY a").await;
    let report = ws.update(&script).await.unwrap();
    let second: Vec<(i64, String, i64)> =
        fetch(&ws.target, "SELECT a, b, c FROM t ORDER BY a").await;

    assert_eq!(report.tables[0].strategy, "ByPosition");
    assert_eq!(first, second);
    assert_eq!(second, vec![(1, "x".to_string(), 3), (2, "y".to_string(), 3)]);
    assert!(ws.paths().definition_backup.is_file());
}

#[tokio::test]
async fn added_columns_take_defaults() {
    let ws = Workspace::new();
    ws.seed(TWO_ROWS).await;
    let script = definition(
        "shop",
        r#"CREATE TABLE "shop"."t" (a INT, b TEXT, c INT DEFAULT 5, d TEXT);"#,
    );

    let report = ws.update(&script).await.unwrap();

    assert_eq!(report.tables[0].strategy, "ByNamedColumns(a,b)");
    let rows: Vec<(i64, String, i64, Option<String>)> =
        fetch(&ws.target, "SELECT a, b, c, d FROM t ORDER BY a").await;
    assert_eq!(
        rows,
        vec![
            (1, "x".to_string(), 5, None),
            (2, "y".to_string(), 5, None),
        ]
    );
}

#[tokio::test]
async fn removed_columns_are_dropped() {
    let ws = Workspace::new();
    ws.seed(TWO_ROWS).await;
    let script = definition("shop", r#"CREATE TABLE "shop"."t" (a INT);"#);

    let report = ws.update(&script).await.unwrap();

    assert_eq!(report.tables[0].strategy, "ByNamedColumns(a)");
    let rows: Vec<(i64,)> = fetch(&ws.target, "SELECT a FROM t ORDER BY a").await;
    assert_eq!(rows, vec![(1,), (2,)]);
}

#[tokio::test]
async fn swapped_column_is_paired_by_name() {
    let ws = Workspace::new();
    ws.seed(TWO_ROWS).await;
    let script = definition(
        "shop",
        r#"CREATE TABLE "shop"."t" (a INT, c INT NOT NULL DEFAULT 0);"#,
    );

    let report = ws.update(&script).await.unwrap();

    assert_eq!(report.tables[0].strategy, "ByNamedColumns(a)");
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("'c' added and column(s) 'b' removed")));
    let rows: Vec<(i64, i64)> = fetch(&ws.target, "SELECT a, c FROM t ORDER BY a").await;
    assert_eq!(rows, vec![(1, 0), (2, 0)]);
}

#[tokio::test]
async fn swapped_column_rejected_when_pairing_disabled() {
    let ws = Workspace::new();
    ws.seed(TWO_ROWS).await;
    let before = ws.bytes();
    let script = definition(
        "shop",
        r#"CREATE TABLE "shop"."t" (a INT, c INT NOT NULL DEFAULT 0);"#,
    );

    let err = SchemaUpdater::new(&ws.target, script)
        .unwrap()
        .column_pairing(ColumnPairing::Reject)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MigrateError::Schema(SchemaError::AmbiguousColumns { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::UnrepairableSchemaDiff);
    assert_eq!(ws.bytes(), before);
}

#[tokio::test]
async fn unrepairable_diff_leaves_target_untouched() {
    let ws = Workspace::new();
    ws.seed(TWO_ROWS).await;
    let before = ws.bytes();
    let script = definition(
        "shop",
        r#"CREATE TABLE "shop"."t" (a INT, c INT, d INT);"#,
    );

    let err = ws.update(&script).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnrepairableSchemaDiff);
    assert!(matches!(
        err,
        MigrateError::Schema(SchemaError::UnrepairableTable { ref table, .. }) if table == "t"
    ));
    assert_eq!(ws.bytes(), before);
    assert!(!ws.paths().restore.exists());
}

#[tokio::test]
async fn renamed_table_is_found_by_fingerprint() {
    let ws = Workspace::new();
    ws.seed(
        r"
        CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
        INSERT INTO items VALUES (1, 'bolt');
        INSERT INTO items VALUES (2, 'nut');
        ",
    )
    .await;
    let script = definition(
        "shop",
        r#"CREATE TABLE "shop"."products" (id INTEGER PRIMARY KEY, name TEXT NOT NULL);"#,
    );

    let report = ws.update(&script).await.unwrap();

    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].source, "items");
    assert_eq!(report.tables[0].target, "products");
    assert_eq!(report.tables[0].strategy, "ByPosition");
    assert!(report.warnings.iter().any(|w| w.contains("renamed")));

    let rows: Vec<(i64, String)> =
        fetch(&ws.target, "SELECT id, name FROM products ORDER BY id").await;
    assert_eq!(rows, vec![(1, "bolt".to_string()), (2, "nut".to_string())]);
    let old: Vec<(i64,)> = fetch(
        &ws.target,
        "SELECT COUNT(*) FROM sqlite_master WHERE name = 'items'",
    )
    .await;
    assert_eq!(old, vec![(0,)]);
}

#[tokio::test]
async fn ambiguous_rename_rejected_under_strict_policy() {
    let ws = Workspace::new();
    ws.seed(
        r"
        CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT);
        INSERT INTO items VALUES (1, 'bolt');
        ",
    )
    .await;
    let before = ws.bytes();
    let script = definition(
        "shop",
        r#"
CREATE TABLE "shop"."goods" (id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE "shop"."products" (id INTEGER PRIMARY KEY, name TEXT);"#,
    );

    let err = SchemaUpdater::new(&ws.target, script)
        .unwrap()
        .rename_policy(RenamePolicy::RejectAmbiguous)
        .run()
        .await
        .unwrap_err();

    match err {
        MigrateError::Schema(SchemaError::AmbiguousRename { table, candidates }) => {
            assert_eq!(table, "items");
            assert_eq!(candidates, vec!["goods", "products"]);
        }
        other => panic!("Expected AmbiguousRename, got {other:?}"),
    }
    assert_eq!(ws.bytes(), before);
}

#[tokio::test]
async fn deferred_indexes_are_rebuilt() {
    let ws = Workspace::new();
    ws.seed(TWO_ROWS).await;
    let script = definition(
        "shop",
        r#"CREATE TABLE "shop"."t" (a INT, b TEXT);
CREATE UNIQUE INDEX "shop"."t_a" ON "t" (a);
CREATE INDEX "shop"."t_b"
    ON "t" (b);"#,
    );

    let report = ws.update(&script).await.unwrap();

    assert_eq!(report.indexes_rebuilt, 2);
    assert_eq!(index_names(&ws.target).await, vec!["t_a", "t_b"]);
    let rewritten = std::fs::read_to_string(ws.paths().definition).unwrap();
    assert!(rewritten.contains(r#"-- CREATE UNIQUE INDEX "shop"."t_a""#));
    assert!(rewritten.contains("--     ON \"t\" (b);"));
    let rows: Vec<(i64,)> = fetch(&ws.target, "SELECT a FROM t ORDER BY a").await;
    assert_eq!(rows, vec![(1,), (2,)]);
}

#[tokio::test]
async fn values_survive_verbatim() {
    let ws = Workspace::new();
    ws.seed(
        r#"
        CREATE TABLE t (a INTEGER, b TEXT, c REAL, d BLOB);
        INSERT INTO t VALUES (1, 'it''s "quoted"; DROP TABLE t; --', 1.5, X'00FF10');
        INSERT INTO t VALUES (2, NULL, NULL, NULL);
        INSERT INTO t VALUES (3, '', -0.125, X'');
        "#,
    )
    .await;
    let script = definition(
        "shop",
        r#"CREATE TABLE "shop"."t" (a INTEGER, b TEXT, c REAL, d BLOB, e TEXT);"#,
    );

    ws.update(&script).await.unwrap();

    let rows: Vec<(i64, Option<String>, Option<f64>, Option<Vec<u8>>)> =
        fetch(&ws.target, "SELECT a, b, c, d FROM t ORDER BY a").await;
    assert_eq!(
        rows,
        vec![
            (
                1,
                Some(r#"it's "quoted"; DROP TABLE t; --"#.to_string()),
                Some(1.5),
                Some(vec![0x00, 0xff, 0x10]),
            ),
            (2, None, None, None),
            (3, Some(String::new()), Some(-0.125), Some(Vec::new())),
        ]
    );
}

#[tokio::test]
async fn dry_run_keeps_target_and_build() {
    let ws = Workspace::new();
    ws.seed(TWO_ROWS).await;
    let before = ws.bytes();
    let script = definition("shop", r#"CREATE TABLE "shop"."t" (a INT, b TEXT, c INT);"#);

    let report = SchemaUpdater::new(&ws.target, script)
        .unwrap()
        .dry_run(true)
        .run()
        .await
        .unwrap();

    assert!(!report.swapped);
    assert_eq!(ws.bytes(), before);
    let paths = ws.paths();
    let rows: Vec<(i64, String, Option<i64>)> =
        fetch(&paths.temp, "SELECT a, b, c FROM t ORDER BY a").await;
    assert_eq!(
        rows,
        vec![(1, "x".to_string(), None), (2, "y".to_string(), None)]
    );
}

#[tokio::test]
async fn missing_attach_is_input_error() {
    let ws = Workspace::new();
    ws.seed(TWO_ROWS).await;
    let before = ws.bytes();

    let err = ws.update("CREATE TABLE t (a INT);").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InputValidation);
    assert!(!ws.paths().temp.exists());
    assert!(!ws.paths().definition.exists());
    assert_eq!(ws.bytes(), before);
}

#[tokio::test]
async fn alias_is_replaced_by_target_name() {
    let ws = Workspace::new();
    let script = definition("legacy", r#"CREATE TABLE "legacy"."t" (a INT);"#);

    ws.update(&script).await.unwrap();

    let rewritten = std::fs::read_to_string(ws.paths().definition).unwrap();
    assert!(rewritten.contains(r#"AS "shop";"#));
    assert!(rewritten.contains(r#"CREATE TABLE "shop"."t""#));
    assert!(!rewritten.contains("legacy"));
    let count: Vec<(i64,)> = fetch(&ws.target, "SELECT COUNT(*) FROM t").await;
    assert_eq!(count, vec![(0,)]);
}

#[tokio::test]
async fn empty_previous_database_is_replaced() {
    let ws = Workspace::new();
    ws.seed("CREATE TABLE old (x INT);").await;
    let script = definition("shop", r#"CREATE TABLE "shop"."t" (a INT, b INT, c INT);"#);

    let report = ws.update(&script).await.unwrap();

    assert!(report.had_previous);
    assert!(!report.migrated);
    assert!(report.dropped_tables.is_empty());
    let tables: Vec<(String,)> = fetch(
        &ws.target,
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .await;
    assert_eq!(tables, vec![("t".to_string(),)]);
}

#[tokio::test]
async fn dropped_table_is_reported() {
    let ws = Workspace::new();
    ws.seed(
        r"
        CREATE TABLE t (a INT, b TEXT);
        CREATE TABLE gone (x INT, y INT, z INT);
        INSERT INTO t VALUES (1, 'x');
        INSERT INTO gone VALUES (1, 2, 3);
        ",
    )
    .await;
    let script = definition("shop", r#"CREATE TABLE "shop"."t" (a INT, b TEXT);"#);

    let report = ws.update(&script).await.unwrap();

    assert_eq!(report.dropped_tables, vec!["gone"]);
    assert!(report.warnings.iter().any(|w| w.contains("'gone'")));
    assert_eq!(report.tables.len(), 1);
}

#[tokio::test]
async fn stale_build_file_is_replaced() {
    let ws = Workspace::new();
    let paths = ws.paths();
    std::fs::write(&paths.temp, b"not a database").unwrap();
    std::fs::write(paths.temp_journal(), b"junk").unwrap();
    let script = definition("shop", r#"CREATE TABLE "shop"."t" (a INT);"#);

    ws.update(&script).await.unwrap();

    assert!(!paths.temp.exists());
    let count: Vec<(i64,)> = fetch(&ws.target, "SELECT COUNT(*) FROM t").await;
    assert_eq!(count, vec![(0,)]);
}

#[tokio::test]
async fn rename_tie_break_follows_creation_order() {
    let ws = Workspace::new();
    ws.seed(
        r"
        CREATE TABLE persons (id INTEGER PRIMARY KEY, name TEXT);
        INSERT INTO persons VALUES (1, 'ada');
        ",
    )
    .await;
    let script = definition(
        "shop",
        r#"
CREATE TABLE "shop"."zeta" (id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE "shop"."alpha" (id INTEGER PRIMARY KEY, name TEXT);"#,
    );

    let report = ws.update(&script).await.unwrap();

    assert_eq!(report.tables[0].target, "zeta");
    let rows: Vec<(i64, String)> = fetch(&ws.target, "SELECT id, name FROM zeta").await;
    assert_eq!(rows, vec![(1, "ada".to_string())]);
    let alpha: Vec<(i64,)> = fetch(&ws.target, "SELECT COUNT(*) FROM alpha").await;
    assert_eq!(alpha, vec![(0,)]);
}

#[tokio::test]
async fn autoincrement_counter_survives() {
    let ws = Workspace::new();
    ws.seed(
        r"
        CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT);
        INSERT INTO t (v) VALUES ('a'), ('b'), ('c');
        DELETE FROM t WHERE id = 3;
        ",
    )
    .await;
    let script = definition(
        "shop",
        r#"CREATE TABLE "shop"."t" (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT);"#,
    );

    let report = ws.update(&script).await.unwrap();
    assert_eq!(report.tables[0].rows, 2);

    let sequence: Vec<(String, i64)> =
        fetch(&ws.target, "SELECT name, seq FROM sqlite_sequence").await;
    assert_eq!(sequence, vec![("t".to_string(), 3)]);

    refit::db::execute_script(&ws.target, "INSERT INTO t (v) VALUES ('d');", false)
        .await
        .unwrap();
    let ids: Vec<(i64,)> = fetch(&ws.target, "SELECT id FROM t ORDER BY id").await;
    assert_eq!(ids, vec![(1,), (2,), (4,)]);
}

#[tokio::test]
async fn statement_sharing_a_line_with_an_index_is_built() {
    let ws = Workspace::new();
    ws.seed(
        r"
        CREATE TABLE t (a INT);
        CREATE TABLE u (x INT);
        INSERT INTO t VALUES (1);
        INSERT INTO u VALUES (7);
        ",
    )
    .await;
    let script = definition(
        "shop",
        r#"CREATE TABLE "shop"."t" (a INT);
CREATE INDEX "shop"."t_a" ON "t" (a); CREATE TABLE "shop"."u" (x INT);"#,
    );

    let report = ws.update(&script).await.unwrap();

    assert!(report.dropped_tables.is_empty());
    assert_eq!(report.indexes_rebuilt, 1);
    let rows: Vec<(i64,)> = fetch(&ws.target, "SELECT x FROM u").await;
    assert_eq!(rows, vec![(7,)]);
    assert_eq!(index_names(&ws.target).await, vec!["t_a"]);
}

#[tokio::test]
async fn restore_failure_leaves_target_untouched() {
    let ws = Workspace::new();
    ws.seed(TWO_ROWS).await;
    let before = ws.bytes();
    let script = definition(
        "shop",
        r#"CREATE TABLE "shop"."t" (a INT, b TEXT, c INT NOT NULL);"#,
    );

    let err = ws.update(&script).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DatabaseExecution);
    assert!(matches!(err, MigrateError::Database(_)));
    assert_eq!(ws.bytes(), before);
    assert!(ws.paths().temp.exists());
}
