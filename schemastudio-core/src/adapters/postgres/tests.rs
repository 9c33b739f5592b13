//! Unit tests for the PostgreSQL components that need no database.

use super::*;
use crate::error::StudioError;
use crate::identifier::IdentifierKind;
use crate::models::{ColumnSpec, IdentityMode, TableKind};
use serde_json::json;
use std::collections::BTreeMap;

fn lots_request() -> CreateTableRequest {
    CreateTableRequest::new(
        "farm",
        "lots",
        vec![
            ColumnSpec::new("id", "bigint").with_identity(IdentityMode::Always),
            ColumnSpec::new("code", "varchar(20)").with_nullable(false),
            ColumnSpec::new("area_ha", "numeric(10, 2)").with_default("0"),
            ColumnSpec::new("planted_at", "timestamp with time zone").with_default("now()"),
        ],
    )
    .with_primary_key(["id"])
    .with_unique(["code"])
}

#[test]
fn test_render_create_table() {
    let sql = render_create_table(&lots_request()).unwrap();
    assert_eq!(
        sql,
        concat!(
            r#"CREATE TABLE "farm"."lots" ("#,
            r#""id" bigint GENERATED ALWAYS AS IDENTITY NOT NULL, "#,
            r#""code" varchar(20) NOT NULL, "#,
            r#""area_ha" numeric(10, 2) NULL DEFAULT 0, "#,
            r#""planted_at" timestamp with time zone NULL DEFAULT now(), "#,
            r#"PRIMARY KEY ("id"), "#,
            r#"UNIQUE ("code"))"#
        )
    );
}

#[test]
fn test_render_create_table_composite_keys() {
    let request = CreateTableRequest::new(
        "public",
        "plantings",
        vec![
            ColumnSpec::new("lot_id", "bigint").with_nullable(false),
            ColumnSpec::new("season", "int").with_nullable(false),
            ColumnSpec::new("crop", "text"),
        ],
    )
    .with_primary_key(["lot_id", "season"])
    .with_unique(["crop", "season"]);

    let sql = render_create_table(&request).unwrap();
    assert!(sql.contains(r#"PRIMARY KEY ("lot_id", "season")"#));
    assert!(sql.contains(r#"UNIQUE ("crop", "season")"#));
}

#[test]
fn test_render_create_table_rejects_injection_in_table_name() {
    let mut request = lots_request();
    request.table = "x; DROP TABLE y".to_string();

    let err = render_create_table(&request).unwrap_err();
    assert!(matches!(
        err,
        StudioError::InvalidIdentifier {
            kind: IdentifierKind::Table,
            ..
        }
    ));
}

#[test]
fn test_render_create_table_rejects_ghost_primary_key() {
    let request = CreateTableRequest::new("public", "t", vec![ColumnSpec::new("id", "int")])
        .with_primary_key(["ghost"]);
    assert!(matches!(
        render_create_table(&request),
        Err(StudioError::InvalidRequest { .. })
    ));
}

#[test]
fn test_render_column_rejects_bad_type_and_default() {
    let column = ColumnSpec::new("note", "text; DROP TABLE lots");
    assert!(matches!(
        render_column_definition(&column),
        Err(StudioError::InvalidIdentifier {
            kind: IdentifierKind::DataType,
            ..
        })
    ));

    let column = ColumnSpec::new("note", "text").with_default("'a'); DROP TABLE lots; --");
    assert!(matches!(
        render_column_definition(&column),
        Err(StudioError::InvalidRequest { .. })
    ));

    for breakout in ["0, extra int", r"E'\'' , extra int, x text DEFAULT '"] {
        let column = ColumnSpec::new("note", "text").with_default(breakout);
        assert!(
            matches!(render_column_definition(&column), Err(StudioError::InvalidRequest { .. })),
            "default {:?} rendered",
            breakout
        );
    }

    let column = ColumnSpec::new("note", "text").with_default("'a;b'");
    assert_eq!(
        render_column_definition(&column).unwrap(),
        r#""note" text NULL DEFAULT 'a;b'"#
    );
}

#[test]
fn test_render_identity_by_default_column() {
    let column = ColumnSpec::new("id", "integer").with_identity(IdentityMode::ByDefault);
    assert_eq!(
        render_column_definition(&column).unwrap(),
        r#""id" integer GENERATED BY DEFAULT AS IDENTITY NOT NULL"#
    );
}

#[test]
fn test_render_add_column() {
    let request = AddColumnRequest::new(
        "farm",
        "lots",
        ColumnSpec::new("soil", "text")
            .with_nullable(false)
            .with_default("'loam'"),
    );
    assert_eq!(
        render_add_column(&request).unwrap(),
        r#"ALTER TABLE "farm"."lots" ADD COLUMN "soil" text NOT NULL DEFAULT 'loam'"#
    );
}

#[test]
fn test_render_alter_column_orders_clauses() {
    let request = AlterColumnRequest::new("farm", "lots", "code")
        .with_set_default("'n/a'")
        .with_drop_not_null()
        .with_new_type("varchar(40)");
    assert_eq!(
        render_alter_column(&request).unwrap(),
        concat!(
            r#"ALTER TABLE "farm"."lots" "#,
            r#"ALTER COLUMN "code" TYPE varchar(40), "#,
            r#"ALTER COLUMN "code" DROP NOT NULL, "#,
            r#"ALTER COLUMN "code" SET DEFAULT 'n/a'"#
        )
    );
}

#[test]
fn test_render_alter_column_rejects_empty_request() {
    let request = AlterColumnRequest::new("farm", "lots", "code");
    assert!(matches!(
        render_alter_column(&request),
        Err(StudioError::InvalidRequest { .. })
    ));
}

#[test]
fn test_paginate_sql() {
    assert_eq!(
        paginate_sql("select * from lots", 10, 20),
        "select * from lots\nLIMIT 10 OFFSET 20"
    );
    assert_eq!(
        paginate_sql("select 1 ;  \n", 5, 0),
        "select 1\nLIMIT 5 OFFSET 0"
    );
    assert_eq!(
        paginate_sql("select 1 -- trailing note", 1, 0),
        "select 1 -- trailing note\nLIMIT 1 OFFSET 0"
    );
}

#[test]
fn test_ordered_params_accepts_both_spellings() {
    let params = BTreeMap::from([
        ("$2".to_string(), json!("b")),
        ("1".to_string(), json!(1)),
        ("10".to_string(), json!(10)),
        ("3".to_string(), json!(null)),
        ("4".to_string(), json!(4)),
        ("5".to_string(), json!(5)),
        ("6".to_string(), json!(6)),
        ("7".to_string(), json!(7)),
        ("8".to_string(), json!(8)),
        ("9".to_string(), json!(9)),
    ]);

    let ordered = ordered_params(&params).unwrap();
    assert_eq!(ordered.len(), 10);
    assert_eq!(ordered[0], &json!(1));
    assert_eq!(ordered[1], &json!("b"));
    assert_eq!(ordered[2], &json!(null));
    assert_eq!(ordered[9], &json!(10));
}

#[test]
fn test_ordered_params_rejects_bad_keys() {
    let unknown = BTreeMap::from([("name".to_string(), json!(1))]);
    let err = ordered_params(&unknown).unwrap_err();
    assert!(matches!(err, StudioError::QueryExecution { source: None, .. }));
    assert!(err.to_string().contains("name"));

    let zero = BTreeMap::from([("0".to_string(), json!(1))]);
    assert!(ordered_params(&zero).is_err());

    for key in ["+1", "$+1", " 1", "1 ", "$", ""] {
        let odd = BTreeMap::from([(key.to_string(), json!(1))]);
        assert!(ordered_params(&odd).is_err(), "key {:?} accepted", key);
    }

    let gap = BTreeMap::from([("1".to_string(), json!(1)), ("3".to_string(), json!(3))]);
    assert!(ordered_params(&gap).unwrap_err().to_string().contains("3"));

    let duplicate = BTreeMap::from([("1".to_string(), json!(1)), ("$1".to_string(), json!(2))]);
    assert!(ordered_params(&duplicate).is_err());
}

#[test]
fn test_ordered_params_empty() {
    assert!(ordered_params(&BTreeMap::new()).unwrap().is_empty());
}

#[test]
fn test_row_estimates() {
    use super::introspection::row_estimate;

    assert_eq!(row_estimate(TableKind::Table, Some(120)), Some(120));
    assert_eq!(row_estimate(TableKind::Table, Some(-1)), None);
    assert_eq!(row_estimate(TableKind::View, Some(0)), None);
    assert_eq!(row_estimate(TableKind::MaterializedView, None), None);
}
