use rstest::rstest;
use sqlreview_core::advisor::{RegistryBuilder, RuleTemplate};
use sqlreview_core::{
    advice_codes, check, Advice, AdviceStatus, DatabaseSchema, Dialect, ReviewContext,
    RuleDescriptor, RuleKind, RuleLevel, SqlReviewer,
};

fn quiet() -> ReviewContext {
    ReviewContext {
        suppress_builtin: true,
        ..ReviewContext::default()
    }
}

fn review(sql: &str, dialect: Dialect, kinds: &[RuleKind]) -> Vec<Advice> {
    let rules: Vec<RuleDescriptor> = kinds
        .iter()
        .map(|kind| RuleDescriptor::new(*kind, RuleLevel::Error))
        .collect();
    check(sql, dialect, &rules, &quiet()).expect("review runs")
}

fn findings(advice: &[Advice]) -> Vec<(i32, Option<usize>, Option<usize>)> {
    advice
        .iter()
        .filter(|advice| advice.status != AdviceStatus::Ok)
        .map(|advice| (advice.code, advice.line, advice.column))
        .collect()
}

#[rstest]
#[case::postgres(Dialect::Postgres)]
#[case::mysql(Dialect::Mysql)]
#[case::mssql(Dialect::Mssql)]
#[case::snowflake(Dialect::Snowflake)]
fn table_without_primary_key_is_reported_once(#[case] dialect: Dialect) {
    let sql = "CREATE TABLE audit (id int, note varchar(20))";
    let advice = review(sql, dialect, &[RuleKind::TableRequirePk]);
    assert_eq!(findings(&advice), vec![(advice_codes::TABLE_NO_PK, Some(1), Some(1))]);
    assert_eq!(advice[0].content, "Table `audit` requires PRIMARY KEY");
}

#[rstest]
#[case::column_level("CREATE TABLE audit (id int PRIMARY KEY, note varchar(20))")]
#[case::table_level("CREATE TABLE audit (id int, note varchar(20), PRIMARY KEY (id))")]
#[case::named_constraint("CREATE TABLE audit (id int, CONSTRAINT audit_pk PRIMARY KEY (id))")]
fn table_with_primary_key_passes(#[case] sql: &str) {
    let advice = review(sql, Dialect::Postgres, &[RuleKind::TableRequirePk]);
    assert_eq!(advice, vec![Advice::ok()]);
}

#[test]
fn drop_constraint_only_affects_its_own_table() {
    let sql = "CREATE TABLE a (id int PRIMARY KEY);\n\
               ALTER TABLE b DROP CONSTRAINT b_pkey;\n\
               CREATE TABLE c (id int PRIMARY KEY)";
    let advice = review(sql, Dialect::Postgres, &[RuleKind::TableRequirePk]);
    assert_eq!(advice, vec![Advice::ok()]);
}

#[test]
fn second_statement_reports_its_absolute_line() {
    let sql = "UPDATE orders SET total = 0 WHERE id = 1;\n\n\n  DELETE FROM orders;";
    let advice = review(sql, Dialect::Mysql, &[RuleKind::StatementRequireWhere]);
    assert_eq!(
        findings(&advice),
        vec![(advice_codes::STATEMENT_NO_WHERE, Some(4), Some(3))]
    );
}

#[test]
fn multi_line_statement_keeps_inner_lines_absolute() {
    let sql = "SELECT 1;\nCREATE TABLE a (\n  id int\n);\nCREATE TABLE b (\n  id int PRIMARY KEY\n)";
    let advice = review(sql, Dialect::Postgres, &[RuleKind::TableRequirePk]);
    assert_eq!(findings(&advice), vec![(advice_codes::TABLE_NO_PK, Some(2), Some(1))]);
}

#[rstest]
#[case::update_assignment("UPDATE t SET a = (SELECT * FROM u) WHERE id = 1")]
#[case::any_op("SELECT a FROM t WHERE a = ANY (SELECT * FROM u)")]
#[case::all_op("SELECT a FROM t WHERE a > ALL (SELECT * FROM u)")]
#[case::is_distinct_from("SELECT a FROM t WHERE a IS DISTINCT FROM (SELECT * FROM u)")]
#[case::is_not_distinct_from("SELECT a FROM t WHERE a IS NOT DISTINCT FROM (SELECT * FROM u)")]
#[case::tuple("SELECT (a, (SELECT * FROM u)) FROM t")]
#[case::is_true("SELECT a FROM t WHERE (SELECT * FROM u) IS TRUE")]
#[case::is_false("SELECT a FROM t WHERE (SELECT * FROM u) IS FALSE")]
#[case::is_unknown("SELECT a FROM t WHERE (SELECT * FROM u) IS UNKNOWN")]
#[case::collate("SELECT (SELECT * FROM u) COLLATE \"C\" FROM t")]
#[case::at_time_zone("SELECT (SELECT * FROM u) AT TIME ZONE 'UTC' FROM t")]
#[case::extract("SELECT EXTRACT(YEAR FROM (SELECT * FROM u)) FROM t")]
#[case::substring("SELECT SUBSTRING((SELECT * FROM u) FROM 1 FOR 2) FROM t")]
#[case::array("SELECT ARRAY[(SELECT * FROM u)] FROM t")]
#[case::function_filter("SELECT count(a) FILTER (WHERE a IN (SELECT * FROM u)) FROM t")]
fn nested_subqueries_reach_rules(#[case] sql: &str) {
    let advice = review(sql, Dialect::Postgres, &[RuleKind::StatementNoSelectAll]);
    let codes: Vec<i32> = advice.iter().map(|advice| advice.code).collect();
    assert_eq!(codes, vec![advice_codes::STATEMENT_SELECT_ALL], "{sql}");
}

#[rstest]
#[case::collate("SELECT a FROM t WHERE a LIKE '%x' COLLATE \"C\"")]
#[case::is_true("SELECT a FROM t WHERE (y LIKE '%a') IS TRUE")]
#[case::update_assignment("UPDATE t SET flag = (y LIKE '%a') WHERE id = 1")]
#[case::case_in_tuple("SELECT (a, CASE WHEN y LIKE '%a' THEN 1 END) FROM t")]
fn nested_like_reaches_rules(#[case] sql: &str) {
    let advice = review(sql, Dialect::Postgres, &[RuleKind::StatementNoLeadingWildcardLike]);
    let codes: Vec<i32> = advice.iter().map(|advice| advice.code).collect();
    assert_eq!(codes, vec![advice_codes::STATEMENT_LEADING_WILDCARD_LIKE], "{sql}");
}

#[test]
fn rules_see_the_schema_after_earlier_statements() {
    let context = ReviewContext {
        schema: Some(orders_snapshot()),
        suppress_builtin: true,
        ..ReviewContext::default()
    };
    let rules = [RuleDescriptor::new(RuleKind::TableRequirePk, RuleLevel::Error)];
    let advice = check(
        "CREATE TABLE audit (id int PRIMARY KEY, note text);\nALTER TABLE audit DROP COLUMN id",
        Dialect::Postgres,
        &rules,
        &context,
    )
    .expect("review runs");
    assert_eq!(findings(&advice), vec![(advice_codes::TABLE_NO_PK, Some(2), Some(1))]);
    assert_eq!(advice[0].content, "Table `audit` requires PRIMARY KEY");
}

fn orders_snapshot() -> DatabaseSchema {
    serde_json::from_value(serde_json::json!({
        "name": "shop",
        "schemas": [{
            "name": "public",
            "tables": [{
                "name": "orders",
                "columns": [{ "name": "a" }, { "name": "b" }, { "name": "c" }],
                "indexes": [{ "name": "orders_abc", "expressions": ["a", "b", "c"] }]
            }]
        }]
    }))
    .expect("valid snapshot")
}

#[rstest]
#[case::leading_column("CREATE INDEX orders_a ON orders (a)", 1)]
#[case::other_column("CREATE INDEX orders_b ON orders (b)", 0)]
fn redundant_index_against_snapshot(#[case] sql: &str, #[case] expected: usize) {
    let context = ReviewContext {
        schema: Some(orders_snapshot()),
        suppress_builtin: true,
        ..ReviewContext::default()
    };
    let rules = [RuleDescriptor::new(RuleKind::IndexNotRedundant, RuleLevel::Warning)];
    let advice = check(sql, Dialect::Postgres, &rules, &context).expect("review runs");
    let redundant = advice
        .iter()
        .filter(|advice| advice.code == advice_codes::REDUNDANT_INDEX)
        .count();
    assert_eq!(redundant, expected, "{advice:?}");
}

#[test]
fn walk_through_failure_replaces_rule_output() {
    let context = ReviewContext {
        schema: Some(orders_snapshot()),
        suppress_builtin: true,
        ..ReviewContext::default()
    };
    let rules = [RuleDescriptor::new(RuleKind::TableRequirePk, RuleLevel::Error)];
    let advice = check(
        "CREATE TABLE audit (id int);\nCREATE INDEX orders_d ON orders (d)",
        Dialect::Postgres,
        &rules,
        &context,
    )
    .expect("review runs");
    assert_eq!(advice.len(), 1);
    assert_eq!(advice[0].code, advice_codes::COLUMN_NOT_EXISTS);
    assert_eq!(advice[0].line, Some(2));
    assert_eq!(advice[0].content, "Column `d` does not exist in table `orders`");
}

#[test]
fn error_bucket_keeps_earliest_findings() {
    let sql: String = (1..=6)
        .map(|n| format!("DELETE FROM t{n};"))
        .collect::<Vec<_>>()
        .join("\n");
    let rules = [RuleDescriptor::new(RuleKind::StatementRequireWhere, RuleLevel::Error)];
    let reviewer = SqlReviewer::default().with_limits(3, 3);

    let first = reviewer
        .check(&sql, Dialect::Postgres, &rules, &quiet())
        .expect("review runs");
    let lines: Vec<_> = first.iter().map(|advice| advice.line).collect();
    assert_eq!(lines, vec![Some(1), Some(2), Some(3)]);

    let second = reviewer
        .check(&sql, Dialect::Postgres, &rules, &quiet())
        .expect("review runs");
    assert_eq!(first, second);
}

#[test]
fn default_template_runs_cleanly_on_every_dialect() {
    let template = RuleTemplate::builtin().expect("embedded template parses");
    for dialect in Dialect::ALL {
        let advice = check(
            "CREATE TABLE t (id int PRIMARY KEY, name varchar(10) NOT NULL)",
            dialect,
            &template.rules,
            &quiet(),
        )
        .expect("review runs");
        assert!(
            advice.iter().all(|advice| advice.status != AdviceStatus::Error),
            "{dialect}: {advice:?}"
        );
    }
}

#[test]
#[should_panic(expected = "registered twice")]
fn duplicate_registration_panics() {
    let mut builder = RegistryBuilder::new();
    let factory = sqlreview_core::advisor::global_registry()
        .lookup(Dialect::Mysql, RuleKind::TableRequirePk)
        .expect("shipped rule");
    builder.register(Dialect::Mysql, RuleKind::TableRequirePk, factory);
    builder.register(Dialect::Mysql, RuleKind::TableRequirePk, factory);
}
