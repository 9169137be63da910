//! Benchmarks for parsing and static extraction
//!
//! These benchmarks measure how the parser and the extractor scale with
//! wide select lists, many joins and nested subqueries.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sqlinfer_sql::{parse, to_query_interface};

/// Generate a query with `num_columns` selected columns and `num_joins` joins
fn generate_join_sql(num_columns: usize, num_joins: usize) -> String {
    let mut select_cols = Vec::new();
    let mut joins = Vec::new();

    for i in 0..num_columns {
        select_cols.push(format!("    t{}.col_{} AS col_{}", i % (num_joins + 1), i, i));
    }

    for i in 1..=num_joins {
        joins.push(format!(
            "LEFT JOIN table_{} t{} ON t0.id = t{}.parent_id AND t{}.active = $active_{}",
            i, i, i, i, i
        ));
    }

    format!(
        "SELECT\n{}\nFROM table_0 t0\n{}\nWHERE t0.id = $id\nORDER BY t0.created_at DESC\nLIMIT $limit",
        select_cols.join(",\n"),
        joins.join("\n")
    )
}

/// Generate `depth` levels of nested `EXISTS` subqueries
fn generate_nested_sql(depth: usize) -> String {
    let mut sql = "SELECT 1 FROM leaf WHERE leaf.id = $id".to_string();
    for i in 0..depth {
        sql = format!(
            "SELECT id, (SELECT count(*) FROM counts c{} WHERE c{}.owner = o{}.id) AS total FROM outer_{} o{} WHERE EXISTS ({})",
            i, i, i, i, i, sql
        );
    }
    sql
}

/// Benchmark: parse wide queries (10, 50, 200 columns)
fn bench_parse_wide(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_wide");

    for num_columns in [10, 50, 200].iter() {
        let sql = generate_join_sql(*num_columns, 5);
        group.bench_with_input(
            BenchmarkId::from_parameter(num_columns),
            num_columns,
            |b, _| b.iter(|| black_box(parse(&sql))),
        );
    }

    group.finish();
}

/// Benchmark: parse and extract nested subqueries
fn bench_extract_nested(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_nested");

    for depth in [1, 5, 20].iter() {
        let sql = generate_nested_sql(*depth);
        let statement = match parse(&sql) {
            Ok(statement) => statement,
            Err(e) => panic!("benchmark SQL must parse: {}", e),
        };

        group.bench_with_input(BenchmarkId::new("parse", depth), depth, |b, _| {
            b.iter(|| black_box(parse(&sql)))
        });
        group.bench_with_input(BenchmarkId::new("extract", depth), depth, |b, _| {
            b.iter(|| black_box(to_query_interface(&statement, &[])))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse_wide, bench_extract_nested);
criterion_main!(benches);
