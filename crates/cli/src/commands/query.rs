use std::path::Path;
use std::process;
use std::sync::Arc;

use dynq_core::{compile_projection, Argument, CompileContext, Value};
use dynq_eval::{DynamicQuery, QueryError};
use tracing::info;

use super::{load_schema, parse_arguments, report_parse_error};
use crate::schema::{read_rows, to_json};
use crate::{report_error, OutputFormat};

pub(crate) struct QueryOptions<'a> {
    pub schema: &'a Path,
    pub data: &'a Path,
    pub filters: &'a [String],
    pub order_by: Option<&'a str>,
    pub group_by: Option<&'a str>,
    pub group_select: Option<&'a str>,
    pub select: Option<&'a str>,
    pub skip: Option<usize>,
    pub take: Option<usize>,
    pub count: bool,
    pub args: &'a [String],
    pub named: &'a [String],
    pub output: OutputFormat,
    pub quiet: bool,
}

/// Runs one query stage, exiting with a report when it fails.
fn stage(
    expression: &str,
    result: Result<DynamicQuery, QueryError>,
    output: OutputFormat,
    quiet: bool,
) -> DynamicQuery {
    match result {
        Ok(q) => q,
        Err(QueryError::Parse(e)) => {
            report_parse_error(expression, &e, output, quiet);
            process::exit(1);
        }
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn cmd_query(opts: QueryOptions<'_>) {
    let (output, quiet) = (opts.output, opts.quiet);
    let schema = load_schema(opts.schema, output, quiet);
    let rows = match read_rows(opts.data, &schema.element) {
        Ok(rows) => rows,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let args: Vec<Argument> = match parse_arguments(opts.args, opts.named) {
        Ok(args) => args,
        Err(msg) => {
            report_error(&format!("error: {}", msg), output, quiet);
            process::exit(1);
        }
    };
    info!(rows = rows.len(), element = %schema.element, "loaded rows");

    let ctx = Arc::new(schema.context());
    let mut query = DynamicQuery::with_context(ctx.clone(), schema.element.clone(), rows);
    for filter in opts.filters {
        query = stage(filter, query.where_(filter, &args), output, quiet);
    }
    if let Some(ordering) = opts.order_by {
        query = stage(ordering, query.order_by(ordering, &args), output, quiet);
    }
    if let Some(key) = opts.group_by {
        let grouped = query.group_by(key, opts.group_select, &args);
        // Point the report at whichever of the two expressions failed.
        let text = match (&grouped, opts.group_select) {
            (Err(_), Some(element)) if key_compiles(&ctx, &query, key, &args) => element,
            _ => key,
        };
        query = stage(text, grouped, output, quiet);
    }
    if let Some(selector) = opts.select {
        query = stage(selector, query.select(selector, &args), output, quiet);
    }
    if let Some(n) = opts.skip {
        query = query.skip(n);
    }
    if let Some(n) = opts.take {
        query = query.take(n);
    }

    if opts.count {
        let n = query.rows().len();
        match output {
            OutputFormat::Json => println!("{}", serde_json::json!({ "count": n })),
            OutputFormat::Text => println!("{}", n),
        }
        return;
    }

    match output {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = query.rows().iter().map(to_json).collect();
            let pretty = serde_json::to_string_pretty(&rows)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            for row in query.rows() {
                println!("{}", render(row));
            }
            if !quiet {
                eprintln!("{} row(s) of {}", query.rows().len(), query.element_type());
            }
        }
    }
}

fn key_compiles(ctx: &CompileContext, query: &DynamicQuery, key: &str, args: &[Argument]) -> bool {
    compile_projection(ctx, query.element_type(), key, args).is_ok()
}

/// Scalars print as themselves; records and sequences as compact JSON.
fn render(row: &Value) -> String {
    match row {
        Value::Object(_) | Value::List(_) | Value::Group(_) => to_json(row).to_string(),
        other => other.to_string(),
    }
}
