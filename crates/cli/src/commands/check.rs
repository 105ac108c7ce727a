use std::path::Path;
use std::process;

use dynq_core::{compile_ordering, compile_predicate, compile_projection};

use super::{load_schema, parse_arguments, report_parse_error};
use crate::{report_error, ExpressionKind, OutputFormat};

pub(crate) fn cmd_check(
    schema_path: &Path,
    expression: &str,
    kind: ExpressionKind,
    args: &[String],
    named: &[String],
    output: OutputFormat,
    quiet: bool,
) {
    let schema = load_schema(schema_path, output, quiet);
    let args = match parse_arguments(args, named) {
        Ok(args) => args,
        Err(msg) => {
            report_error(&format!("error: {}", msg), output, quiet);
            process::exit(1);
        }
    };
    let ctx = schema.context();
    let element = &schema.element;

    // One line per compiled lambda: its result type and, for ordering
    // keys, the direction.
    let compiled: Result<Vec<(String, Option<bool>)>, _> = match kind {
        ExpressionKind::Predicate => compile_predicate(&ctx, element, expression, &args)
            .map(|l| vec![(l.return_type().to_string(), None)]),
        ExpressionKind::Projection => compile_projection(&ctx, element, expression, &args)
            .map(|l| vec![(l.return_type().to_string(), None)]),
        ExpressionKind::Ordering => {
            compile_ordering(&ctx, element, expression, &args).map(|keys| {
                keys.iter()
                    .map(|k| (k.selector.return_type().to_string(), Some(k.ascending)))
                    .collect()
            })
        }
    };

    let results = match compiled {
        Ok(results) => results,
        Err(e) => {
            report_parse_error(expression, &e, output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let types: Vec<serde_json::Value> = results
                .iter()
                .map(|(ty, ascending)| match ascending {
                    Some(asc) => serde_json::json!({ "type": ty, "ascending": asc }),
                    None => serde_json::json!({ "type": ty }),
                })
                .collect();
            let body = serde_json::json!({
                "expression": expression,
                "element": element.to_string(),
                "result": types,
            });
            let pretty = serde_json::to_string_pretty(&body)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            for (ty, ascending) in &results {
                match ascending {
                    Some(true) => println!("{} ascending", ty),
                    Some(false) => println!("{} descending", ty),
                    None => println!("{}", ty),
                }
            }
        }
    }
}
