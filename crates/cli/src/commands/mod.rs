pub(crate) mod check;
pub(crate) mod query;

use std::collections::BTreeMap;
use std::path::Path;
use std::process;

use dynq_core::{Argument, ParseError};

use crate::schema::{infer_value, Schema};
use crate::{report_error, OutputFormat};

pub(crate) fn load_schema(path: &Path, output: OutputFormat, quiet: bool) -> Schema {
    match Schema::load(path) {
        Ok(schema) => schema,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

/// Reads `--arg` JSON values and `--named name=JSON` pairs into compile
/// arguments. Named values, if any, form the trailing argument.
pub(crate) fn parse_arguments(args: &[String], named: &[String]) -> Result<Vec<Argument>, String> {
    let json = |text: &str| {
        serde_json::from_str::<serde_json::Value>(text)
            .map_err(|e| format!("invalid argument '{}': {}", text, e))
    };
    let mut out = Vec::with_capacity(args.len() + 1);
    for text in args {
        out.push(Argument::Value(infer_value(&json(text)?)));
    }
    if !named.is_empty() {
        let mut values = BTreeMap::new();
        for pair in named {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("named argument '{}' is not name=JSON", pair))?;
            values.insert(name.trim().to_owned(), infer_value(&json(value)?));
        }
        out.push(Argument::Named(values));
    }
    Ok(out)
}

/// Reports a compile error. Text output points at the failing offset.
pub(crate) fn report_parse_error(
    expression: &str,
    err: &ParseError,
    output: OutputFormat,
    quiet: bool,
) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let body = serde_json::json!({ "expression": expression, "error": err });
            eprintln!("{}", body);
        }
        OutputFormat::Text => {
            eprintln!("error: {}", err);
            eprintln!("  {}", expression);
            let offset = expression
                .char_indices()
                .take_while(|(i, _)| *i < err.position)
                .count();
            eprintln!("  {}^", " ".repeat(offset));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynq_core::Value;

    #[test]
    fn positional_then_named() {
        let args = parse_arguments(
            &["5".to_owned(), "\"x\"".to_owned()],
            &["limit=10".to_owned()],
        )
        .unwrap();
        assert_eq!(args.len(), 3);
        assert!(matches!(&args[0], Argument::Value(Value::Int32(5))));
        match &args[2] {
            Argument::Named(values) => assert_eq!(values["limit"], Value::Int32(10)),
            other => panic!("expected named values, got {:?}", other),
        }
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        assert!(parse_arguments(&["{".to_owned()], &[]).is_err());
        assert!(parse_arguments(&[], &["novalue".to_owned()]).is_err());
    }
}
