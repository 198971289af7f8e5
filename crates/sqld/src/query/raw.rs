//! Named-parameter raw statements.
//!
//! Callers write `{{name}}` tokens into otherwise ordinary SQL. The processor
//! extracts the distinct names, checks the supplied values against a parameter
//! schema, and rewrites each token into the dialect's positional marker so
//! only positional text and an ordered argument list reach the driver.

use regex::Regex;

use super::request::ParamMap;
use super::{PlannedQuery, Statement};
use crate::core::schema::RecordSchema;
use crate::core::traits::Dialect;
use crate::core::value::Value;
use crate::error::{Result, SqldError};
use crate::exec::executor::ScanPlan;

/// Exact placeholder token: `{{` identifier `}}`.
const PLACEHOLDER_PATTERN: &str = r"\{\{([A-Za-z0-9_]+)\}\}";

/// Any `{{...}}` fragment, used to detect malformed tokens after rewriting.
const RESIDUAL_PATTERN: &str = r"\{\{[^{}]*\}\}";

/// Compiled placeholder patterns. Construct once and share.
#[derive(Debug, Clone)]
pub struct RawProcessor {
    placeholder: Regex,
    residual: Regex,
}

impl RawProcessor {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| SqldError::Rewrite(format!("invalid placeholder pattern: {}", e)))
        };
        Ok(Self {
            placeholder: compile(PLACEHOLDER_PATTERN)?,
            residual: compile(RESIDUAL_PATTERN)?,
        })
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in self.placeholder.captures_iter(text) {
            let name = &caps[1];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Replace every token with the positional marker for its name's index.
    pub fn rewrite(&self, text: &str, names: &[String], dialect: &dyn Dialect) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in self.placeholder.captures_iter(text) {
            let (Some(token), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let index = names
                .iter()
                .position(|n| n == name.as_str())
                .ok_or_else(|| {
                    SqldError::Rewrite(format!(
                        "placeholder '{}' is not in the parameter list",
                        name.as_str()
                    ))
                })?;
            out.push_str(&text[last..token.start()]);
            out.push_str(&dialect.param_placeholder(index + 1));
            last = token.end();
        }
        out.push_str(&text[last..]);

        if let Some(fragment) = self.residual.find(&out) {
            return Err(SqldError::Rewrite(format!(
                "malformed placeholder {:?}",
                fragment.as_str()
            )));
        }
        Ok(out)
    }

    /// Validate and rewrite a raw statement.
    ///
    /// The scan plan covers every attribute of `result_schema`.
    pub fn prepare(
        &self,
        text: &str,
        params: &ParamMap,
        param_schema: &RecordSchema,
        result_schema: &RecordSchema,
        dialect: &dyn Dialect,
    ) -> Result<PlannedQuery> {
        if text.trim().is_empty() {
            return Err(SqldError::Validation("statement text is empty".to_string()));
        }

        let names = self.extract(text);
        let args = validate_and_order(params, param_schema, &names)?;
        let sql = self.rewrite(text, &names, dialect)?;

        Ok(PlannedQuery {
            statement: Statement { sql, args },
            plan: ScanPlan::new(result_schema.attributes().to_vec()),
        })
    }
}

/// Build the ordered argument list for `names`.
///
/// Names resolve by storage key in the parameter schema. A name missing from
/// `params` binds NULL.
pub fn validate_and_order(
    params: &ParamMap,
    param_schema: &RecordSchema,
    names: &[String],
) -> Result<Vec<Value>> {
    let mut args = Vec::with_capacity(names.len());
    for name in names {
        let attr = param_schema.by_storage_key(name).ok_or_else(|| {
            SqldError::Validation(format!("no type information for parameter {}", name))
        })?;

        let Some(value) = params.get(name) else {
            args.push(Value::Null);
            continue;
        };

        if let Err((got, want)) = attr.check_compatible(value) {
            return Err(SqldError::Validation(format!(
                "parameter {} type mismatch: got {}, want {}",
                name, got, want
            )));
        }
        args.push(attr.to_native(value)?);
    }
    Ok(args)
}
