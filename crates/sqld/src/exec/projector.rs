//! Result projection onto external keys.

use super::executor::{ScanPlan, TypedRecord};
use crate::query::request::Row;

/// Project scanned records into rows keyed by external key.
///
/// Each row holds exactly the plan columns that were populated. Row order is
/// preserved.
pub fn project(records: Vec<TypedRecord>, plan: &ScanPlan) -> Vec<Row> {
    records
        .into_iter()
        .map(|record| {
            plan.columns()
                .iter()
                .zip(record.into_values())
                .filter_map(|(attr, value)| value.map(|v| (attr.external_key.clone(), v)))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{FieldDecl, RecordDecl, RecordSchema};
    use crate::core::value::{SemanticType, Value};

    fn plan() -> ScanPlan {
        let decl = RecordDecl::new("employee")
            .field(FieldDecl::new("id", SemanticType::Integer))
            .field(FieldDecl::new("name", SemanticType::String).json("fullName"));
        ScanPlan::new(RecordSchema::build(&decl, |_| None).unwrap().attributes().to_vec())
    }

    #[test]
    fn test_project_uses_external_keys() {
        let records = vec![
            TypedRecord::new(vec![Some(Value::Integer(1)), Some(Value::from("Ada"))]),
            TypedRecord::new(vec![Some(Value::Integer(2)), None]),
        ];
        let rows = project(records, &plan());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("fullName"), Some(&Value::Text("Ada".into())));
        assert_eq!(rows[1].keys().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_project_empty() {
        assert!(project(Vec::new(), &plan()).is_empty());
    }

    #[test]
    fn test_null_values_are_kept() {
        let rows = project(
            vec![TypedRecord::new(vec![Some(Value::Integer(1)), Some(Value::Null)])],
            &plan(),
        );
        assert_eq!(rows[0].get("fullName"), Some(&Value::Null));
    }
}
