//! Field value extraction for the write path.

use std::collections::BTreeSet;

use crate::{
    data::Cell,
    schema::{DynamicColumnSpec, SheetRecord, StaticColumnSpec},
};

/// Value of a static column's field on `instance`.
pub fn static_value<R: SheetRecord>(instance: &R, column: &StaticColumnSpec) -> Cell {
    instance.static_value(&column.field_name)
}

/// Union of the dynamic keys carried by every instance in the batch.
pub fn collect_dynamic_keys<R: SheetRecord>(
    instances: &[R],
    spec: &DynamicColumnSpec,
) -> BTreeSet<String> {
    instances
        .iter()
        .filter_map(|instance| instance.dynamic_columns(&spec.field_name))
        .flat_map(|columns| columns.keys().map(str::to_string))
        .collect()
}

/// One entry per key of `closed_keys`; keys the instance lacks are blank.
pub fn dynamic_values<R: SheetRecord>(
    instance: &R,
    spec: &DynamicColumnSpec,
    closed_keys: &BTreeSet<String>,
) -> Vec<(String, Cell)> {
    let columns = instance.dynamic_columns(&spec.field_name);
    closed_keys
        .iter()
        .map(|key| {
            let value = columns.and_then(|c| c.get(key)).cloned();
            (key.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{ToCell, Value},
        reassemble::{FieldError, FieldValues},
        schema::{DynamicColumns, FieldDecl},
    };

    struct Forecast {
        month: String,
        traits: Option<DynamicColumns>,
    }

    impl SheetRecord for Forecast {
        fn fields() -> Vec<FieldDecl> {
            vec![
                StaticColumnSpec::new("month", "Month").into(),
                DynamicColumnSpec::new("traits").into(),
            ]
        }

        fn static_value(&self, field: &str) -> Cell {
            match field {
                "month" => self.month.to_cell(),
                _ => None,
            }
        }

        fn dynamic_columns(&self, _field: &str) -> Option<&DynamicColumns> {
            self.traits.as_ref()
        }

        fn construct(values: &mut FieldValues) -> Result<Self, FieldError> {
            Ok(Self {
                month: values.get("month")?,
                traits: Some(values.take_dynamic("traits")),
            })
        }
    }

    fn batch() -> Vec<Forecast> {
        vec![
            Forecast {
                month: "2024-01".into(),
                traits: Some([("Sales", Value::Integer(150))].into_iter().collect()),
            },
            Forecast {
                month: "2024-02".into(),
                traits: Some([("Priority", "High")].into_iter().collect()),
            },
            Forecast {
                month: "2024-03".into(),
                traits: None,
            },
        ]
    }

    #[test]
    fn closed_key_set_is_the_union_over_the_batch() {
        let spec = DynamicColumnSpec::new("traits");
        let keys = collect_dynamic_keys(&batch(), &spec);
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["Priority", "Sales"]);
    }

    #[test]
    fn missing_keys_are_padded_with_blanks() {
        let spec = DynamicColumnSpec::new("traits");
        let records = batch();
        let keys = collect_dynamic_keys(&records, &spec);

        let first = dynamic_values(&records[0], &spec, &keys);
        assert_eq!(
            first,
            vec![
                ("Priority".to_string(), None),
                ("Sales".to_string(), Some(Value::Integer(150))),
            ]
        );
        let third = dynamic_values(&records[2], &spec, &keys);
        assert!(third.iter().all(|(_, cell)| cell.is_none()));
        assert_eq!(third.len(), 2);
    }

    #[test]
    fn static_value_reads_the_declared_field() {
        let column = StaticColumnSpec::new("month", "Month");
        assert_eq!(
            static_value(&batch()[1], &column),
            Some(Value::String("2024-02".into()))
        );
    }
}
