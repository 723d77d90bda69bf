use chrono::{Datelike, Timelike};
use model::{core::value::Value, records::row::Row};
use mysql_async::Value as MySqlValue;
use mysql_common::params::Params;

pub struct MySqlParam(MySqlValue);

impl MySqlParam {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Int(i) => MySqlParam(MySqlValue::Int(*i)),
            Value::Uint(u) => MySqlParam(MySqlValue::UInt(*u)),
            Value::Float(f) => MySqlParam(MySqlValue::Double(*f)),
            Value::String(s) => MySqlParam(MySqlValue::Bytes(s.clone().into_bytes())),
            Value::Boolean(b) => MySqlParam(MySqlValue::Int(i64::from(*b))),
            Value::Bytes(b) => MySqlParam(MySqlValue::Bytes(b.clone())),
            Value::Date(d) => MySqlParam(MySqlValue::Date(
                d.year() as u16,
                d.month() as u8,
                d.day() as u8,
                0,
                0,
                0,
                0,
            )),
            Value::Timestamp(ts) => MySqlParam(MySqlValue::Date(
                ts.year() as u16,
                ts.month() as u8,
                ts.day() as u8,
                ts.hour() as u8,
                ts.minute() as u8,
                ts.second() as u8,
                ts.nanosecond() / 1_000,
            )),
            Value::Null => MySqlParam(MySqlValue::NULL),
        }
    }
}

/// Positional parameters for a multi-row INSERT, laid out row by row in
/// `columns` order. Missing values bind as NULL.
pub struct MySqlParamStore {
    pub params: Vec<MySqlParam>,
}

impl MySqlParamStore {
    pub fn from_rows(rows: &[Row], columns: &[String]) -> Self {
        let params = rows
            .iter()
            .flat_map(|row| {
                columns
                    .iter()
                    .map(move |col| MySqlParam::from_value(&row.get_value(col)))
            })
            .collect();
        MySqlParamStore { params }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_params(self) -> Params {
        Params::Positional(self.params.into_iter().map(|p| p.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn lays_out_params_row_major_with_nulls() {
        let rows = vec![
            Row::new().with("id", 1i64).with("name", "a"),
            Row::new().with("id", 2i64),
        ];
        let cols = vec!["id".to_string(), "name".to_string()];
        let store = MySqlParamStore::from_rows(&rows, &cols);
        assert_eq!(store.len(), 4);
        match store.into_params() {
            Params::Positional(values) => assert_eq!(
                values,
                vec![
                    MySqlValue::Int(1),
                    MySqlValue::Bytes(b"a".to_vec()),
                    MySqlValue::Int(2),
                    MySqlValue::NULL,
                ]
            ),
            _ => panic!("expected positional params"),
        }
    }

    #[test]
    fn timestamps_keep_microseconds() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_micro_opt(13, 4, 5, 123_456)
            .unwrap();
        let MySqlParam(value) = MySqlParam::from_value(&Value::Timestamp(ts));
        assert_eq!(value, MySqlValue::Date(2024, 2, 29, 13, 4, 5, 123_456));
    }
}
