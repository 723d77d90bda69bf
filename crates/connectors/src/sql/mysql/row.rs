use chrono::NaiveDate;
use model::{core::value::Value, records::row::Row};
use mysql_async::{Column, Row as MySqlRow, Value as MySqlValue, consts::ColumnType};

const BINARY_CHARSET: u16 = 63;

/// Converts a driver row into a column-keyed `Row`.
pub fn to_row(row: &MySqlRow) -> Row {
    row.columns_ref()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let value = row
                .as_ref(idx)
                .map(|v| convert(v, column))
                .unwrap_or(Value::Null);
            (column.name_str().into_owned(), value)
        })
        .collect()
}

fn convert(value: &MySqlValue, column: &Column) -> Value {
    match value {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Int(i) => Value::Int(*i),
        MySqlValue::UInt(u) => Value::Uint(*u),
        MySqlValue::Float(f) => Value::Float(f64::from(*f)),
        MySqlValue::Double(d) => Value::Float(*d),
        MySqlValue::Date(y, mo, d, h, mi, s, us) => {
            let date = NaiveDate::from_ymd_opt(i32::from(*y), u32::from(*mo), u32::from(*d));
            match (column.column_type(), date) {
                (ColumnType::MYSQL_TYPE_DATE, Some(date)) => Value::Date(date),
                (_, Some(date)) => date
                    .and_hms_micro_opt(u32::from(*h), u32::from(*mi), u32::from(*s), *us)
                    .map(Value::Timestamp)
                    .unwrap_or(Value::Null),
                // Zero dates have no calendar representation; keep the text.
                (_, None) => Value::String(format!(
                    "{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}"
                )),
            }
        }
        MySqlValue::Time(neg, days, h, mi, s, us) => {
            let hours = u64::from(*days) * 24 + u64::from(*h);
            let sign = if *neg { "-" } else { "" };
            if *us == 0 {
                Value::String(format!("{sign}{hours:02}:{mi:02}:{s:02}"))
            } else {
                Value::String(format!("{sign}{hours:02}:{mi:02}:{s:02}.{us:06}"))
            }
        }
        MySqlValue::Bytes(bytes) => {
            if is_binary(column) {
                Value::Bytes(bytes.clone())
            } else {
                match String::from_utf8(bytes.clone()) {
                    Ok(s) => Value::String(s),
                    Err(e) => Value::Bytes(e.into_bytes()),
                }
            }
        }
    }
}

/// Byte columns with the `binary` charset are raw data; decimals and JSON
/// also report that charset but carry text.
fn is_binary(column: &Column) -> bool {
    if column.character_set() != BINARY_CHARSET {
        return false;
    }
    matches!(
        column.column_type(),
        ColumnType::MYSQL_TYPE_TINY_BLOB
            | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
            | ColumnType::MYSQL_TYPE_LONG_BLOB
            | ColumnType::MYSQL_TYPE_BLOB
            | ColumnType::MYSQL_TYPE_STRING
            | ColumnType::MYSQL_TYPE_VAR_STRING
            | ColumnType::MYSQL_TYPE_VARCHAR
            | ColumnType::MYSQL_TYPE_BIT
            | ColumnType::MYSQL_TYPE_GEOMETRY
    )
}
