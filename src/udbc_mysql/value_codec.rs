use crate::udbc::value::Value;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mysql_async::Value as MyValue;

pub fn from_mysql_value(v: &MyValue) -> Value {
    match v {
        MyValue::NULL => Value::Null,
        MyValue::Int(i) => Value::I64(*i),
        MyValue::UInt(u) => Value::U64(*u),
        MyValue::Float(f) => Value::F64(*f as f64),
        MyValue::Double(d) => Value::F64(*d),
        MyValue::Bytes(b) => match String::from_utf8(b.clone()) {
            Ok(s) => Value::Str(s),
            Err(_) => Value::Bytes(b.clone()),
        },
        MyValue::Date(y, m, d, h, min, s, micro) => {
            let Some(date) = NaiveDate::from_ymd_opt(*y as i32, *m as u32, *d as u32) else {
                // Zero dates such as 0000-00-00 have no chrono representation.
                return Value::Str(format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, min, s));
            };
            if (*h, *min, *s, *micro) == (0, 0, 0, 0) {
                return Value::Date(date);
            }
            date.and_hms_micro_opt(*h as u32, *min as u32, *s as u32, *micro)
                .map(Value::DateTime)
                .unwrap_or(Value::Date(date))
        }
        MyValue::Time(is_neg, days, h, min, s, micro) => {
            let hours = *days * 24 + *h as u32;
            match NaiveTime::from_hms_micro_opt(hours, *min as u32, *s as u32, *micro) {
                Some(t) if !*is_neg => Value::Time(t),
                // Negative or >24h intervals stay textual.
                _ => Value::Str(format!(
                    "{}{}:{:02}:{:02}.{:06}",
                    if *is_neg { "-" } else { "" },
                    hours,
                    min,
                    s,
                    micro
                )),
            }
        }
    }
}

fn date_time(dt: &NaiveDateTime) -> MyValue {
    MyValue::Date(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        dt.nanosecond() / 1000,
    )
}

pub fn to_mysql_value(v: &Value) -> MyValue {
    match v {
        Value::Null => MyValue::NULL,
        Value::Bool(b) => MyValue::Int(*b as i64),
        Value::I64(i) => MyValue::Int(*i),
        Value::U64(u) => MyValue::UInt(*u),
        Value::F64(f) => MyValue::Double(*f),
        Value::Str(s) => MyValue::Bytes(s.as_bytes().to_vec()),
        Value::Bytes(b) => MyValue::Bytes(b.clone()),
        Value::Date(d) => MyValue::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
        Value::Time(t) => MyValue::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1000,
        ),
        Value::DateTime(dt) => date_time(dt),
        Value::Decimal(d) => MyValue::Bytes(d.to_string().into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_date_is_textual() {
        let v = from_mysql_value(&MyValue::Date(0, 0, 0, 0, 0, 0, 0));
        assert_eq!(v, Value::Str("0000-00-00 00:00:00".into()));
    }

    #[test]
    fn test_datetime_keeps_micros() {
        let v = from_mysql_value(&MyValue::Date(2024, 2, 29, 13, 5, 9, 250));
        let Value::DateTime(dt) = v else { panic!("expected datetime, got {v:?}") };
        assert_eq!(to_mysql_value(&Value::DateTime(dt)), MyValue::Date(2024, 2, 29, 13, 5, 9, 250));
    }

    #[test]
    fn test_negative_time_is_textual() {
        let v = from_mysql_value(&MyValue::Time(true, 1, 2, 3, 4, 0));
        assert_eq!(v, Value::Str("-26:03:04.000000".into()));
    }

    #[test]
    fn test_bytes_decode_as_text_when_utf8() {
        assert_eq!(from_mysql_value(&MyValue::Bytes(b"abc".to_vec())), Value::Str("abc".into()));
        assert_eq!(from_mysql_value(&MyValue::Bytes(vec![0xff])), Value::Bytes(vec![0xff]));
    }
}
