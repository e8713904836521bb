use std::str::FromStr;

use serde_json::{json, Map, Value as Json};

use folio_errors::FolioError;
use folio_types::{Dict, Ref, Value, Word};

/// Encodes a [`Dict`] to the bytes written to `rec:{id}`.
///
/// This is the engine's own boundary codec, not a pass-through of whatever
/// wire format the remote store itself uses internally (§6): a tagged JSON
/// object per value, so a decode failure on one tag never corrupts its
/// neighbors.
pub fn encode_dict(dict: &Dict) -> Vec<u8> {
    let mut obj = Map::new();
    for (tag, val) in dict.iter() {
        obj.insert(tag.as_str().to_owned(), encode_value(val));
    }
    serde_json::to_vec(&Json::Object(obj)).expect("tagged json values always serialize")
}

pub fn decode_dict(id: &str, bytes: &[u8]) -> Result<Dict, FolioError> {
    let json: Json =
        serde_json::from_slice(bytes).map_err(|e| FolioError::encoding(id, e))?;
    let obj = json
        .as_object()
        .ok_or_else(|| FolioError::encoding(id, "record body is not a JSON object"))?;
    let mut dict = Dict::new();
    for (tag, val) in obj {
        let word = Word::try_new(tag.clone()).map_err(|e| FolioError::encoding(id, e))?;
        dict.set(word, decode_value(id, val)?);
    }
    Ok(dict)
}

/// Encodes a single [`Value`], the form used for history-item payloads
/// (`his:{id}` sorted-set members carry one of these each).
pub fn encode_value_bytes(val: &Value) -> Vec<u8> {
    serde_json::to_vec(&encode_value(val)).expect("tagged json values always serialize")
}

pub fn decode_value_bytes(id: &str, bytes: &[u8]) -> Result<Value, FolioError> {
    let json: Json = serde_json::from_slice(bytes).map_err(|e| FolioError::encoding(id, e))?;
    decode_value(id, &json)
}

fn encode_value(val: &Value) -> Json {
    match val {
        Value::Marker => json!({"t": "marker"}),
        Value::Remove => json!({"t": "remove"}),
        Value::Bool(b) => json!({"t": "bool", "v": b}),
        Value::Number { value, unit } => json!({"t": "num", "v": value, "u": unit.as_ref().map(|u| u.as_str())}),
        Value::Str(s) => json!({"t": "str", "v": s}),
        Value::DateTime { epoch_millis, tz } => {
            json!({"t": "dt", "v": epoch_millis, "tz": tz.name()})
        }
        Value::Date { y, m, d } => json!({"t": "date", "y": y, "m": m, "d": d}),
        Value::Time { h, m, s, ms } => json!({"t": "time", "h": h, "m": m, "s": s, "ms": ms}),
        Value::Ref(r) => json!({"t": "ref", "v": r.id(), "dis": r.display()}),
        Value::Uri(u) => json!({"t": "uri", "v": u}),
        Value::Coord { lat, lng } => json!({"t": "coord", "lat": lat, "lng": lng}),
        Value::Bytes(b) => json!({"t": "bytes", "v": hex_encode(b)}),
        Value::Dict(d) => {
            let mut obj = Map::new();
            for (tag, v) in d.iter() {
                obj.insert(tag.as_str().to_owned(), encode_value(v));
            }
            json!({"t": "dict", "v": Json::Object(obj)})
        }
        Value::List(items) => json!({"t": "list", "v": items.iter().map(encode_value).collect::<Vec<_>>()}),
    }
}

fn decode_value(id: &str, json: &Json) -> Result<Value, FolioError> {
    let obj = json
        .as_object()
        .ok_or_else(|| FolioError::encoding(id, "value is not a tagged object"))?;
    let bad = || FolioError::encoding(id, "malformed tagged value");
    let t = obj.get("t").and_then(Json::as_str).ok_or_else(bad)?;
    Ok(match t {
        "marker" => Value::Marker,
        "remove" => Value::Remove,
        "bool" => Value::Bool(obj.get("v").and_then(Json::as_bool).ok_or_else(bad)?),
        "num" => {
            let value = obj.get("v").and_then(Json::as_f64).ok_or_else(bad)?;
            let unit = obj
                .get("u")
                .and_then(Json::as_str)
                .map(Word::new_unchecked);
            Value::Number { value, unit }
        }
        "str" => Value::Str(obj.get("v").and_then(Json::as_str).ok_or_else(bad)?.to_owned()),
        "dt" => {
            let epoch_millis = obj.get("v").and_then(Json::as_i64).ok_or_else(bad)?;
            let tz_name = obj.get("tz").and_then(Json::as_str).ok_or_else(bad)?;
            let tz = chrono_tz::Tz::from_str(tz_name).map_err(|_| bad())?;
            Value::DateTime { epoch_millis, tz }
        }
        "date" => Value::Date {
            y: obj.get("y").and_then(Json::as_i64).ok_or_else(bad)? as i32,
            m: obj.get("m").and_then(Json::as_u64).ok_or_else(bad)? as u8,
            d: obj.get("d").and_then(Json::as_u64).ok_or_else(bad)? as u8,
        },
        "time" => Value::Time {
            h: obj.get("h").and_then(Json::as_u64).ok_or_else(bad)? as u8,
            m: obj.get("m").and_then(Json::as_u64).ok_or_else(bad)? as u8,
            s: obj.get("s").and_then(Json::as_u64).ok_or_else(bad)? as u8,
            ms: obj.get("ms").and_then(Json::as_u64).ok_or_else(bad)? as u16,
        },
        "ref" => {
            let rid = obj.get("v").and_then(Json::as_str).ok_or_else(bad)?;
            let r = Ref::new(rid);
            if let Some(dis) = obj.get("dis").and_then(Json::as_str) {
                r.set_display(dis);
            }
            Value::Ref(r)
        }
        "uri" => Value::Uri(obj.get("v").and_then(Json::as_str).ok_or_else(bad)?.to_owned()),
        "coord" => Value::Coord {
            lat: obj.get("lat").and_then(Json::as_f64).ok_or_else(bad)?,
            lng: obj.get("lng").and_then(Json::as_f64).ok_or_else(bad)?,
        },
        "bytes" => Value::Bytes(
            hex_decode(obj.get("v").and_then(Json::as_str).ok_or_else(bad)?)
                .ok_or_else(bad)?,
        ),
        "dict" => {
            let inner = obj.get("v").and_then(Json::as_object).ok_or_else(bad)?;
            let mut d = Dict::new();
            for (tag, v) in inner {
                let word = Word::try_new(tag.clone()).map_err(|_| bad())?;
                d.set(word, decode_value(id, v)?);
            }
            Value::Dict(d)
        }
        "list" => {
            let items = obj.get("v").and_then(Json::as_array).ok_or_else(bad)?;
            Value::List(
                items
                    .iter()
                    .map(|v| decode_value(id, v))
                    .collect::<Result<_, _>>()?,
            )
        }
        other => return Err(FolioError::encoding(id, format!("unknown value tag {other}"))),
    })
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_mixed_dict() {
        let mut d = Dict::new();
        d.set(Word::new_unchecked("site"), Value::Marker);
        d.set(Word::new_unchecked("area"), Value::number_with_unit(120.0, Word::new_unchecked("m2")));
        d.set(Word::new_unchecked("dis"), Value::Str("Site A".into()));
        d.set(Word::new_unchecked("raw"), Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef]));

        let bytes = encode_dict(&d);
        let back = decode_dict("site.a", &bytes).unwrap();
        assert_eq!(d, back);
    }
}
