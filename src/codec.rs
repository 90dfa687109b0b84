//! Conversion between [`Record`] and its wire form.

use crate::error::CodecError;
use crate::proto::{self, field};
use crate::types::{FieldValue, Record};
use bytes::Bytes;

/// Encode a record as a wire document.
pub fn encode(record: &Record) -> proto::Document {
    proto::Document {
        id: record.id.clone(),
        vector: record.vector.clone().unwrap_or_default(),
        score: record.score,
        fields: record
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), encode_field(value)))
            .collect(),
        sparse_vector: record
            .sparse_vector
            .iter()
            .flatten()
            .map(|&(term_id, score)| proto::SparseVecItem { term_id, score })
            .collect(),
    }
}

fn encode_field(value: &FieldValue) -> proto::Field {
    let value = match value {
        FieldValue::Uint(v) => field::Value::ValU64(*v),
        FieldValue::Double(v) => field::Value::ValDouble(*v),
        FieldValue::String(s) => field::Value::ValStr(Bytes::from(s.clone().into_bytes())),
        FieldValue::StringArray(arr) => field::Value::ValStrArr(proto::StringArray {
            str_arr: arr.iter().map(|s| s.as_bytes().to_vec()).collect(),
        }),
        FieldValue::Json(v) => field::Value::ValJson(Bytes::from(v.to_string().into_bytes())),
    };
    proto::Field { value: Some(value) }
}

/// Decode a wire document into a record.
///
/// Fields without a value are skipped.
pub fn decode(doc: proto::Document) -> Result<Record, CodecError> {
    let mut fields = std::collections::HashMap::with_capacity(doc.fields.len());
    for (name, f) in doc.fields {
        let Some(value) = f.value else {
            continue;
        };
        let value = decode_field(&name, value)?;
        fields.insert(name, value);
    }

    Ok(Record {
        id: doc.id,
        score: doc.score,
        vector: (!doc.vector.is_empty()).then_some(doc.vector),
        sparse_vector: (!doc.sparse_vector.is_empty()).then(|| {
            doc.sparse_vector
                .iter()
                .map(|item| (item.term_id, item.score))
                .collect()
        }),
        fields,
    })
}

fn decode_field(name: &str, value: field::Value) -> Result<FieldValue, CodecError> {
    let utf8 = |bytes: Vec<u8>| {
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8 {
            field: name.to_string(),
        })
    };

    Ok(match value {
        field::Value::ValU64(v) => FieldValue::Uint(v),
        field::Value::ValDouble(v) => FieldValue::Double(v),
        field::Value::ValStr(bytes) => FieldValue::String(utf8(bytes.to_vec())?),
        field::Value::ValStrArr(arr) => FieldValue::StringArray(
            arr.str_arr
                .into_iter()
                .map(utf8)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        field::Value::ValJson(bytes) => {
            let v = serde_json::from_slice(&bytes).map_err(|e| CodecError::InvalidJson {
                field: name.to_string(),
                reason: e.to_string(),
            })?;
            FieldValue::Json(v)
        }
    })
}

/// Decode every document of a response, preserving order.
pub fn decode_all(docs: Vec<proto::Document>) -> Result<Vec<Record>, CodecError> {
    docs.into_iter().map(decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use serde_json::json;

    fn sample_record() -> Record {
        Record {
            id: "doc-1".to_string(),
            score: Some(0.875),
            vector: Some(vec![0.1, 0.2, 0.3]),
            sparse_vector: Some(vec![(7, 0.5), (42, 1.25)]),
            fields: Default::default(),
        }
        .with_field("title", "向量数据库")
        .with_field("page", 21u64)
        .with_field("offset", -5i64)
        .with_field("ratio", 0.5f64)
        .with_field("tags", vec!["a".to_string(), "b".to_string()])
        .with_field("meta", json!({"author": "x", "year": 2024}))
    }

    #[test]
    fn test_roundtrip_through_bytes() {
        let rec = sample_record();
        let bytes = encode(&rec).encode_to_vec();
        let decoded = decode(proto::Document::decode(bytes.as_slice()).unwrap()).unwrap();
        assert_eq!(decoded, rec);
    }

    #[test]
    fn test_negative_integer_is_double() {
        let rec = sample_record();
        let doc = encode(&rec);
        assert_eq!(
            doc.fields["offset"].value,
            Some(field::Value::ValDouble(-5.0))
        );
    }

    #[test]
    fn test_optional_parts_absent() {
        let doc = encode(&Record::new("bare"));
        assert!(doc.vector.is_empty());
        assert!(doc.sparse_vector.is_empty());
        assert_eq!(doc.score, None);

        let rec = decode(doc).unwrap();
        assert_eq!(rec, Record::new("bare"));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut doc = proto::Document {
            id: "bad".to_string(),
            ..Default::default()
        };
        doc.fields.insert(
            "title".to_string(),
            proto::Field {
                value: Some(field::Value::ValStr(Bytes::from_static(&[0xff, 0xfe]))),
            },
        );
        let err = decode(doc).unwrap_err();
        assert!(matches!(err, CodecError::InvalidUtf8 { ref field } if field == "title"));
    }

    #[test]
    fn test_invalid_json() {
        let mut doc = proto::Document::default();
        doc.fields.insert(
            "meta".to_string(),
            proto::Field {
                value: Some(field::Value::ValJson(Bytes::from_static(b"{not json"))),
            },
        );
        assert!(matches!(
            decode(doc),
            Err(CodecError::InvalidJson { .. })
        ));
    }

    #[test]
    fn test_decode_all_preserves_order() {
        let docs = vec![
            encode(&Record::new("b")),
            encode(&Record::new("a")),
            encode(&Record::new("c")),
        ];
        let ids: Vec<String> = decode_all(docs).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
