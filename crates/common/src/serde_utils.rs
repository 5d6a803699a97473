//! Serde helpers for the `0x`-prefixed hex encodings used by JSON-RPC.

pub mod bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let value = String::deserialize(deserializer)?;
        let bytes = hex::decode(value.trim_start_matches("0x"))
            .map_err(|e| serde::de::Error::custom(e.to_string()))?;
        Ok(Bytes::from(bytes))
    }
}

pub mod bytes_vec {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &[Bytes], serializer: S) -> Result<S::Ok, S::Error> {
        value
            .iter()
            .map(|b| format!("0x{}", hex::encode(b)))
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Bytes>, D::Error> {
        let values = Vec::<String>::deserialize(deserializer)?;
        values
            .into_iter()
            .map(|v| {
                hex::decode(v.trim_start_matches("0x"))
                    .map(Bytes::from)
                    .map_err(|e| serde::de::Error::custom(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Blob {
        #[serde(with = "super::bytes")]
        data: Bytes,
    }

    #[test]
    fn hex_blob_round_trip() {
        let json = r#"{"data":"0xdeadbeef"}"#;
        let blob: Blob = serde_json::from_str(json).unwrap();
        assert_eq!(blob.data.as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(serde_json::to_string(&blob).unwrap(), json);
    }

    #[test]
    fn empty_blob() {
        let blob: Blob = serde_json::from_str(r#"{"data":"0x"}"#).unwrap();
        assert!(blob.data.is_empty());
    }
}
