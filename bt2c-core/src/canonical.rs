use serde::Serialize;

/// Canonical encoding: UTF-8 JSON, keys sorted lexicographically, no
/// incidental whitespace. `serde_json::Value`'s map is a `BTreeMap` (this
/// crate does not enable the `preserve_order` feature), so round-tripping a
/// value through it before serializing is enough to get sorted keys even
/// though `#[derive(Serialize)]` on a struct would otherwise emit fields in
/// declaration order.
pub fn canonical_bytes<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let as_value = serde_json::to_value(value)?;
    serde_json::to_vec(&as_value)
}
