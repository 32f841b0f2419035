// spec.md §3: "the store indexes (kind, id, timestamp) lexicographically."
// A 17-byte key does that directly under plain byte-slice ordering: kind tag,
// then big-endian id, then a sign-flipped big-endian timestamp (so negative
// timestamps, which OSM never emits but which the type allows, still sort
// correctly relative to positive ones).

use osm_hist_model::EntityKind;

pub const KEY_LEN: usize = 17;
pub const PREFIX_LEN: usize = 9;

pub fn encode_ts(ts: i64) -> [u8; 8] {
    ((ts as u64) ^ (1u64 << 63)).to_be_bytes()
}

pub fn decode_ts(bytes: &[u8]) -> i64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(bytes);
    (u64::from_be_bytes(arr) ^ (1u64 << 63)) as i64
}

pub fn encode_prefix(kind: EntityKind, id: u64) -> [u8; PREFIX_LEN] {
    let mut buf = [0u8; PREFIX_LEN];
    buf[0] = kind.key_tag();
    buf[1..9].copy_from_slice(&id.to_be_bytes());
    buf
}

pub fn encode_key(kind: EntityKind, id: u64, ts: i64) -> [u8; KEY_LEN] {
    let mut buf = [0u8; KEY_LEN];
    buf[..PREFIX_LEN].copy_from_slice(&encode_prefix(kind, id));
    buf[PREFIX_LEN..].copy_from_slice(&encode_ts(ts));
    buf
}

pub fn decode_key(bytes: &[u8]) -> (EntityKind, u64, i64) {
    assert_eq!(bytes.len(), KEY_LEN);
    let kind = EntityKind::from_key_tag(bytes[0]).expect("valid key tag");
    let mut id_buf = [0u8; 8];
    id_buf.copy_from_slice(&bytes[1..9]);
    let id = u64::from_be_bytes(id_buf);
    let ts = decode_ts(&bytes[9..17]);
    (kind, id, ts)
}
