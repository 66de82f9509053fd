//! Module containing functionality related to BSON ObjectIds.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU32, Ordering},
        LazyLock,
    },
};

use md5::{Digest, Md5};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    datetime::DateTime,
    error::{Error, ErrorKind, Result},
};

const TIMESTAMP_OFFSET: usize = 0;
const MACHINE_OFFSET: usize = 4;
const PID_OFFSET: usize = 7;
const COUNTER_OFFSET: usize = 9;

/// Three bytes identifying the machine this process runs on, derived once per process.
///
/// The host identity is hashed rather than used directly so that ids do not leak the
/// machine name. When no identity can be read, three random bytes are used instead;
/// distinct processes on the same host then remain unlikely to collide because the pid
/// bytes still differ.
static MACHINE_ID: LazyLock<[u8; 3]> = LazyLock::new(|| {
    let id = match host_identity() {
        Some(identity) => {
            let digest = Md5::digest(identity.as_bytes());
            [digest[0], digest[1], digest[2]]
        }
        None => rand::rng().random(),
    };
    #[cfg(feature = "tracing-unstable")]
    tracing::debug!(machine_id = ?id, "initialized ObjectId machine id");
    id
});

/// The per-process ObjectId counter, randomly seeded, of which the low 24 bits are used.
static COUNTER: LazyLock<AtomicU32> = LazyLock::new(|| AtomicU32::new(rand::rng().random()));

fn host_identity() -> Option<String> {
    let stable_id = std::fs::read_to_string("/etc/machine-id")
        .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    stable_id.or_else(|| std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty()))
}

/// A 12-byte BSON ObjectId, laid out as a 4-byte big-endian timestamp, a 3-byte machine
/// id, a 2-byte big-endian process id, and a 3-byte big-endian counter.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ObjectId {
    id: [u8; 12],
}

impl ObjectId {
    /// Generates a new ObjectId from the current time, this machine's id, this process's
    /// pid, and the process-wide counter.
    pub fn new() -> Self {
        let timestamp = chrono::Utc::now().timestamp() as u32;
        let counter = COUNTER.fetch_add(1, Ordering::SeqCst) & 0xFF_FFFF;
        let pid = (std::process::id() & 0xFFFF) as u16;

        let mut id = [0u8; 12];
        id[TIMESTAMP_OFFSET..MACHINE_OFFSET].copy_from_slice(&timestamp.to_be_bytes());
        id[MACHINE_OFFSET..PID_OFFSET].copy_from_slice(&MACHINE_ID[..]);
        id[PID_OFFSET..COUNTER_OFFSET].copy_from_slice(&pid.to_be_bytes());
        id[COUNTER_OFFSET..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self { id }
    }

    /// Constructs an ObjectId from its 12 raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self { id: bytes }
    }

    /// Constructs an ObjectId from a byte slice, which must be exactly 12 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        match <[u8; 12]>::try_from(bytes) {
            Ok(id) => Ok(Self { id }),
            Err(_) => Err(ErrorKind::InvalidObjectId {
                message: format!("expected 12 bytes, got {}", bytes.len()),
            }
            .into()),
        }
    }

    /// Constructs an ObjectId from its 24-character hexadecimal representation.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != 24 {
            return Err(Error::invalid_hex(format!(
                "expected 24 characters, got {:?}",
                s
            )));
        }
        let bytes = hex::decode(s).map_err(|e| Error::invalid_hex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// The raw bytes of the id.
    pub const fn bytes(&self) -> [u8; 12] {
        self.id
    }

    /// The timestamp the id was generated at, with second precision.
    pub fn time(&self) -> DateTime {
        let secs = u32::from_be_bytes([self.id[0], self.id[1], self.id[2], self.id[3]]);
        DateTime::from_millis(i64::from(secs) * 1000)
    }

    /// The 3-byte machine id part.
    pub fn machine(&self) -> [u8; 3] {
        [self.id[4], self.id[5], self.id[6]]
    }

    /// The process id part.
    pub fn pid(&self) -> u16 {
        u16::from_be_bytes([self.id[7], self.id[8]])
    }

    /// The 24-bit counter part.
    pub fn counter(&self) -> u32 {
        u32::from_be_bytes([0, self.id[9], self.id[10], self.id[11]])
    }

    /// The lowercase hexadecimal representation of the id.
    pub fn hex(&self) -> String {
        hex::encode(self.id)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectId").field(&self.hex()).finish()
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ObjectId::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::ObjectId;

    #[test]
    fn hex_round_trip() {
        let id = ObjectId::new();
        let hex = id.hex();
        assert_eq!(hex.len(), 24);
        assert_eq!(ObjectId::from_hex(&hex).unwrap(), id);
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(ObjectId::from_hex("deadbeef").is_err());
        assert!(ObjectId::from_hex("4d88e15b60f486e428412dcz").is_err());
        assert!(ObjectId::from_hex("4d88e15b60f486e428412dc9ff").is_err());
    }

    #[test]
    fn known_id_parts() {
        let id = ObjectId::from_hex("4d88e15b60f486e428412dc9").unwrap();
        assert_eq!(id.time().timestamp_millis(), 1300816219 * 1000);
        assert_eq!(
            id.time().to_chrono().to_rfc3339(),
            "2011-03-22T17:50:19+00:00"
        );
        assert_eq!(id.machine(), [0x60, 0xf4, 0x86]);
        assert_eq!(id.pid(), 0xe428);
        assert_eq!(id.counter(), 0x412dc9);
        assert_eq!(id.hex(), "4d88e15b60f486e428412dc9");
    }

    #[test]
    fn generated_ids_recover_their_inputs() {
        let id = ObjectId::new();
        let next = ObjectId::new();
        assert_eq!(id.machine(), next.machine());
        assert_eq!(id.pid(), (std::process::id() & 0xFFFF) as u16);
    }

    // Other tests may generate ids concurrently, so allow gaps in the counter but
    // never regression.
    #[test]
    fn counter_is_monotonic() {
        let mut last = ObjectId::new().counter();
        for _ in 0..64 {
            let next = ObjectId::new().counter();
            let diff = next.wrapping_sub(last) & 0xFF_FFFF;
            assert!((1..1000).contains(&diff), "counter went backwards");
            last = next;
        }
    }

    #[test]
    fn json_representation_is_quoted_hex() {
        let id = ObjectId::from_hex("4d88e15b60f486e428412dc9").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"4d88e15b60f486e428412dc9\"");
        assert_eq!(json.len(), 26);
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
