//! Synthetic payload generation.
//!
//! Builds a `metadata` + `users` document where every value is a pure
//! function of the loop indices, appending one user per iteration until the
//! canonical encoding reaches the target size or the user cap is hit.
//!
//! The canonical encoding is single-line JSON with `", "` between elements
//! and `": "` after keys. The text handed to candidates is the 2-space
//! pretty form of the same document.
//!
//! # Shape
//!
//! ```text
//! {
//!   "metadata": { "version", "created", "size_mb" },
//!   "users": [ { id, name, email, profile, orders: [5 x order] } ],
//!   "products": [],
//!   "orders": []
//! }
//! order = { id: "{user}_{order}", date, items: [3 x item], total }
//! ```

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;

use crate::error::PayloadError;

/// Hard cap on generated users, whatever the target size.
pub const MAX_USERS: usize = 1000;

pub const ORDERS_PER_USER: usize = 5;

pub const ITEMS_PER_ORDER: usize = 3;

const BYTES_PER_MB: usize = 1024 * 1024;

const UNIT_PRICE: f64 = 10.50;

/// Bytes added between two users in the canonical encoding.
const ELEMENT_SEPARATOR_LEN: usize = 2;

/// Single-line JSON with a space after every `,` and `:`.
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Canonical encoding of `value`.
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String, PayloadError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter);
    value.serialize(&mut ser)?;
    // serde_json only emits valid UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn canonical_len<T: Serialize + ?Sized>(value: &T) -> Result<usize, PayloadError> {
    let mut counter = ByteCounter(0);
    let mut ser = serde_json::Serializer::with_formatter(&mut counter, CanonicalFormatter);
    value.serialize(&mut ser)?;
    Ok(counter.0)
}

/// Counts bytes without keeping them.
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub version: String,
    pub created: String,
    pub size_mb: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: String,
    pub notifications: bool,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub age: u32,
    pub city: String,
    pub preferences: Preferences,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub product_id: u32,
    pub quantity: u32,
    pub price: f64,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub date: String,
    pub items: Vec<Item>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub profile: Profile,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub metadata: Metadata,
    pub users: Vec<User>,
    pub products: Vec<serde_json::Value>,
    pub orders: Vec<serde_json::Value>,
}

impl Payload {
    fn empty(size_mb: u32) -> Self {
        Self {
            metadata: Metadata {
                version: "1.0".to_string(),
                created: "2025-01-18".to_string(),
                size_mb,
            },
            users: Vec::new(),
            products: Vec::new(),
            orders: Vec::new(),
        }
    }

    /// Length in bytes of the canonical encoding used for the size check.
    pub fn canonical_len(&self) -> Result<usize, PayloadError> {
        canonical_len(self)
    }
}

/// A generated document together with the text handed to candidates.
#[derive(Debug, Clone)]
pub struct GeneratedPayload {
    pub document: Payload,
    /// Pretty-printed (2-space indent) JSON.
    pub text: String,
    /// Canonical length at the moment generation stopped.
    pub canonical_len: usize,
}

impl GeneratedPayload {
    pub fn size_mb(&self) -> u32 {
        self.document.metadata.size_mb
    }

    pub fn user_count(&self) -> usize {
        self.document.users.len()
    }
}

fn make_item(k: usize) -> Item {
    Item {
        product_id: k as u32,
        quantity: k as u32 + 1,
        price: (k + 1) as f64 * UNIT_PRICE,
        category: format!("Category {}", k % 10),
    }
}

fn make_order(user: usize, j: usize) -> Order {
    let items: Vec<Item> = (0..ITEMS_PER_ORDER).map(make_item).collect();
    let total = (0..ITEMS_PER_ORDER)
        .map(|k| (k + 1) as f64 * UNIT_PRICE)
        .sum();

    Order {
        id: format!("{user}_{j}"),
        date: format!("2025-01-{:02}", j + 1),
        items,
        total,
    }
}

/// Build user `i`. Every field is derived from `i` alone.
pub fn make_user(i: usize) -> User {
    let language = match i % 3 {
        0 => "en",
        1 => "es",
        _ => "fr",
    };

    User {
        id: i as u64,
        name: format!("User {i}"),
        email: format!("user{i}@example.com"),
        profile: Profile {
            age: 20 + (i % 50) as u32,
            city: format!("City {}", i % 100),
            preferences: Preferences {
                theme: (if i % 2 == 1 { "dark" } else { "light" }).to_string(),
                notifications: true,
                language: language.to_string(),
            },
        },
        orders: (0..ORDERS_PER_USER).map(|j| make_order(i, j)).collect(),
    }
}

/// Generate a payload whose canonical encoding first reaches `size_mb` MiB.
///
/// Stops right after the user whose append crosses the threshold, or after
/// [`MAX_USERS`] users. Rather than re-encoding the whole document each
/// iteration, the canonical size is tracked as the empty document's length
/// plus each user's encoding plus one `", "` per extra user, which is
/// exactly what a full re-encode would measure.
pub fn generate(size_mb: u32) -> Result<GeneratedPayload, PayloadError> {
    if size_mb == 0 {
        return Err(PayloadError::InvalidSize(size_mb));
    }

    let target = size_mb as usize * BYTES_PER_MB;
    let mut document = Payload::empty(size_mb);
    let mut current = document.canonical_len()?;

    for i in 0..MAX_USERS {
        let user = make_user(i);
        let separator = if document.users.is_empty() {
            0
        } else {
            ELEMENT_SEPARATOR_LEN
        };
        current += canonical_len(&user)? + separator;
        document.users.push(user);

        if current >= target {
            break;
        }
    }

    let text = serde_json::to_string_pretty(&document)?;
    Ok(GeneratedPayload {
        document,
        text,
        canonical_len: current,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(generate(0), Err(PayloadError::InvalidSize(0))));
    }

    #[test]
    fn test_generate_deterministic() {
        let a = generate(1).unwrap();
        let b = generate(1).unwrap();
        assert_eq!(a.text, b.text);
        assert_eq!(a.document, b.document);
    }

    #[test]
    fn test_threshold_or_cap_for_standard_sizes() {
        for size_mb in [1u32, 10, 50, 100] {
            let p = generate(size_mb).unwrap();
            let encoded = p.document.canonical_len().unwrap();
            assert_eq!(encoded, p.canonical_len);
            assert!(
                encoded >= size_mb as usize * BYTES_PER_MB || p.user_count() == MAX_USERS,
                "size {size_mb}: {encoded} bytes, {} users",
                p.user_count()
            );
            assert!(p.user_count() <= MAX_USERS);
        }
    }

    #[test]
    fn test_stops_on_first_crossing() {
        let p = generate(1).unwrap();
        let target = BYTES_PER_MB;
        assert!(p.canonical_len >= target);

        let mut shorter = p.document.clone();
        shorter.users.pop();
        assert!(shorter.canonical_len().unwrap() < target);
    }

    #[test]
    fn test_one_mb_stops_at_user_638() {
        let p = generate(1).unwrap();
        assert_eq!(p.user_count(), 638);
        assert_eq!(p.document.users.last().unwrap().id, 637);
    }

    #[test]
    fn test_canonical_encoding_spacing() {
        let value = serde_json::json!({"a": [1, 2], "b": {"c": "d"}});
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            r#"{"a": [1, 2], "b": {"c": "d"}}"#
        );
        assert_eq!(canonical_len(&value).unwrap(), 30);
    }

    #[test]
    fn test_incremental_size_matches_full_encoding() {
        let mut doc = Payload::empty(3);
        let mut tracked = doc.canonical_len().unwrap();
        for i in 0..25 {
            let user = make_user(i);
            let separator = if doc.users.is_empty() { 0 } else { 2 };
            tracked += to_canonical_string(&user).unwrap().len() + separator;
            doc.users.push(user);
            assert_eq!(tracked, to_canonical_string(&doc).unwrap().len());
        }
    }

    #[test]
    fn test_user_fields_follow_index() {
        let u = make_user(7);
        assert_eq!(u.id, 7);
        assert_eq!(u.name, "User 7");
        assert_eq!(u.email, "user7@example.com");
        assert_eq!(u.profile.age, 27);
        assert_eq!(u.profile.city, "City 7");
        assert_eq!(u.profile.preferences.theme, "dark");
        assert_eq!(u.profile.preferences.language, "es");
        assert_eq!(u.orders.len(), ORDERS_PER_USER);

        let order = &u.orders[4];
        assert_eq!(order.id, "7_4");
        assert_eq!(order.date, "2025-01-05");
        assert_eq!(order.items.len(), ITEMS_PER_ORDER);
        assert_eq!(order.items[2].price, 31.5);
        assert_eq!(order.items[2].category, "Category 2");
        assert_eq!(order.total, 63.0);
    }

    #[test]
    fn test_metadata_records_requested_size() {
        let p = generate(1).unwrap();
        assert_eq!(p.size_mb(), 1);

        let parsed: serde_json::Value = serde_json::from_str(&p.text).unwrap();
        assert_eq!(parsed["metadata"]["size_mb"], 1);
        assert_eq!(parsed["metadata"]["version"], "1.0");
        assert!(parsed["products"].as_array().unwrap().is_empty());
    }
}
