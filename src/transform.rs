//! The reference transformation applied by the in-process candidate.
//!
//! Works on an untyped [`serde_json::Value`] so that documents missing
//! `users`, `orders` or `total` still process, with absent fields counting
//! as empty or zero.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_users: usize,
    pub total_orders: usize,
    pub average_orders_per_user: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedUser {
    pub id: Option<Value>,
    pub name: Option<Value>,
    pub order_count: usize,
    pub total_spent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedData {
    pub summary: Summary,
    pub users: Vec<ProcessedUser>,
}

fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn process_user(user: &Value) -> ProcessedUser {
    let orders = array_field(user, "orders");
    ProcessedUser {
        id: user.get("id").cloned(),
        name: user.get("name").cloned(),
        order_count: orders.len(),
        total_spent: orders
            .iter()
            .map(|o| o.get("total").and_then(Value::as_f64).unwrap_or(0.0))
            .sum(),
    }
}

/// Summarize users and their orders.
pub fn process_json_data(data: &Value) -> ProcessedData {
    let users: Vec<ProcessedUser> = array_field(data, "users").iter().map(process_user).collect();

    let total_users = users.len();
    let total_orders: usize = users.iter().map(|u| u.order_count).sum();
    let average_orders_per_user = if total_users > 0 {
        total_orders as f64 / total_users as f64
    } else {
        0.0
    };

    ProcessedData {
        summary: Summary {
            total_users,
            total_orders,
            average_orders_per_user,
        },
        users,
    }
}

/// Users whose `name` contains `needle`.
pub fn find_users_by_name<'a>(data: &'a Value, needle: &str) -> Vec<&'a Value> {
    array_field(data, "users")
        .iter()
        .filter(|u| {
            u.get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| name.contains(needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_users_average_is_zero() {
        let out = process_json_data(&json!({"users": []}));
        assert_eq!(out.summary.total_users, 0);
        assert_eq!(out.summary.total_orders, 0);
        assert_eq!(out.summary.average_orders_per_user, 0.0);
        assert!(out.users.is_empty());
    }

    #[test]
    fn test_missing_users_key() {
        let out = process_json_data(&json!({"metadata": {}}));
        assert_eq!(out.summary.total_users, 0);
        assert_eq!(out.summary.average_orders_per_user, 0.0);
    }

    #[test]
    fn test_totals_per_user() {
        let data = json!({
            "users": [
                {"id": 1, "name": "a", "orders": [{"total": 10.0}, {"total": 2.5}]},
                {"id": 2, "name": "b", "orders": [{"total": 4}]},
                {"id": 3, "name": "c", "orders": []},
            ]
        });
        let out = process_json_data(&data);

        assert_eq!(out.summary.total_users, 3);
        assert_eq!(out.summary.total_orders, 3);
        assert_eq!(out.summary.average_orders_per_user, 1.0);

        let spent: Vec<f64> = out.users.iter().map(|u| u.total_spent).collect();
        assert_eq!(spent, vec![12.5, 4.0, 0.0]);
        let counts: Vec<usize> = out.users.iter().map(|u| u.order_count).collect();
        assert_eq!(counts, vec![2, 1, 0]);
        assert_eq!(out.users[1].id, Some(json!(2)));
    }

    #[test]
    fn test_missing_fields_default() {
        let data = json!({
            "users": [
                {"name": "no orders"},
                {"id": 9, "orders": [{"date": "2025-01-01"}, {"total": 3.0}]},
            ]
        });
        let out = process_json_data(&data);

        assert_eq!(out.users[0].id, None);
        assert_eq!(out.users[0].order_count, 0);
        assert_eq!(out.users[0].total_spent, 0.0);
        assert_eq!(out.users[1].name, None);
        assert_eq!(out.users[1].total_spent, 3.0);
        assert_eq!(out.summary.total_orders, 2);
    }

    #[test]
    fn test_generated_payload_summary() {
        let payload = crate::payload::generate(1).unwrap();
        let value: Value = serde_json::from_str(&payload.text).unwrap();
        let out = process_json_data(&value);

        let users = payload.user_count();
        assert_eq!(out.summary.total_users, users);
        assert_eq!(out.summary.total_orders, users * crate::payload::ORDERS_PER_USER);
        assert_eq!(out.summary.average_orders_per_user, 5.0);
        assert!(out.users.iter().all(|u| u.total_spent == 315.0));
    }

    #[test]
    fn test_find_users_by_name() {
        let data = json!({
            "users": [
                {"name": "User 5"},
                {"name": "User 500"},
                {"id": 3},
                {"name": 12},
            ]
        });
        let hits = find_users_by_name(&data, "User 500");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["name"], "User 500");
        assert!(find_users_by_name(&json!({}), "x").is_empty());
    }
}
