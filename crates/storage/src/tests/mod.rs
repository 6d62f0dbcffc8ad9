//! Test utilities and module declarations for storage tests.

use chrono::{TimeZone, Utc};
use smart_query_core::{ExampleQuestion, VerifiedQuery};

mod memory_store_tests;

pub fn make_query(id: &str, examples: &[(&str, Vec<f32>)], follow_ups: &[&str]) -> VerifiedQuery {
    VerifiedQuery {
        id: id.to_owned(),
        name: format!("Query {id}"),
        sql: format!("SELECT '{id}'"),
        explanation: format!("Explains {id}"),
        instructions: None,
        tables_used: ["policy".to_owned()].into_iter().collect(),
        questions: examples
            .iter()
            .map(|(text, embedding)| ExampleQuestion::new(*text).with_embedding(embedding.clone()))
            .collect(),
        follow_ups: follow_ups.iter().map(|s| (*s).to_owned()).collect(),
        verified_by: "tester".to_owned(),
        verified_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    }
}
