// src/utils/id_generator.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdType {
    User,
    Driver,
    Trip,
    Vehicle,
}

impl IdType {
    pub fn to_prefix(&self) -> &'static str {
        match self {
            IdType::User => "usr",
            IdType::Driver => "drv",
            IdType::Trip => "trip",
            IdType::Vehicle => "veh",
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_prefix())
    }
}

pub struct IdGenerator;

impl IdGenerator {
    /// Generate a unique ID with format: {prefix}-{date}-{random_suffix}
    pub fn generate(id_type: IdType) -> String {
        Self::generate_with_timestamp(id_type, Utc::now())
    }

    /// Generate ID with a specific timestamp (useful for testing)
    pub fn generate_with_timestamp(id_type: IdType, timestamp: DateTime<Utc>) -> String {
        let date_part = timestamp.format("%y%m%d").to_string();
        let random_suffix = Self::generate_random_suffix(5);

        format!("{}-{}-{}", id_type.to_prefix(), date_part, random_suffix)
    }

    fn generate_random_suffix(n: usize) -> String {
        use rand::Rng;
        const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

        let mut rng = rand::rng();
        (0..n)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }

    /// Validate that an ID carries the expected prefix and shape.
    pub fn validate_id(id: &str, expected_type: Option<IdType>) -> bool {
        let parts: Vec<&str> = id.split('-').collect();
        if parts.len() != 3 || parts[1].len() != 6 || parts[2].len() != 5 {
            return false;
        }
        match expected_type {
            Some(expected) => parts[0] == expected.to_prefix(),
            None => matches!(parts[0], "usr" | "drv" | "trip" | "veh"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation() {
        let user_id = IdGenerator::generate(IdType::User);
        assert!(user_id.starts_with("usr-"));
        assert_eq!(user_id.split('-').count(), 3);

        let trip_id = IdGenerator::generate(IdType::Trip);
        assert!(trip_id.starts_with("trip-"));
    }

    #[test]
    fn test_validation() {
        let valid_id = "usr-250825-a1b2c";
        assert!(IdGenerator::validate_id(valid_id, Some(IdType::User)));
        assert!(!IdGenerator::validate_id(valid_id, Some(IdType::Driver)));

        let invalid_id = "invalid-format";
        assert!(!IdGenerator::validate_id(invalid_id, None));
    }

    #[test]
    fn test_generated_ids_validate() {
        for _ in 0..50 {
            let id = IdGenerator::generate(IdType::Trip);
            assert!(IdGenerator::validate_id(&id, Some(IdType::Trip)), "{}", id);
        }
    }
}
