// src/models/user.rs
use serde::{Deserialize, Serialize};

/// Directory view of a platform user (requester or driver account).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub push_token: Option<String>,
    pub rating: f64,
    pub rating_count: u32,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname)
    }

    /// Running weighted mean. The first rating initializes the mean outright;
    /// afterwards `new = (old * count + incoming) / (count + 1)`.
    pub fn apply_rating(&mut self, incoming: f64) {
        if self.rating_count == 0 {
            self.rating = incoming;
            self.rating_count = 1;
        } else {
            let total = self.rating * self.rating_count as f64;
            self.rating_count += 1;
            self.rating = (total + incoming) / self.rating_count as f64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            id: "usr-250825-a1b2c".to_string(),
            name: "Ama".to_string(),
            surname: "Mensah".to_string(),
            push_token: None,
            rating: 0.0,
            rating_count: 0,
        }
    }

    #[test]
    fn first_rating_initializes_without_averaging() {
        let mut user = profile();
        user.apply_rating(4.0);
        assert_eq!(user.rating, 4.0);
        assert_eq!(user.rating_count, 1);
    }

    #[test]
    fn running_mean_preserves_total() {
        let mut user = profile();
        for incoming in [5.0, 3.0, 4.0, 2.0] {
            let old_total = user.rating * user.rating_count as f64;
            user.apply_rating(incoming);
            let new_total = user.rating * user.rating_count as f64;
            assert!((new_total - (old_total + incoming)).abs() < 1e-9);
        }
        assert_eq!(user.rating_count, 4);
        assert!((user.rating - 3.5).abs() < 1e-9);
    }
}
