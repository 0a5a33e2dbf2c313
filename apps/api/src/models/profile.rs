use serde::{Deserialize, Serialize};

pub const CREDIT_SCORE_MIN: u32 = 300;
pub const CREDIT_SCORE_MAX: u32 = 850;
pub const CONFIDENCE_MIN: u8 = 1;
pub const CONFIDENCE_MAX: u8 = 10;

/// The financial profile submitted through the planning form.
///
/// Field names match the form's wire format. A profile is never mutated after
/// submission; sessions share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    // About you
    pub name: String,
    pub age: u32,
    pub employment_status: String,
    pub location: String,

    // Lifestyle & habits
    pub housing_situation: String,
    pub dining_habits: String,
    pub monthly_subscriptions: f64,

    // Financial snapshot
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub total_debt: f64,
    pub credit_score: u32,
    pub bank_account_balance: f64,

    // Goal
    pub financial_goal: String,
    pub financial_confidence_score: u8,
}

/// A single field that breaks a profile invariant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileViolation {
    pub field: &'static str,
    pub reason: String,
}

impl Profile {
    /// Checks the form-level invariants. Returns every violation, not just the first.
    ///
    /// The prompt builder never calls this; only the HTTP layer does.
    pub fn validate(&self) -> Vec<ProfileViolation> {
        let mut violations = Vec::new();

        if self.name.trim().is_empty() {
            violations.push(ProfileViolation {
                field: "name",
                reason: "must not be empty".to_string(),
            });
        }

        if self.financial_goal.trim().is_empty() {
            violations.push(ProfileViolation {
                field: "financial_goal",
                reason: "must not be empty".to_string(),
            });
        }

        let money = [
            ("monthly_subscriptions", self.monthly_subscriptions),
            ("monthly_income", self.monthly_income),
            ("monthly_expenses", self.monthly_expenses),
            ("total_debt", self.total_debt),
            ("bank_account_balance", self.bank_account_balance),
        ];
        for (field, value) in money {
            if !value.is_finite() || value < 0.0 {
                violations.push(ProfileViolation {
                    field,
                    reason: format!("must be a non-negative amount, got {value}"),
                });
            }
        }

        if !(CREDIT_SCORE_MIN..=CREDIT_SCORE_MAX).contains(&self.credit_score) {
            violations.push(ProfileViolation {
                field: "credit_score",
                reason: format!(
                    "must be between {CREDIT_SCORE_MIN} and {CREDIT_SCORE_MAX}, got {}",
                    self.credit_score
                ),
            });
        }

        if !(CONFIDENCE_MIN..=CONFIDENCE_MAX).contains(&self.financial_confidence_score) {
            violations.push(ProfileViolation {
                field: "financial_confidence_score",
                reason: format!(
                    "must be between {CONFIDENCE_MIN} and {CONFIDENCE_MAX}, got {}",
                    self.financial_confidence_score
                ),
            });
        }

        violations
    }
}

#[cfg(test)]
pub(crate) fn sample_profile() -> Profile {
    Profile {
        name: "Sami Miri".to_string(),
        age: 21,
        employment_status: "Student".to_string(),
        location: "Austin, TX".to_string(),
        housing_situation: "Renting".to_string(),
        dining_habits: "Mix of Both".to_string(),
        monthly_subscriptions: 75.0,
        monthly_income: 3200.0,
        monthly_expenses: 1800.0,
        total_debt: 400.0,
        credit_score: 700,
        bank_account_balance: 3700.0,
        financial_goal: "Buy first car".to_string(),
        financial_confidence_score: 6,
    }
}
