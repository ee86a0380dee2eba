//! Loan payment arithmetic for the buyer-facing calculator. Pure and
//! stateless; the HTTP layer resolves the listing price into the principal.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct LoanTerms {
    pub principal: f64,
    /// Annual interest rate in percent, e.g. 5.5 for 5.5% p.a.
    pub annual_interest_rate: f64,
    pub term_months: u32,
    #[serde(default)]
    pub down_payment: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoanQuote {
    pub monthly_payment: f64,
    pub total_payment: f64,
    pub total_interest: f64,
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl LoanTerms {
    fn validate(&self) -> AppResult<()> {
        if self.principal <= 0.0 {
            return Err(AppError::validation("invalid_principal", "principal must be greater than 0"));
        }
        if self.annual_interest_rate < 0.0 {
            return Err(AppError::validation("invalid_rate", "interest rate cannot be negative"));
        }
        if self.term_months == 0 {
            return Err(AppError::validation("invalid_term", "loan term must be greater than 0"));
        }
        if self.down_payment < 0.0 {
            return Err(AppError::validation("invalid_down_payment", "down payment cannot be negative"));
        }
        if self.down_payment > self.principal {
            return Err(AppError::validation("invalid_down_payment", "down payment cannot exceed principal"));
        }
        Ok(())
    }

    /// Standard amortization; a zero rate degenerates to straight division.
    pub fn quote(&self) -> AppResult<LoanQuote> {
        self.validate()?;
        let principal = self.principal - self.down_payment;
        let n = self.term_months as f64;

        let (monthly, total, interest) = if self.annual_interest_rate == 0.0 {
            (principal / n, principal, 0.0)
        } else {
            let r = (self.annual_interest_rate / 100.0) / 12.0;
            let factor = (1.0 + r).powf(n);
            let monthly = principal * (r * factor) / (factor - 1.0);
            let total = monthly * n;
            (monthly, total, total - principal)
        };

        Ok(LoanQuote {
            monthly_payment: round_cents(monthly),
            total_payment: round_cents(total),
            total_interest: round_cents(interest),
        })
    }
}
