//! Averages by forecast lead day across many forecast cycles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::WindowAggregator;
use crate::bins::BinTable;
use crate::model::VerifyError;
use crate::table::TableRow;

/// Lead days scored by default (day 1 to day 5).
pub const DEFAULT_LEAD_DAYS: u32 = 5;

/// Averaged rows for one lead day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadSummary {
    pub lead_day: u32,
    pub cycles: u32,
    pub rows: Vec<TableRow>,
}

/// One [`WindowAggregator`] per lead day, created on first use.
#[derive(Debug, Clone)]
pub struct LeadTimeAggregator {
    categories: Vec<String>,
    max_lead_days: u32,
    leads: BTreeMap<u32, WindowAggregator>,
}

impl LeadTimeAggregator {
    pub fn new(bins: &BinTable, max_lead_days: u32) -> Self {
        LeadTimeAggregator {
            categories: bins.names().iter().map(|n| n.to_string()).collect(),
            max_lead_days,
            leads: BTreeMap::new(),
        }
    }

    /// Adds one forecast cycle's rows at `lead_day` (1-based).
    pub fn add(&mut self, lead_day: u32, rows: &[TableRow]) -> Result<(), VerifyError> {
        if lead_day == 0 || lead_day > self.max_lead_days {
            return Err(VerifyError::Config(format!(
                "lead day {} outside 1..={}",
                lead_day, self.max_lead_days
            )));
        }
        if let Some(agg) = self.leads.get_mut(&lead_day) {
            return agg.add_period(rows);
        }
        let mut agg = WindowAggregator::with_categories(
            &format!("lead day {}", lead_day),
            self.categories.iter().map(String::as_str),
        );
        agg.add_period(rows)?;
        self.leads.insert(lead_day, agg);
        Ok(())
    }

    /// Lead days that received at least one cycle.
    pub fn lead_days(&self) -> Vec<u32> {
        self.leads.keys().copied().collect()
    }

    /// One summary per lead day, in lead order.
    pub fn finalize(&self) -> Result<Vec<LeadSummary>, VerifyError> {
        self.leads
            .iter()
            .map(|(&lead_day, agg)| {
                Ok(LeadSummary {
                    lead_day,
                    cycles: agg.periods(),
                    rows: agg.finalize()?,
                })
            })
            .collect()
    }
}
