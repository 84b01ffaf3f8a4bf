//! Order and fill types shared by the execution and journal seams.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionEffect {
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    Filled,
    PartiallyFilled,
    Rejected,
}

/// What actually happened to one rebalance instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct FillReport {
    pub order_book_id: String,
    pub side: Side,
    pub effect: PositionEffect,
    pub status: FillStatus,
    pub avg_price: f64,
    pub filled_quantity: i64,
    pub created_at: NaiveDateTime,
}

impl FillReport {
    pub fn is_complete(&self) -> bool {
        self.status == FillStatus::Filled
    }
}
