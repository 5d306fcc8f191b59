//! Query builder ORDER BY, LIMIT, OFFSET

use super::builder::QueryBuilder;
use super::types::OrderDirection;

impl QueryBuilder {
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.orders.push((column.to_string(), direction));
        self
    }

    pub fn order_by_asc(self, column: &str) -> Self {
        self.order_by(column, OrderDirection::Asc)
    }

    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, OrderDirection::Desc)
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    pub fn offset(mut self, count: u64) -> Self {
        self.offset = Some(count);
        self
    }
}
