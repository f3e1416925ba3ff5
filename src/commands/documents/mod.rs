pub mod create_document_command;
pub mod delete_document_command;
pub mod replace_document_items_command;
pub mod update_document_status_command;

pub use create_document_command::CreateDocumentCommand;
pub use delete_document_command::DeleteDocumentCommand;
pub use replace_document_items_command::ReplaceDocumentItemsCommand;
pub use update_document_status_command::{check_transition, StatusChange, UpdateDocumentStatusCommand};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::errors::ServiceError;
use crate::services::document_writer::{amount_limit, NewLineItem, MONEY_SCALE, QUANTITY_SCALE};

/// Upper bound on lines per document
pub const MAX_LINE_ITEMS: usize = 500;

/// A submitted line item
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "description": "Air filter replacement",
    "quantity": "2",
    "unit_price": "350.00"
}))]
pub struct LineItemInput {
    #[validate(length(min = 1, max = 500, message = "Description must be 1-500 characters"))]
    pub description: String,
    #[validate(custom = "positive_quantity")]
    #[schema(value_type = String)]
    pub quantity: Decimal,
    #[validate(custom = "non_negative_price")]
    #[schema(value_type = String)]
    pub unit_price: Decimal,
}

impl From<LineItemInput> for NewLineItem {
    fn from(input: LineItemInput) -> Self {
        Self {
            description: input.description,
            quantity: input.quantity,
            unit_price: input.unit_price,
        }
    }
}

/// Digits after the point, ignoring trailing zeros
fn places(value: &Decimal) -> u32 {
    value.normalize().scale()
}

fn positive_quantity(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        Err(ValidationError::new("quantity_must_be_positive"))
    } else if places(value) > QUANTITY_SCALE {
        Err(ValidationError::new("quantity_has_too_many_decimal_places"))
    } else {
        Ok(())
    }
}

fn non_negative_price(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        Err(ValidationError::new("unit_price_must_not_be_negative"))
    } else if places(value) > MONEY_SCALE {
        Err(ValidationError::new("unit_price_has_too_many_decimal_places"))
    } else {
        Ok(())
    }
}

/// Explicit totals follow the price rules and must fit the amount column.
pub(crate) fn valid_total(value: &Decimal) -> Result<(), ValidationError> {
    non_negative_price(value)?;
    if *value >= amount_limit() {
        return Err(ValidationError::new("total_out_of_range"));
    }
    Ok(())
}

/// Validates every line, reporting the first failing line number.
pub(crate) fn validate_items(items: &[LineItemInput]) -> Result<(), ServiceError> {
    if items.len() > MAX_LINE_ITEMS {
        return Err(ServiceError::ValidationError(format!(
            "A document holds at most {} line items",
            MAX_LINE_ITEMS
        )));
    }
    for (index, item) in items.iter().enumerate() {
        item.validate().map_err(|e| {
            ServiceError::ValidationError(format!("Line {}: {}", index + 1, e))
        })?;
    }
    Ok(())
}
