use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::counterparty::CounterpartyKind;

/// Document types, each numbered under its own prefix
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema, strum::Display, strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum DocumentKind {
    #[sea_orm(string_value = "PurchaseRequest")]
    PurchaseRequest,
    #[sea_orm(string_value = "PurchaseOrder")]
    PurchaseOrder,
    #[sea_orm(string_value = "Invoice")]
    Invoice,
    #[sea_orm(string_value = "Receipt")]
    Receipt,
    #[sea_orm(string_value = "BillingNote")]
    BillingNote,
    #[sea_orm(string_value = "PaymentVoucher")]
    PaymentVoucher,
    #[sea_orm(string_value = "JobOrder")]
    JobOrder,
    #[sea_orm(string_value = "RepairTicket")]
    RepairTicket,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema, strum::Display, strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum DocumentStatus {
    #[sea_orm(string_value = "Draft")]
    Draft,
    #[sea_orm(string_value = "Sent")]
    Sent,
    #[sea_orm(string_value = "Approved")]
    Approved,
    #[sea_orm(string_value = "Completed")]
    Completed,
    #[sea_orm(string_value = "Paid")]
    Paid,
    #[sea_orm(string_value = "Void")]
    Void,
}

impl DocumentStatus {
    pub fn is_terminal(self) -> bool {
        self == DocumentStatus::Void
    }

    /// Settled or voided documents keep their line items frozen.
    pub fn locks_items(self) -> bool {
        matches!(
            self,
            DocumentStatus::Paid | DocumentStatus::Completed | DocumentStatus::Void
        )
    }
}

impl DocumentKind {
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::PurchaseRequest => "PR",
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::Invoice => "INV",
            DocumentKind::Receipt => "RC",
            DocumentKind::BillingNote => "BN",
            DocumentKind::PaymentVoucher => "PV",
            DocumentKind::JobOrder => "JO",
            DocumentKind::RepairTicket => "RT",
        }
    }

    pub fn default_status(self) -> DocumentStatus {
        match self {
            DocumentKind::Receipt | DocumentKind::PaymentVoucher => DocumentStatus::Completed,
            DocumentKind::BillingNote => DocumentStatus::Sent,
            _ => DocumentStatus::Draft,
        }
    }

    pub fn allowed_statuses(self) -> &'static [DocumentStatus] {
        use DocumentStatus::*;
        match self {
            DocumentKind::PurchaseRequest => &[Draft, Approved, Void],
            DocumentKind::PurchaseOrder => &[Draft, Sent, Completed, Void],
            DocumentKind::Invoice => &[Draft, Sent, Paid, Void],
            DocumentKind::Receipt => &[Completed, Void],
            DocumentKind::BillingNote => &[Draft, Sent, Paid, Void],
            DocumentKind::PaymentVoucher => &[Draft, Approved, Completed, Void],
            DocumentKind::JobOrder => &[Draft, Sent, Completed, Void],
            DocumentKind::RepairTicket => &[Draft, Approved, Completed, Void],
        }
    }

    pub fn allows(self, status: DocumentStatus) -> bool {
        self.allowed_statuses().contains(&status)
    }

    /// Role the referenced counterparty has to play.
    pub fn counterparty_role(self) -> CounterpartyKind {
        match self {
            DocumentKind::PurchaseRequest
            | DocumentKind::PurchaseOrder
            | DocumentKind::PaymentVoucher => CounterpartyKind::Vendor,
            _ => CounterpartyKind::Customer,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: DocumentKind,
    pub number: String,
    pub document_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub status: DocumentStatus,
    pub counterparty_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub reference: Option<String>,
    pub currency: String,
    pub notes: Option<String>,
    pub total_amount: Decimal,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::document_item::Entity")]
    DocumentItem,
    #[sea_orm(
        belongs_to = "super::counterparty::Entity",
        from = "Column::CounterpartyId",
        to = "super::counterparty::Column::Id"
    )]
    Counterparty,
    #[sea_orm(
        belongs_to = "super::asset::Entity",
        from = "Column::AssetId",
        to = "super::asset::Column::Id"
    )]
    Asset,
}

impl Related<super::document_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DocumentItem.def()
    }
}

impl Related<super::counterparty::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Counterparty.def()
    }
}

impl Related<super::asset::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Asset.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case(DocumentKind::PurchaseRequest, "PR", DocumentStatus::Draft)]
    #[case(DocumentKind::PurchaseOrder, "PO", DocumentStatus::Draft)]
    #[case(DocumentKind::Invoice, "INV", DocumentStatus::Draft)]
    #[case(DocumentKind::Receipt, "RC", DocumentStatus::Completed)]
    #[case(DocumentKind::BillingNote, "BN", DocumentStatus::Sent)]
    #[case(DocumentKind::PaymentVoucher, "PV", DocumentStatus::Completed)]
    #[case(DocumentKind::JobOrder, "JO", DocumentStatus::Draft)]
    #[case(DocumentKind::RepairTicket, "RT", DocumentStatus::Draft)]
    fn kind_prefix_and_default_status(
        #[case] kind: DocumentKind,
        #[case] prefix: &str,
        #[case] status: DocumentStatus,
    ) {
        assert_eq!(kind.prefix(), prefix);
        assert_eq!(kind.default_status(), status);
        assert!(kind.allows(kind.default_status()));
        assert!(kind.allows(DocumentStatus::Void));
    }

    #[test]
    fn receipts_cannot_be_drafts() {
        assert!(!DocumentKind::Receipt.allows(DocumentStatus::Draft));
        assert!(!DocumentKind::Invoice.allows(DocumentStatus::Approved));
    }

    #[test]
    fn item_lock_follows_status() {
        assert!(DocumentStatus::Paid.locks_items());
        assert!(DocumentStatus::Completed.locks_items());
        assert!(DocumentStatus::Void.locks_items());
        assert!(!DocumentStatus::Draft.locks_items());
        assert!(!DocumentStatus::Sent.locks_items());
        assert!(DocumentStatus::Void.is_terminal());
    }

    #[test]
    fn kind_parses_from_name() {
        assert_eq!(
            DocumentKind::from_str("BillingNote").unwrap(),
            DocumentKind::BillingNote
        );
        assert!(DocumentKind::from_str("Quote").is_err());
    }

    #[test]
    fn purchasing_kinds_need_vendors() {
        assert_eq!(
            DocumentKind::PurchaseOrder.counterparty_role(),
            CounterpartyKind::Vendor
        );
        assert_eq!(
            DocumentKind::Invoice.counterparty_role(),
            CounterpartyKind::Customer
        );
    }
}
