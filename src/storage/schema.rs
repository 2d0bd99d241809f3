//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Registrations table schema.
#[derive(Iden)]
pub enum Registrations {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "registration_number"]
    RegistrationNumber,
    #[iden = "email"]
    Email,
    #[iden = "full_name"]
    FullName,
    #[iden = "order_id"]
    OrderId,
    #[iden = "payment_status"]
    PaymentStatus,
    #[iden = "status"]
    Status,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Course registration forms table schema.
#[derive(Iden)]
pub enum CourseRegForms {
    #[iden = "course_reg_forms"]
    Table,
    #[iden = "id"]
    Id,
    #[iden = "registration_number"]
    RegistrationNumber,
    #[iden = "order_id"]
    OrderId,
    #[iden = "status"]
    Status,
    #[iden = "price_cents"]
    PriceCents,
    #[iden = "subjects"]
    Subjects,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// SQL for creating the registrations table.
pub const CREATE_REGISTRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS registrations (
    id TEXT PRIMARY KEY,
    registration_number TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    full_name TEXT NOT NULL,
    order_id TEXT,
    payment_status TEXT NOT NULL DEFAULT 'PENDING',
    status TEXT NOT NULL DEFAULT 'PENDING',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// SQL for creating the course registration forms table.
pub const CREATE_COURSE_REG_FORMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS course_reg_forms (
    id TEXT PRIMARY KEY,
    registration_number TEXT NOT NULL,
    order_id TEXT,
    status TEXT NOT NULL DEFAULT 'PENDING',
    price_cents INTEGER NOT NULL,
    subjects TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// Secondary indexes for the lookup keys.
pub const CREATE_INDEXES: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS idx_registrations_order_id ON registrations(order_id)",
    "CREATE INDEX IF NOT EXISTS idx_registrations_email ON registrations(email)",
    "CREATE INDEX IF NOT EXISTS idx_course_reg_forms_registration_number ON course_reg_forms(registration_number)",
    "CREATE INDEX IF NOT EXISTS idx_course_reg_forms_order_id ON course_reg_forms(order_id)",
];
