// Tenancy: companies, memberships and the request-scope resolver
pub mod tenancy;

// Sales and the warranties they produce
pub mod sales;
pub mod warranties;

// Repair tracking
pub mod service_history;
