pub mod auth;
pub mod categories;
pub mod chat;
pub mod error;
pub mod health;
pub mod items;
pub mod maintenance;
pub mod notifications;
pub mod pagination;
pub mod purchases;
pub mod reports;
pub mod transactions;
pub mod users;
pub mod vendors;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::infrastructure::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/change-password", post(auth::change_password))
        // Users & roles
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", put(users::update_user).delete(users::delete_user))
        .route("/users/:id/role", put(users::update_role))
        .route("/roles", get(users::list_roles))
        // Categories & vendors
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route("/categories/:id/schema", get(categories::category_schema))
        .route("/vendors", get(vendors::list_vendors).post(vendors::create_vendor))
        // Items
        .route("/items", get(items::list_items).post(items::create_item))
        .route("/items/stats", get(items::item_stats))
        .route("/items/export", get(items::export_items))
        .route("/items/bulk/status", post(items::bulk_status))
        .route("/items/bulk/category", post(items::bulk_category))
        .route("/items/bulk/delete", post(items::bulk_delete))
        .route(
            "/items/:id",
            get(items::get_item)
                .put(items::update_item)
                .delete(items::delete_item),
        )
        .route("/items/:id/history", get(items::item_history))
        // Transactions
        .route("/transactions", get(transactions::list_transactions))
        .route("/transactions/checkout", post(transactions::checkout))
        .route("/transactions/overdue", get(transactions::overdue))
        .route("/transactions/my-loans", get(transactions::my_loans))
        .route("/transactions/stats", get(transactions::stats))
        .route("/transactions/:id", get(transactions::get_transaction))
        .route("/transactions/:id/return", post(transactions::return_item))
        .route("/transactions/:id/extend", post(transactions::extend))
        .route("/transactions/:id/cancel", post(transactions::cancel))
        .route("/transactions/:id/pay-fee", post(transactions::pay_fee))
        // Maintenance requests
        .route(
            "/maintenance-requests",
            get(maintenance::list_requests).post(maintenance::create_request),
        )
        .route("/maintenance-requests/statistics", get(maintenance::statistics))
        .route(
            "/maintenance-requests/:id",
            get(maintenance::get_request)
                .put(maintenance::update_request)
                .delete(maintenance::delete_request),
        )
        .route("/maintenance-requests/:id/assign", post(maintenance::assign_request))
        .route("/maintenance-requests/:id/complete", post(maintenance::complete_request))
        .route("/maintenance-requests/:id/cancel", post(maintenance::cancel_request))
        // Purchase requests
        .route(
            "/purchase-requests",
            get(purchases::list_requests).post(purchases::create_request),
        )
        .route("/purchase-requests/statistics", get(purchases::statistics))
        .route(
            "/purchase-requests/:id",
            get(purchases::get_request)
                .put(purchases::update_request)
                .delete(purchases::delete_request),
        )
        .route("/purchase-requests/:id/approve", post(purchases::approve))
        .route("/purchase-requests/:id/reject", post(purchases::reject))
        .route("/purchase-requests/:id/order", post(purchases::order))
        .route("/purchase-requests/:id/receive", post(purchases::receive))
        .route("/purchase-requests/:id/cancel", post(purchases::cancel))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/read", delete(notifications::delete_read))
        .route("/notifications/:id", delete(notifications::delete_notification))
        .route("/notifications/:id/read", post(notifications::mark_read))
        // Reports; dashboard before the catch-all type segment
        .route("/reports/dashboard", get(reports::dashboard))
        .route("/reports/:type", get(reports::generate))
        // Chatbot
        .route("/chat/ask", post(chat::ask))
        .route("/chat/health", get(chat::health))
        .route("/chat/feedback", post(chat::feedback))
        .route("/chat/history", get(chat::history))
        .route("/chat/analytics", get(chat::analytics))
        .with_state(state)
}
