use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::auth::login,
        api::auth::me,
        api::users::list_users,
        api::categories::list_categories,
        api::categories::create_category,
        api::items::list_items,
        api::items::create_item,
        api::transactions::checkout,
        api::transactions::return_item,
        api::transactions::list_transactions,
        api::maintenance::create_request,
        api::maintenance::list_requests,
        api::purchases::create_request,
        api::purchases::approve,
        api::notifications::list_notifications,
        api::reports::generate,
        api::chat::ask,
    ),
    components(
        schemas(
            api::auth::LoginRequest,
            api::categories::CategoryPayload,
            api::chat::ChatRequest,
        )
    ),
    tags(
        (name = "labtrack", description = "LabTrack lab inventory API"),
        (name = "auth", description = "Login and session"),
        (name = "items", description = "Inventory items"),
        (name = "transactions", description = "Checkout and return"),
        (name = "maintenance", description = "Maintenance requests with SLA tracking"),
        (name = "purchases", description = "Purchase request workflow"),
        (name = "chat", description = "Natural-language inventory queries")
    )
)]
pub struct ApiDoc;
