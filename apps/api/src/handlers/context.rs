use axum::Json;
use axum::extract::Extension;
use ledgerguard_application::BusinessContext;

use crate::dto::BusinessContextResponse;

pub async fn business_context_handler(
    Extension(context): Extension<BusinessContext>,
) -> Json<BusinessContextResponse> {
    Json(BusinessContextResponse::from(&context))
}
