use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::ErrorBody;
use validator::Validate;

/// JSON body extractor that runs `validator` rules before the handler.
/// Shape and rule failures are both answered with 422.
pub struct ValidatedJson<T>(pub T);

fn unprocessable(message: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorBody {
            error: "validation_error",
            message,
        }),
    )
        .into_response()
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| unprocessable(e.body_text()))?;

        value
            .validate()
            .map_err(|e| unprocessable(e.to_string()))?;

        Ok(ValidatedJson(value))
    }
}
