use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::server::error::Error;

/// query string deserialized and run through its `validator` rules
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|err| Error::BadRequest(err.body_text()))?;

        value
            .validate()
            .map_err(|err| Error::BadRequest(err.to_string().replace('\n', ", ")))?;

        Ok(ValidatedQuery(value))
    }
}

/// json body deserialized and run through its `validator` rules
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| Error::BadRequest(err.body_text()))?;

        value
            .validate()
            .map_err(|err| Error::BadRequest(err.to_string().replace('\n', ", ")))?;

        Ok(ValidatedJson(value))
    }
}
