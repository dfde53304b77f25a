use actix_web::error::InternalError;
use actix_web::http::{header, StatusCode};
use actix_web::{dev, http::header::Header, web, FromRequest, HttpRequest};
use actix_web::{HttpResponse, ResponseError};
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use futures::future::{err, FutureExt, LocalBoxFuture};
use tracing::*;

use crate::{AuthenticatedUser, Error, FirebaseGuard};

impl ResponseError for Error {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.to_string())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            // Signing keys could not be fetched or decoded
            Error::Verification(err) if err.is_unavailable() => StatusCode::INTERNAL_SERVER_ERROR,

            // Token was rejected, or verified but unusable for sign-in
            Error::Verification(_) | Error::MissingClaim(_) | Error::InvalidClaim(_) => {
                StatusCode::UNAUTHORIZED
            }

            // Server-side failure, or a credential operation this deployment disables
            Error::NotSupported(_)
            | Error::Store(_)
            | Error::Credential(_)
            | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let Some(guard) = req.app_data::<web::Data<FirebaseGuard>>().cloned() else {
            error!("FirebaseGuard is missing from the application data");
            return err(missing_guard_error()).boxed_local();
        };

        let bearer = match Authorization::<Bearer>::parse(req) {
            Ok(header) => header.into_scheme(),
            Err(_) => {
                // Per RFC 7235, a 401 Unauthorized response MUST be returned when the
                // Authorization header is missing, malformed, or uses an unsupported scheme.
                return err(missing_or_malformed_auth_header()).boxed_local();
            }
        };

        let id_token = bearer.token().to_string();

        async move {
            match guard.user(&id_token).await {
                Ok(user) => Ok(user),
                Err(Error::Verification(err)) if err.is_unavailable() => {
                    error!("Firebase token verifier unavailable: {err}");
                    Err(internal_token_verification_error())
                }
                Err(
                    other @ (Error::Verification(_)
                    | Error::MissingClaim(_)
                    | Error::InvalidClaim(_)),
                ) => Err(invalid_token_error(&other)),
                Err(other) => {
                    warn!("Failed to resolve Firebase user: {other}");
                    Err(other.into())
                }
            }
        }
        .boxed_local()
    }
}

fn missing_guard_error() -> actix_web::Error {
    let response =
        HttpResponse::InternalServerError().body("Firebase authentication is not configured");

    InternalError::from_response("missing_firebase_guard", response).into()
}

fn internal_token_verification_error() -> actix_web::Error {
    let response =
        HttpResponse::InternalServerError().body("Internal error during token verification");

    InternalError::from_response("token_verification_failure", response).into()
}

fn missing_or_malformed_auth_header() -> actix_web::Error {
    unauthorized_with_www_authenticate(
        "invalid_request",
        "Authorization header missing or not using Bearer scheme",
        "Authorization header is missing or malformed",
    )
}

fn invalid_token_error(err: &Error) -> actix_web::Error {
    unauthorized_with_www_authenticate(
        "invalid_token",
        &err.to_string(),
        format!("Failed to authenticate Firebase user: {err}"),
    )
}

/// Constructs a 401 `actix_web::Error` carrying a `WWW-Authenticate` challenge.
fn unauthorized_with_www_authenticate(
    www_error_code: &str,
    www_error_description: &str,
    body: impl Into<String>,
) -> actix_web::Error {
    let header_value = format!(
        r#"Bearer realm="firebase", error="{www_error_code}", error_description="{www_error_description}""#
    );

    let response = HttpResponse::Unauthorized()
        .insert_header((header::WWW_AUTHENTICATE, header_value))
        .body(body.into());

    InternalError::from_response("auth_error", response).into()
}
