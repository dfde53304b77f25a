//! # actix-firebase-identity
//!
//! This crate resolves verified Firebase ID token claims into persisted users
//! and exposes them to `actix-web` handlers as an authenticated subject.
//!
//! A [`TokenVerifier`] checks the raw token. The [`IdentityResolver`] then
//! finds the user whose identifier column equals the token's `sub` claim,
//! refreshing `email`, `name` and `picture` when they changed, or creates it.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use actix_web::{web, App, HttpServer, HttpResponse};
//! use actix_firebase_identity::{
//!     AuthenticatedUser, ClaimsMap, FirebaseGuard, IdentityConfig, IdentityResolver,
//!     MemoryUserStore, TokenVerifier, VerificationError,
//! };
//!
//! struct MyVerifier;
//!
//! impl TokenVerifier for MyVerifier {
//!     fn verify(&self, token: &str) -> Result<ClaimsMap, VerificationError> {
//!         Err(VerificationError::new("plug in a real verifier"))
//!     }
//! }
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = IdentityConfig::from_env().expect("invalid FIREBASE_* configuration");
//!     let store = Arc::new(MemoryUserStore::for_config(&config));
//!     let guard = FirebaseGuard::new(Arc::new(MyVerifier), IdentityResolver::new(store, config));
//!     let guard = web::Data::new(guard);
//!
//!     HttpServer::new(move || {
//!         App::new()
//!             .app_data(guard.clone())
//!             .route("/profile", web::get().to(get_profile))
//!     })
//!     .bind(("127.0.0.1", 8080))?
//!     .run()
//!     .await
//! }
//!
//! async fn get_profile(user: AuthenticatedUser) -> HttpResponse {
//!     HttpResponse::Ok().json(user)
//! }
//! ```

mod claims;
mod config;
mod error;
mod guard;
mod impls;
mod password;
mod resolver;
mod store;
mod subject;
mod user;
mod verifier;

pub use claims::*;
pub use config::*;
pub use error::*;
pub use guard::*;
pub use password::*;
pub use resolver::*;
pub use store::*;
pub use subject::*;
pub use user::*;
pub use verifier::*;
