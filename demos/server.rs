//! Minimal Actix Web server resolving Firebase users into an in-memory store.
//!
//! Tokens are verified by `actix-firebase-auth` (enable the `firebase-auth`
//! feature). Resolution is configured through `FIREBASE_*` environment
//! variables, see [`IdentityConfig::from_env`].
//!
//! - `/me`: Requires a valid Firebase ID token and returns the resolved user.
//! - `/whoami`: Returns the resolved user, or `"Anonymous"` otherwise.

use std::{env, sync::Arc};

use actix_firebase_auth::FirebaseAuth;
use actix_firebase_identity::{
    AuthenticatedUser, FirebaseGuard, IdentityConfig, IdentityResolver, MemoryUserStore,
};
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Read project ID from environment variable or fallback to a default for dev
    let project_id =
        env::var("FIREBASE_PROJECT_ID").unwrap_or_else(|_| "your-project-id".to_string());

    let config = match IdentityConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid identity configuration: {e}");
            std::process::exit(1);
        }
    };

    // Fetches Google's public keys and keeps them fresh in the background
    let verifier = FirebaseAuth::new(&project_id).await;

    let store = Arc::new(MemoryUserStore::for_config(&config));
    let resolver = IdentityResolver::new(store, config);
    let guard = web::Data::new(FirebaseGuard::new(Arc::new(verifier), resolver));

    HttpServer::new(move || {
        App::new()
            .app_data(guard.clone())
            .service(me)
            .service(whoami)
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}

#[get("/me")]
async fn me(user: AuthenticatedUser) -> impl Responder {
    HttpResponse::Ok().json(user)
}

#[get("/whoami")]
async fn whoami(user: Option<AuthenticatedUser>) -> impl Responder {
    match user {
        Some(u) => HttpResponse::Ok().json(u),
        None => HttpResponse::Ok().body("Anonymous"),
    }
}
