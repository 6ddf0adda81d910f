//! Basic usage example for the appointments API client
//!
//! Starts a tiny in-process backend and calls it through the client, so the
//! masked request/response log lines can be seen on stdout.
//!
//! Run with:
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer};
use appointments_api::prelude::*;
use appointments_api::telemetry::init_tracing;

async fn rooms() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!([
        {"id": 1, "name": "Sala A"},
        {"id": 2, "name": "Sala B"}
    ]))
}

async fn login(body: web::Json<serde_json::Value>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "user": body["email"],
        "access_token": "eyJhbGciOiJIUzI1NiJ9.demo"
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = init_tracing(true) {
        eprintln!("{e}");
    }

    let server = HttpServer::new(|| {
        App::new()
            .service(web::resource("/api/rooms").route(web::get().to(rooms)))
            .service(web::resource("/api/auth/login").route(web::post().to(login)))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))?;
    let addr = server.addrs()[0];
    let handle = server.run();
    let server_handle = handle.handle();
    actix_web::rt::spawn(handle);

    println!("Backend listening on http://{addr}");

    let config = Config::new(Some(format!("http://{addr}")), Some("/api".to_string()));
    let sessions = Arc::new(StaticSessionProvider::new(Some(Session::with_token("demo-token"))));
    let client = ApiClient::new(config, sessions).map_err(std::io::Error::other)?;

    match client.get("/rooms?apiKey=should-not-appear").await {
        Ok(res) => println!("GET /rooms -> {} {}", res.status, res.text()),
        Err(e) => eprintln!("GET /rooms failed: {e}"),
    }

    let credentials = serde_json::json!({"email": "ana@example.com", "password": "hunter2"});
    match client.post("/auth/login", &credentials).await {
        Ok(res) => println!("POST /auth/login -> {}", res.status),
        Err(e) => eprintln!("POST /auth/login failed: {e}"),
    }

    server_handle.stop(true).await;
    Ok(())
}
